//! CLI definition and dispatch.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand};
use log::warn;

use crate::adapters::csv_adapter::{CsvAdapter, CsvPicksAdapter};
use crate::adapters::file_config_adapter::{FileConfigAdapter, ScreenConfig};
#[cfg(feature = "postgres")]
use crate::adapters::postgres_adapter::{PgAdvisoryLock, PostgresAdapter, PIPELINE_LOCK_KEY};
use crate::domain::bar::{Adjust, PriceBar};
use crate::domain::cache;
use crate::domain::error::ScreenerError;
use crate::domain::indicator::{enrich, IndicatorRow};
use crate::domain::pipeline::{self, AdvisoryLock, Stage};
use crate::domain::program::Program;
use crate::domain::screener::{run_screen, ScreenOptions};
use crate::ports::cache_port::IndicatorCachePort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::picks_port::PicksPort;

#[derive(Parser, Debug)]
#[command(name = "tdxscreen", about = "TDX formula stock screener")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one rule file against the whole universe
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        /// Rule file (TDX formula source)
        #[arg(short, long)]
        rule: PathBuf,
        /// Rule name used when recording picks (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
        /// Trading day, YYYY-MM-DD (defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Parse a rule file and report errors without touching any data
    Validate {
        #[arg(short, long)]
        rule: PathBuf,
    },
    /// Run the daily pipeline: every configured rule plus retention cleanup
    Pipeline {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Show data coverage and latest indicators for one instrument
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: String,
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Screen {
            config,
            rule,
            name,
            date,
        } => run_screen_command(&config, &rule, name.as_deref(), date),
        Command::Validate { rule } => run_validate(&rule),
        Command::Pipeline { config, date } => run_pipeline(&config, date),
        Command::Info { config, code, date } => run_info(&config, &code, date),
    }
}

struct Backends {
    data: Box<dyn DataPort>,
    picks: Box<dyn PicksPort>,
    /// Present when the source persists indicator rows (Postgres).
    cache: Option<Box<dyn IndicatorCachePort>>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

fn build_backends(config: &dyn ConfigPort) -> Result<Backends, ScreenerError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.as_str() {
        "csv" => {
            let csv_dir = config.get_string("data", "csv_dir").ok_or_else(|| {
                ScreenerError::ConfigMissing {
                    section: "data".into(),
                    key: "csv_dir".into(),
                }
            })?;
            let picks_dir = config
                .get_string("data", "picks_dir")
                .map(PathBuf::from)
                .unwrap_or_else(|| Path::new(&csv_dir).join("picks"));
            Ok(Backends {
                data: Box::new(CsvAdapter::new(PathBuf::from(csv_dir))),
                picks: Box::new(CsvPicksAdapter::new(picks_dir)),
                cache: None,
            })
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let adapter = PostgresAdapter::from_config(config)?;
            Ok(Backends {
                data: Box::new(adapter.clone()),
                picks: Box::new(adapter.clone()),
                cache: Some(Box::new(adapter)),
            })
        }
        other => Err(ScreenerError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: format!("unsupported data source {other}"),
        }),
    }
}

fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn load_program(rule_path: &Path) -> Result<(String, Program), ExitCode> {
    let source = match fs::read_to_string(rule_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read {}: {e}", rule_path.display());
            return Err(ExitCode::from(1));
        }
    };
    match Program::parse(&source) {
        Ok(program) => Ok((source, program)),
        Err(e) => {
            eprintln!("error in {}:", rule_path.display());
            eprintln!("{}", e.display_with_context(&source));
            Err(ExitCode::from(4))
        }
    }
}

fn target_date(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Local::now().date_naive())
}

fn rule_name_for(path: &Path, override_name: Option<&str>) -> String {
    override_name
        .map(str::to_string)
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unnamed".to_string())
}

fn run_screen_command(
    config_path: &Path,
    rule_path: &Path,
    name: Option<&str>,
    date: Option<NaiveDate>,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let screen = match ScreenConfig::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };
    let (_, program) = match load_program(rule_path) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let backends = match build_backends(&config) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };
    let universe = match backends.data.list_universe() {
        Ok(u) => u,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };
    let trade_date = target_date(date);
    let rule_name = rule_name_for(rule_path, name);
    eprintln!(
        "screening {} instruments with rule {rule_name} on {trade_date}",
        universe.len()
    );
    let opts = ScreenOptions {
        lookback_days: screen.lookback_days,
    };
    match run_screen(
        &program,
        &rule_name,
        &universe,
        trade_date,
        screen.adjust,
        &opts,
        backends.data.as_ref(),
        backends.picks.as_ref(),
    ) {
        Ok(outcome) => {
            for pick in &outcome.picks {
                let metrics = pick
                    .metrics
                    .iter()
                    .map(|(k, v)| format!("{k}={v:.3}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("{}\t{}\t{}", pick.code, pick.name, metrics);
            }
            eprintln!(
                "{} picked / {} attempted ({} skipped, {} failed)",
                outcome.stats.picked,
                outcome.stats.attempted,
                outcome.stats.skipped,
                outcome.stats.failed
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

fn run_validate(rule_path: &Path) -> ExitCode {
    match load_program(rule_path) {
        Ok((_, program)) => {
            println!(
                "ok: {} statement(s), output variable {}",
                program.statements.len(),
                program.output
            );
            ExitCode::SUCCESS
        }
        Err(code) => code,
    }
}

/// Lock for single-host CSV runs; cross-host exclusion needs Postgres.
struct ProcessLock;

impl AdvisoryLock for ProcessLock {
    fn try_acquire(&self) -> Result<bool, ScreenerError> {
        Ok(true)
    }

    fn release(&self) -> Result<(), ScreenerError> {
        Ok(())
    }
}

fn build_lock(config: &dyn ConfigPort) -> Result<Box<dyn AdvisoryLock>, ScreenerError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    #[cfg(feature = "postgres")]
    if source == "postgres" {
        return Ok(Box::new(PgAdvisoryLock::from_config(config, PIPELINE_LOCK_KEY)?));
    }
    let _ = source;
    Ok(Box::new(ProcessLock))
}

fn rule_files(rules_dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(rules_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("rules dir {} unreadable: {e}", rules_dir.display());
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext == "txt" || ext == "tdx")
        })
        .collect();
    files.sort();
    files
}

fn run_pipeline(config_path: &Path, date: Option<NaiveDate>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let screen = match ScreenConfig::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };
    let backends = match build_backends(&config) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };
    let lock = match build_lock(&config) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };
    let trade_date = target_date(date);
    let opts = ScreenOptions {
        lookback_days: screen.lookback_days,
    };

    let data = backends.data.as_ref();
    let picks = backends.picks.as_ref();
    let mut stages = Vec::new();
    for rule_path in rule_files(Path::new(&screen.rules_dir)) {
        let rule_name = rule_name_for(&rule_path, None);
        let adjust = screen.adjust;
        let opts = opts.clone();
        stages.push(Stage::new(format!("screen:{rule_name}"), move || {
            let source = fs::read_to_string(&rule_path)?;
            let program = Program::parse(&source).map_err(|e| {
                eprintln!("{}", e.display_with_context(&source));
                ScreenerError::FormulaParse(e)
            })?;
            let universe = data.list_universe()?;
            run_screen(
                &program, &rule_name, &universe, trade_date, adjust, &opts, data, picks,
            )?;
            Ok(())
        }));
    }
    if stages.is_empty() {
        warn!("no rule files in {}", screen.rules_dir);
    }
    let keep_before = trade_date
        .checked_sub_days(Days::new(screen.retention_days.max(0) as u64))
        .unwrap_or(NaiveDate::MIN);
    stages.push(Stage::new("cleanup", move || {
        let removed = picks.cleanup_expired(keep_before)?;
        eprintln!("retention cleanup removed {removed} expired result set(s)");
        Ok(())
    }));

    match pipeline::run(lock.as_ref(), stages) {
        Ok(report) if !report.ran => {
            eprintln!("pipeline lock held elsewhere, nothing to do");
            ExitCode::SUCCESS
        }
        Ok(report) => {
            eprintln!(
                "pipeline finished: {} ok, {} failed",
                report.succeeded, report.failed
            );
            if report.failed > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

/// Indicator rows for `info`: served through the incremental cache when the
/// backend persists indicator rows, recomputed in memory otherwise.
fn enriched_rows(
    bars: &[PriceBar],
    cache: Option<&dyn IndicatorCachePort>,
    code: &str,
    adjust: Adjust,
) -> Result<Vec<IndicatorRow>, ScreenerError> {
    match cache {
        Some(cache) => cache::load_enriched(bars, cache, code, adjust),
        None => Ok(enrich(bars)),
    }
}

fn run_info(config_path: &Path, code: &str, date: Option<NaiveDate>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(exit) => return exit,
    };
    let screen = match ScreenConfig::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };
    let backends = match build_backends(&config) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };
    let end = target_date(date);
    let start = end
        .checked_sub_days(Days::new(screen.lookback_days))
        .unwrap_or(NaiveDate::MIN);
    let bars = match backends.data.fetch_bars(code, screen.adjust, start, end) {
        Ok(bars) => bars,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };
    let Some(last) = bars.last() else {
        let e = ScreenerError::NoData {
            code: code.to_string(),
            trade_date: end.to_string(),
        };
        eprintln!("error: {e}");
        return ExitCode::from(&e);
    };
    println!(
        "{code}: {} bars, {} .. {}",
        bars.len(),
        bars[0].trade_date,
        last.trade_date
    );
    let rows = match enriched_rows(&bars, backends.cache.as_deref(), code, screen.adjust) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };
    if let Some(row) = rows.last() {
        let fmt = |v: Option<f64>| {
            v.map(|x| format!("{x:.4}"))
                .unwrap_or_else(|| "-".to_string())
        };
        println!(
            "macd dif={} dea={} hist={}",
            fmt(row.macd_dif),
            fmt(row.macd_dea),
            fmt(row.macd_hist)
        );
        println!(
            "kdj k={} d={} j={}",
            fmt(row.kdj_k),
            fmt(row.kdj_d),
            fmt(row.kdj_j)
        );
        println!(
            "short_trend={} bull_bear={}",
            fmt(row.short_trend_line),
            fmt(row.bull_bear_line)
        );
    }
    ExitCode::SUCCESS
}
