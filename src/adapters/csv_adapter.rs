//! CSV file data adapter.
//!
//! Layout: one `<code>.csv` per instrument with columns
//! `date,open,high,low,close,volume,amount` plus a `universe.csv` listing
//! `code,name,exchange`. Adjusted files live in per-mode subdirectories
//! (`qfq/`, `hfq/`), raw files at the base. Intended for tests and offline
//! experiments, not production data volume.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::bar::{Adjust, Instrument, PriceBar};
use crate::domain::error::ScreenerError;
use crate::domain::screener::PickResult;
use crate::ports::data_port::DataPort;
use crate::ports::picks_port::PicksPort;

#[derive(Clone)]
pub struct CsvAdapter {
    base_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct BarRecord {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: Option<f64>,
    amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct UniverseRecord {
    code: String,
    name: String,
    exchange: String,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn bars_path(&self, code: &str, adjust: Adjust) -> PathBuf {
        match adjust {
            Adjust::Raw => self.base_path.join(format!("{code}.csv")),
            mode => self.base_path.join(mode.as_str()).join(format!("{code}.csv")),
        }
    }

    fn read_error(path: &PathBuf, e: impl std::fmt::Display) -> ScreenerError {
        ScreenerError::Database {
            reason: format!("{}: {e}", path.display()),
        }
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        code: &str,
        adjust: Adjust,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, ScreenerError> {
        let path = self.bars_path(code, adjust);
        let mut rdr =
            csv::Reader::from_path(&path).map_err(|e| Self::read_error(&path, e))?;
        let mut bars = Vec::new();
        for result in rdr.deserialize::<BarRecord>() {
            let record = result.map_err(|e| Self::read_error(&path, e))?;
            let date = NaiveDate::parse_from_str(&record.date, "%Y-%m-%d")
                .map_err(|e| Self::read_error(&path, e))?;
            if date < start_date || date > end_date {
                continue;
            }
            bars.push(PriceBar {
                trade_date: date,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume.unwrap_or(f64::NAN),
                amount: record.amount.unwrap_or(f64::NAN),
            });
        }
        bars.sort_by_key(|b| b.trade_date);
        Ok(bars)
    }

    fn list_universe(&self) -> Result<Vec<Instrument>, ScreenerError> {
        let path = self.base_path.join("universe.csv");
        let mut rdr =
            csv::Reader::from_path(&path).map_err(|e| Self::read_error(&path, e))?;
        let mut universe = Vec::new();
        for result in rdr.deserialize::<UniverseRecord>() {
            let record = result.map_err(|e| Self::read_error(&path, e))?;
            universe.push(Instrument::new(&record.code, &record.name, &record.exchange));
        }
        Ok(universe)
    }
}

/// File-based pick recorder, the CSV analog of the per-day Postgres tables:
/// one `stock_pick_results_YYYYMMDD_<rule>.csv` per (day, rule), replaced on
/// rewrite, deleted wholesale by retention cleanup.
#[derive(Clone)]
pub struct CsvPicksAdapter {
    out_dir: PathBuf,
}

impl CsvPicksAdapter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    fn file_date(name: &str) -> Option<NaiveDate> {
        let rest = name.strip_prefix("stock_pick_results_")?;
        NaiveDate::parse_from_str(rest.get(..8)?, "%Y%m%d").ok()
    }

    fn read_error(path: &PathBuf, e: impl std::fmt::Display) -> ScreenerError {
        ScreenerError::Database {
            reason: format!("{}: {e}", path.display()),
        }
    }
}

impl PicksPort for CsvPicksAdapter {
    fn record_picks(
        &self,
        trade_date: NaiveDate,
        rule_name: &str,
        picks: &[PickResult],
    ) -> Result<(), ScreenerError> {
        std::fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(format!(
            "stock_pick_results_{}_{rule_name}.csv",
            trade_date.format("%Y%m%d")
        ));
        let mut wtr = csv::Writer::from_path(&path).map_err(|e| Self::read_error(&path, e))?;
        wtr.write_record(["code", "name", "exchange", "metrics"])
            .map_err(|e| Self::read_error(&path, e))?;
        for pick in picks {
            let metrics = serde_json::to_string(&pick.metrics).map_err(|e| {
                ScreenerError::Database {
                    reason: format!("metrics encoding: {e}"),
                }
            })?;
            wtr.write_record([&pick.code, &pick.name, &pick.exchange, &metrics])
                .map_err(|e| Self::read_error(&path, e))?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn cleanup_expired(&self, keep_before: NaiveDate) -> Result<usize, ScreenerError> {
        let mut removed = 0;
        let entries = match std::fs::read_dir(&self.out_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if Self::file_date(&name).is_some_and(|d| d < keep_before) {
                std::fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
