//! Screening orchestrator.
//!
//! Runs one rule program over a universe for one trading day. Per-instrument
//! failures are tallied and logged, never fatal; a broken rule file fails
//! before this code runs.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use log::{debug, info, warn};

use crate::domain::bar::{Adjust, Instrument};
use crate::domain::context::EvalContext;
use crate::domain::error::ScreenerError;
use crate::domain::program::Program;
use crate::ports::data_port::DataPort;
use crate::ports::picks_port::PicksPort;

#[derive(Debug, Clone)]
pub struct ScreenOptions {
    /// Calendar days of history fetched before the target day.
    pub lookback_days: u64,
}

impl Default for ScreenOptions {
    fn default() -> Self {
        Self { lookback_days: 450 }
    }
}

/// One picked instrument with its snapshot metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct PickResult {
    pub code: String,
    pub name: String,
    pub exchange: String,
    pub metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub attempted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub picked: usize,
}

#[derive(Debug)]
pub struct ScreenOutcome {
    pub stats: RunStats,
    pub picks: Vec<PickResult>,
}

/// Evaluate `program` against every instrument and record the picks.
///
/// Instruments without a bar dated exactly `trade_date` are skipped (halted
/// or delisted, not an error). Data and evaluation failures are logged with
/// identity and tallied as failed.
pub fn run_screen(
    program: &Program,
    rule_name: &str,
    universe: &[Instrument],
    trade_date: NaiveDate,
    adjust: Adjust,
    opts: &ScreenOptions,
    data: &dyn DataPort,
    picks_out: &dyn PicksPort,
) -> Result<ScreenOutcome, ScreenerError> {
    let start_date = trade_date
        .checked_sub_days(Days::new(opts.lookback_days))
        .unwrap_or(NaiveDate::MIN);
    let mut stats = RunStats::default();
    let mut picks = Vec::new();

    for instrument in universe {
        stats.attempted += 1;
        let bars = match data.fetch_bars(&instrument.code, adjust, start_date, trade_date) {
            Ok(bars) => bars,
            Err(e) => {
                warn!("{} {}: data fetch failed: {e}", instrument.code, instrument.name);
                stats.failed += 1;
                continue;
            }
        };
        let on_target_day = bars
            .last()
            .is_some_and(|bar| bar.trade_date == trade_date);
        if !on_target_day {
            debug!("{}: no bar on {trade_date}, skipped", instrument.code);
            stats.skipped += 1;
            continue;
        }
        let mut ctx = EvalContext::new(instrument.clone(), &bars);
        match program.evaluate(&mut ctx) {
            Ok(outcome) if outcome.pick => {
                stats.picked += 1;
                picks.push(PickResult {
                    code: instrument.code.clone(),
                    name: instrument.name.clone(),
                    exchange: instrument.exchange.clone(),
                    metrics: outcome.metrics,
                });
            }
            Ok(_) => {}
            Err(e) => {
                warn!("{} {}: {e}", instrument.code, instrument.name);
                stats.failed += 1;
            }
        }
    }

    picks_out.record_picks(trade_date, rule_name, &picks)?;
    info!(
        "rule {rule_name} on {trade_date}: {} attempted, {} skipped, {} failed, {} picked",
        stats.attempted, stats.skipped, stats.failed, stats.picked
    );
    Ok(ScreenOutcome { stats, picks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::PriceBar;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeData {
        bars: BTreeMap<String, Vec<PriceBar>>,
        broken_codes: Vec<String>,
    }

    impl DataPort for FakeData {
        fn fetch_bars(
            &self,
            code: &str,
            _adjust: Adjust,
            start_date: NaiveDate,
            end_date: NaiveDate,
        ) -> Result<Vec<PriceBar>, ScreenerError> {
            if self.broken_codes.iter().any(|c| c == code) {
                return Err(ScreenerError::Database {
                    reason: format!("connection reset while reading {code}"),
                });
            }
            let bars = self.bars.get(code).cloned().unwrap_or_default();
            Ok(bars
                .into_iter()
                .filter(|b| b.trade_date >= start_date && b.trade_date <= end_date)
                .collect())
        }

        fn list_universe(&self) -> Result<Vec<Instrument>, ScreenerError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct FakePicks {
        recorded: RefCell<Vec<(NaiveDate, String, Vec<PickResult>)>>,
    }

    impl PicksPort for FakePicks {
        fn record_picks(
            &self,
            trade_date: NaiveDate,
            rule_name: &str,
            picks: &[PickResult],
        ) -> Result<(), ScreenerError> {
            self.recorded
                .borrow_mut()
                .push((trade_date, rule_name.to_string(), picks.to_vec()));
            Ok(())
        }

        fn cleanup_expired(&self, _keep_before: NaiveDate) -> Result<usize, ScreenerError> {
            Ok(0)
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn rising_bars(until: u32) -> Vec<PriceBar> {
        (1..=until)
            .map(|d| PriceBar::flat(day(d), d as f64))
            .collect()
    }

    #[test]
    fn picks_only_matching_instruments() {
        let mut bars = BTreeMap::new();
        bars.insert("000001".to_string(), rising_bars(10));
        // 000002 falls on the last day.
        let mut falling = rising_bars(10);
        falling.last_mut().unwrap().close = 0.5;
        bars.insert("000002".to_string(), falling);
        let data = FakeData { bars, ..Default::default() };
        let picks = FakePicks::default();
        let universe = vec![
            Instrument::new("000001", "甲", "SZ"),
            Instrument::new("000002", "乙", "SZ"),
        ];
        let program = Program::parse("XG: C > REF(C, 1)").unwrap();
        let out = run_screen(
            &program,
            "momentum",
            &universe,
            day(10),
            Adjust::Forward,
            &ScreenOptions::default(),
            &data,
            &picks,
        )
        .unwrap();
        assert_eq!(out.stats.attempted, 2);
        assert_eq!(out.stats.picked, 1);
        assert_eq!(out.picks[0].code, "000001");
        assert_eq!(picks.recorded.borrow().len(), 1);
    }

    #[test]
    fn missing_target_day_is_skipped_not_failed() {
        let mut bars = BTreeMap::new();
        bars.insert("000001".to_string(), rising_bars(9)); // halted on day 10
        let data = FakeData { bars, ..Default::default() };
        let picks = FakePicks::default();
        let universe = vec![
            Instrument::new("000001", "甲", "SZ"),
            Instrument::new("000404", "丙", "SZ"), // no data at all
        ];
        let program = Program::parse("XG: C > 0").unwrap();
        let out = run_screen(
            &program,
            "momentum",
            &universe,
            day(10),
            Adjust::Forward,
            &ScreenOptions::default(),
            &data,
            &picks,
        )
        .unwrap();
        assert_eq!(out.stats.skipped, 2);
        assert_eq!(out.stats.failed, 0);
        assert_eq!(out.stats.picked, 0);
    }

    #[test]
    fn one_bad_instrument_does_not_abort_the_batch() {
        let mut bars = BTreeMap::new();
        for i in 1..=5 {
            bars.insert(format!("00000{i}"), rising_bars(10));
        }
        let data = FakeData {
            bars,
            broken_codes: vec!["000003".to_string()],
        };
        let picks = FakePicks::default();
        let universe: Vec<Instrument> = (1..=5)
            .map(|i| Instrument::new(&format!("00000{i}"), "样本", "SZ"))
            .collect();
        let program = Program::parse("XG: C > REF(C, 1)").unwrap();
        let out = run_screen(
            &program,
            "momentum",
            &universe,
            day(10),
            Adjust::Forward,
            &ScreenOptions::default(),
            &data,
            &picks,
        )
        .unwrap();
        assert_eq!(out.stats.attempted, 5);
        assert_eq!(out.stats.failed, 1);
        assert_eq!(out.stats.picked, 4);
        let recorded = picks.recorded.borrow();
        assert_eq!(recorded[0].2.len(), 4);
        assert!(recorded[0].2.iter().all(|p| p.code != "000003"));
    }
}
