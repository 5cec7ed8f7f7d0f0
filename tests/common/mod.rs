#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use tdxscreen::domain::bar::{Adjust, Instrument, PriceBar};
use tdxscreen::domain::error::ScreenerError;
use tdxscreen::domain::indicator::IndicatorRow;
use tdxscreen::domain::screener::PickResult;
use tdxscreen::ports::cache_port::IndicatorCachePort;
use tdxscreen::ports::data_port::DataPort;
use tdxscreen::ports::picks_port::PicksPort;

pub struct MockDataPort {
    pub bars: HashMap<String, Vec<PriceBar>>,
    pub universe: Vec<Instrument>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            bars: HashMap::new(),
            universe: Vec::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_instrument(
        mut self,
        code: &str,
        name: &str,
        exchange: &str,
        bars: Vec<PriceBar>,
    ) -> Self {
        self.universe.push(Instrument::new(code, name, exchange));
        self.bars.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        code: &str,
        _adjust: Adjust,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, ScreenerError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(ScreenerError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self
            .bars
            .get(code)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|b| b.trade_date >= start_date && b.trade_date <= end_date)
            .collect())
    }

    fn list_universe(&self) -> Result<Vec<Instrument>, ScreenerError> {
        Ok(self.universe.clone())
    }
}

#[derive(Default)]
pub struct MockPicksPort {
    pub recorded: RefCell<Vec<(NaiveDate, String, Vec<PickResult>)>>,
}

impl PicksPort for MockPicksPort {
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

#[derive(Default)]
pub struct MockCachePort {
    pub rows: RefCell<BTreeMap<NaiveDate, IndicatorRow>>,
    pub upsert_sizes: RefCell<Vec<usize>>,
}

impl IndicatorCachePort for MockCachePort {
    fn read_rows(
        &self,
        _code: &str,
        _adjust: Adjust,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<IndicatorRow>, ScreenerError> {
        Ok(self
            .rows
            .borrow()
            .range(start_date..=end_date)
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn upsert_rows(
        &self,
        _code: &str,
        _adjust: Adjust,
        rows: &[IndicatorRow],
    ) -> Result<(), ScreenerError> {
        self.upsert_sizes.borrow_mut().push(rows.len());
        let mut stored = self.rows.borrow_mut();
        for row in rows {
            stored.insert(row.trade_date, row.clone());
        }
        Ok(())
    }
}

pub fn trading_day(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, 1).unwrap() + chrono::Days::new(offset)
}

/// Bars with the given closes on consecutive days starting at `trading_day(0)`.
pub fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PriceBar {
            trade_date: trading_day(i as u64),
            open: c * 0.99,
            high: c * 1.02,
            low: c * 0.98,
            close: c,
            volume: 1.0e6,
            amount: c * 1.0e6,
        })
        .collect()
}
