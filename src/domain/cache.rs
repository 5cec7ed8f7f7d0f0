//! Incremental indicator cache engine.
//!
//! Indicator recurrences (EMA, recursive SMA) depend on the whole history,
//! so a hole anywhere in the window forces a recompute over the entire
//! window. Persistence stays incremental: only the dates that were missing
//! are written back, complete rows are never rewritten.

use std::collections::HashMap;

use chrono::NaiveDate;
use log::debug;

use crate::domain::bar::{Adjust, PriceBar};
use crate::domain::error::ScreenerError;
use crate::domain::indicator::{enrich, IndicatorRow};
use crate::ports::cache_port::IndicatorCachePort;

/// Indicator rows for `bars`, served from the cache when every date is
/// complete, recomputed and backfilled otherwise. Output is aligned with
/// `bars`, one row per bar.
pub fn load_enriched(
    bars: &[PriceBar],
    cache: &dyn IndicatorCachePort,
    code: &str,
    adjust: Adjust,
) -> Result<Vec<IndicatorRow>, ScreenerError> {
    if bars.is_empty() {
        return Ok(Vec::new());
    }
    let start = bars[0].trade_date;
    let end = bars[bars.len() - 1].trade_date;
    let stored: HashMap<NaiveDate, IndicatorRow> = cache
        .read_rows(code, adjust, start, end)?
        .into_iter()
        .map(|row| (row.trade_date, row))
        .collect();

    let missing: Vec<NaiveDate> = bars
        .iter()
        .map(|b| b.trade_date)
        .filter(|d| !stored.get(d).is_some_and(IndicatorRow::is_complete))
        .collect();

    if missing.is_empty() {
        return Ok(bars
            .iter()
            .map(|b| stored[&b.trade_date].clone())
            .collect());
    }

    debug!(
        "{code}: {} of {} cached indicator rows missing, recomputing window",
        missing.len(),
        bars.len()
    );
    let rows = enrich(bars);
    let backfill: Vec<IndicatorRow> = rows
        .iter()
        .filter(|r| missing.contains(&r.trade_date))
        .cloned()
        .collect();
    cache.upsert_rows(code, adjust, &backfill)?;
    Ok(rows)
}
