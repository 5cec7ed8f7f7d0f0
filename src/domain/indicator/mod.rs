//! Technical indicator engine.
//!
//! `enrich` computes the derived columns the cache persists per bar: MACD,
//! KDJ, the short trend line and the bull/bear line. All recurrences seed
//! from the first value (TDX convention), so every output row carries a
//! value; `None` only appears when an input was NaN.

pub mod kdj;
pub mod macd;
pub mod trend;

use chrono::NaiveDate;

use crate::domain::bar::PriceBar;

/// Derived indicator values for one (instrument, date, adjust) row.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRow {
    pub trade_date: NaiveDate,
    pub macd_dif: Option<f64>,
    pub macd_dea: Option<f64>,
    pub macd_hist: Option<f64>,
    pub kdj_k: Option<f64>,
    pub kdj_d: Option<f64>,
    pub kdj_j: Option<f64>,
    pub short_trend_line: Option<f64>,
    pub bull_bear_line: Option<f64>,
}

impl IndicatorRow {
    /// A row with any missing field is treated as absent by the cache.
    pub fn is_complete(&self) -> bool {
        [
            self.macd_dif,
            self.macd_dea,
            self.macd_hist,
            self.kdj_k,
            self.kdj_d,
            self.kdj_j,
            self.short_trend_line,
            self.bull_bear_line,
        ]
        .iter()
        .all(|v| v.is_some())
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Compute every indicator column over a full bar window. Empty input gives
/// empty output.
pub fn enrich(bars: &[PriceBar]) -> Vec<IndicatorRow> {
    if bars.is_empty() {
        return Vec::new();
    }
    let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let low: Vec<f64> = bars.iter().map(|b| b.low).collect();

    let macd = macd::calculate_macd_default(&close);
    let kdj = kdj::calculate_kdj_default(&high, &low, &close);
    let short = trend::short_trend_line(&close);
    let bull_bear = trend::bull_bear_line(&close);

    bars.iter()
        .enumerate()
        .map(|(i, bar)| IndicatorRow {
            trade_date: bar.trade_date,
            macd_dif: finite(macd.dif[i]),
            macd_dea: finite(macd.dea[i]),
            macd_hist: finite(macd.hist[i]),
            kdj_k: finite(kdj.k[i]),
            kdj_d: finite(kdj.d[i]),
            kdj_j: finite(kdj.j[i]),
            short_trend_line: finite(short[i]),
            bull_bear_line: finite(bull_bear[i]),
        })
        .collect()
}
