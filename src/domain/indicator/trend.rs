//! Trend lines derived from close prices.

use crate::domain::series::{ema_span, rolling_mean};

/// Short-term trend line: a double-smoothed EMA, EMA(EMA(close, 10), 10).
pub fn short_trend_line(close: &[f64]) -> Vec<f64> {
    ema_span(&ema_span(close, 10), 10)
}

/// Bull/bear line: the mean of four long moving averages (14/28/57/114),
/// each shrink-at-start.
pub fn bull_bear_line(close: &[f64]) -> Vec<f64> {
    let mas: Vec<Vec<f64>> = [14, 28, 57, 114]
        .iter()
        .map(|&n| rolling_mean(close, n))
        .collect();
    (0..close.len())
        .map(|i| mas.iter().map(|ma| ma[i]).sum::<f64>() / mas.len() as f64)
        .collect()
}
