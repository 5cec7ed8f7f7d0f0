//! MACD (Moving Average Convergence Divergence).
//!
//! DIF = EMA(close, fast) - EMA(close, slow)
//! DEA = EMA(DIF, signal)
//! HIST = 2 * (DIF - DEA)
//!
//! The doubled histogram matches TDX charting output, not the western
//! single-width convention.

use crate::domain::series::ema_span;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone)]
pub struct Macd {
    pub dif: Vec<f64>,
    pub dea: Vec<f64>,
    pub hist: Vec<f64>,
}

pub fn calculate_macd(close: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let ema_fast = ema_span(close, fast);
    let ema_slow = ema_span(close, slow);
    let dif: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(&f, &s)| f - s)
        .collect();
    let dea = ema_span(&dif, signal);
    let hist = dif
        .iter()
        .zip(dea.iter())
        .map(|(&d, &e)| 2.0 * (d - e))
        .collect();
    Macd { dif, dea, hist }
}

pub fn calculate_macd_default(close: &[f64]) -> Macd {
    calculate_macd(close, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}
