//! KDJ stochastic oscillator, TDX parameterization (9, 3, 3).
//!
//! RSV = 100 * (close - LLV(low, n)) / (HHV(high, n) - LLV(low, n)), with a
//! zero denominator mapping to 0 rather than NaN (a flat window is "at the
//! bottom of its range").
//! K = SMA(RSV, 3, 1), D = SMA(K, 3, 1), J = 3K - 2D.

use crate::domain::series::{rolling_max, rolling_min, sma_recursive};

pub const DEFAULT_N: usize = 9;
pub const DEFAULT_M1: usize = 3;
pub const DEFAULT_M2: usize = 3;

#[derive(Debug, Clone)]
pub struct Kdj {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
    pub j: Vec<f64>,
}

pub fn calculate_kdj(high: &[f64], low: &[f64], close: &[f64], n: usize, m1: usize, m2: usize) -> Kdj {
    let hhv = rolling_max(high, n);
    let llv = rolling_min(low, n);
    let rsv: Vec<f64> = close
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let span = hhv[i] - llv[i];
            if span == 0.0 {
                0.0
            } else {
                100.0 * (c - llv[i]) / span
            }
        })
        .collect();
    let k = sma_recursive(&rsv, m1, 1);
    let d = sma_recursive(&k, m2, 1);
    let j = k
        .iter()
        .zip(d.iter())
        .map(|(&kv, &dv)| 3.0 * kv - 2.0 * dv)
        .collect();
    Kdj { k, d, j }
}

pub fn calculate_kdj_default(high: &[f64], low: &[f64], close: &[f64]) -> Kdj {
    calculate_kdj(high, low, close, DEFAULT_N, DEFAULT_M1, DEFAULT_M2)
}
