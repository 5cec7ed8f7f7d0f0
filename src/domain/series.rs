//! Shared numeric kernels over positional f64 series.
//!
//! All rolling functions use the shrink-at-start rule: positions before the
//! window fills are computed over whatever is available, never NaN-padded.
//! The recursive smoothed average is the load-bearing primitive shared by the
//! formula builtins and the KDJ oscillator; its recurrence must not be
//! "simplified" into a standard EMA.

/// Shift values forward by `n` positions; the first `n` positions become NaN.
pub fn shift(x: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; x.len()];
    for i in n..x.len() {
        out[i] = x[i - n];
    }
    out
}

/// Simple rolling mean with window `n`, shrinking at the start. NaN values
/// inside the window are skipped; a window with no finite member yields NaN.
pub fn rolling_mean(x: &[f64], n: usize) -> Vec<f64> {
    debug_assert!(n > 0);
    let mut out = Vec::with_capacity(x.len());
    let mut sum = 0.0;
    let mut count = 0usize;
    for i in 0..x.len() {
        if !x[i].is_nan() {
            sum += x[i];
            count += 1;
        }
        if i >= n && !x[i - n].is_nan() {
            sum -= x[i - n];
            count -= 1;
        }
        out.push(if count == 0 { f64::NAN } else { sum / count as f64 });
    }
    out
}

/// Rolling minimum with window `n`, shrinking at the start. NaN values inside
/// the window are ignored (f64::min semantics).
pub fn rolling_min(x: &[f64], n: usize) -> Vec<f64> {
    debug_assert!(n > 0);
    let mut out = Vec::with_capacity(x.len());
    for i in 0..x.len() {
        let start = (i + 1).saturating_sub(n);
        let mut acc = f64::NAN;
        for &v in &x[start..=i] {
            acc = acc.min(v);
        }
        out.push(acc);
    }
    out
}

/// Rolling maximum with window `n`, shrinking at the start.
pub fn rolling_max(x: &[f64], n: usize) -> Vec<f64> {
    debug_assert!(n > 0);
    let mut out = Vec::with_capacity(x.len());
    for i in 0..x.len() {
        let start = (i + 1).saturating_sub(n);
        let mut acc = f64::NAN;
        for &v in &x[start..=i] {
            acc = acc.max(v);
        }
        out.push(acc);
    }
    out
}

/// Exponential moving average with smoothing factor `2/(n+1)`, seeded by the
/// first value (the non-adjusted recursive form).
pub fn ema_span(x: &[f64], n: usize) -> Vec<f64> {
    debug_assert!(n > 0);
    let alpha = 2.0 / (n as f64 + 1.0);
    let mut out = Vec::with_capacity(x.len());
    let mut prev = 0.0;
    for (i, &v) in x.iter().enumerate() {
        let ema = if i == 0 { v } else { alpha * v + (1.0 - alpha) * prev };
        out.push(ema);
        prev = ema;
    }
    out
}

/// Recursive smoothed average: out[0] = x[0];
/// out[i] = (m*x[i] + (n-m)*out[i-1]) / n.
pub fn sma_recursive(x: &[f64], n: usize, m: usize) -> Vec<f64> {
    debug_assert!(n > 0);
    let mut out = Vec::with_capacity(x.len());
    let mut prev = 0.0;
    for (i, &v) in x.iter().enumerate() {
        let s = if i == 0 {
            v
        } else {
            (m as f64 * v + (n - m) as f64 * prev) / n as f64
        };
        out.push(s);
        prev = s;
    }
    out
}
