//! Maximum drawdown of a return series.
//!
//! The growth curve is `g[t] = (1 + r[0]) * ... * (1 + r[t])`, measured against
//! its running maximum `m[t]`. The curve starts at `1 + r[0]` rather than 1.0,
//! so a loss on the first observation is not itself a drawdown.
//!
//! Precondition: at least two usable (non-NaN) observations. Shorter input is
//! not guarded and yields `-0.0`.

fn growth_curve(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .filter(|r| !r.is_nan())
        .scan(1.0_f64, |g, r| {
            *g *= 1.0 + r;
            Some(*g)
        })
        .collect()
}

/// Drawdown `1 - g[t] / m[t]` at every usable observation (all values >= 0).
pub fn drawdown_curve(returns: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    growth_curve(returns)
        .into_iter()
        .map(|g| {
            peak = peak.max(g);
            1.0 - g / peak
        })
        .collect()
}

/// Largest peak-to-trough decline, as a non-positive fraction.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let worst = drawdown_curve(returns)
        .into_iter()
        .fold(0.0_f64, f64::max);
    -worst
}
