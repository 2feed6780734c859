//! Shared numerics for logarithmic scoring-rule pricing.
//!
//! Every market-maker variant prices through the same log-sum-exp
//! aggregate; the helpers here keep that math overflow-safe. Naive
//! `exp(x).sum().ln()` saturates to infinity once any state entry
//! exceeds ~709, so all aggregation shifts by the maximum first.

/// Computes `ln(Σ exp(x_i))` with max-subtraction for stability.
///
/// Returns negative infinity for an empty slice (the sum of zero
/// exponentials), and propagates NaN from any non-finite input.
pub fn log_sum_exp(xs: &[f64]) -> f64 {
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        // Empty slice or a non-finite entry dominates the sum.
        return max;
    }
    let sum: f64 = xs.iter().map(|x| (x - max).exp()).sum();
    max + sum.ln()
}

/// Softmax over the given scores: `exp(x_o) / Σ exp(x_i)` per entry.
///
/// The output is a probability vector (non-negative, sums to 1).
pub fn softmax(xs: &[f64]) -> Vec<f64> {
    let lse = log_sum_exp(xs);
    xs.iter().map(|x| (x - lse).exp()).collect()
}

/// Softmax weight of a single entry without materializing the full vector.
pub fn softmax_at(xs: &[f64], index: usize) -> f64 {
    (xs[index] - log_sum_exp(xs)).exp()
}

/// Log-odds transform `ln(p / (1 - p))`, the inverse of the binary softmax.
///
/// Only defined for `p` strictly inside `(0, 1)`; callers validate first.
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// Standard logistic function `1 / (1 + exp(-x))`.
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
