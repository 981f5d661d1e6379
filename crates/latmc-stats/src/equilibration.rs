use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::sampler::RequestedPrecision;

/// Outcome of the equilibration check for one observation series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndividualEquilibrationCheckResult {
    /// Whether a stationary tail was found at the requested precision.
    pub is_equilibrated: bool,
    /// Index of the first sample of the stationary tail; equals the series
    /// length when not equilibrated.
    pub n_samples_for_equilibration: usize,
}

/// Signature of a pluggable equilibration check.
pub type EquilibrationCheckFn =
    Arc<dyn Fn(&[f64], &[f64], RequestedPrecision) -> IndividualEquilibrationCheckResult>;

/// Locates the smallest prefix length `k` such that the tail `x[k..n)` is
/// statistically indistinguishable from stationary at the requested precision.
///
/// The tail is split into two halves; the tail is accepted as stationary when
/// the absolute difference of the half means is below the requested precision
/// (the relative requirement is scaled by the absolute tail mean). Weighted
/// means are used when `sample_weight` is non-empty.
pub fn default_equilibration_check(
    observations: &[f64],
    sample_weight: &[f64],
    requested_precision: RequestedPrecision,
) -> IndividualEquilibrationCheckResult {
    let n = observations.len();
    if n < 2 {
        return IndividualEquilibrationCheckResult {
            is_equilibrated: false,
            n_samples_for_equilibration: n,
        };
    }

    // Prefix sums keep each candidate start O(1).
    let mut wx_prefix = Vec::with_capacity(n + 1);
    let mut w_prefix = Vec::with_capacity(n + 1);
    wx_prefix.push(0.0);
    w_prefix.push(0.0);
    for (i, &x) in observations.iter().enumerate() {
        let w = if sample_weight.is_empty() {
            1.0
        } else {
            sample_weight[i]
        };
        wx_prefix.push(wx_prefix[i] + w * x);
        w_prefix.push(w_prefix[i] + w);
    }
    let mean_between = |begin: usize, end: usize| -> Option<f64> {
        let w = w_prefix[end] - w_prefix[begin];
        if w > 0.0 {
            Some((wx_prefix[end] - wx_prefix[begin]) / w)
        } else {
            None
        }
    };

    for start in 0..=(n - 2) {
        let mid = start + (n - start) / 2;
        let (first, second) = match (mean_between(start, mid), mean_between(mid, n)) {
            (Some(first), Some(second)) => (first, second),
            _ => continue,
        };
        let tail_mean = match mean_between(start, n) {
            Some(mean) => mean,
            None => continue,
        };
        let mut target = f64::INFINITY;
        if requested_precision.abs_convergence_is_required {
            target = target.min(requested_precision.abs_precision);
        }
        if requested_precision.rel_convergence_is_required {
            target = target.min(requested_precision.rel_precision * tail_mean.abs());
        }
        if (first - second).abs() < target {
            return IndividualEquilibrationCheckResult {
                is_equilibrated: true,
                n_samples_for_equilibration: start,
            };
        }
    }

    IndividualEquilibrationCheckResult {
        is_equilibrated: false,
        n_samples_for_equilibration: n,
    }
}

/// Wraps [`default_equilibration_check`] into the pluggable function-object
/// form.
pub fn default_equilibration_check_fn() -> EquilibrationCheckFn {
    Arc::new(default_equilibration_check)
}
