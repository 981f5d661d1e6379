use serde::{Deserialize, Serialize};

use crate::sampler::RequestedPrecision;
use crate::statistics::BasicStatistics;

/// Outcome of the convergence check for one sampler component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndividualConvergenceCheckResult {
    /// Whether every enabled precision requirement is satisfied.
    pub is_converged: bool,
    /// The precision that was requested.
    pub requested_precision: RequestedPrecision,
    /// Statistics computed on the equilibrated tail.
    pub stats: BasicStatistics,
}

/// Compares calculated precision against a precision request.
///
/// The component is converged iff every enabled test passes: the absolute
/// test compares `calculated_precision` against `abs_precision`, the relative
/// test against `rel_precision * |mean|`.
pub fn component_convergence_check(
    stats: BasicStatistics,
    requested_precision: RequestedPrecision,
) -> IndividualConvergenceCheckResult {
    let mut is_converged = true;
    if requested_precision.abs_convergence_is_required {
        is_converged &= stats.calculated_precision < requested_precision.abs_precision;
    }
    if requested_precision.rel_convergence_is_required {
        is_converged &=
            stats.calculated_precision < requested_precision.rel_precision * stats.mean.abs();
    }
    IndividualConvergenceCheckResult {
        is_converged,
        requested_precision,
        stats,
    }
}
