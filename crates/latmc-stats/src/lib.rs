#![deny(missing_docs)]

//! Observation storage and statistics for latmc Monte Carlo runs.
//!
//! A [`Sampler`] stores the raw observation matrix for one sampled quantity.
//! [`BasicStatisticsCalculator`] estimates the precision of the mean of a
//! (possibly weighted) observation series, accounting for autocorrelation.
//! The equilibration and convergence checks decide whether the head of a
//! series is transient and whether the requested precision has been reached.

/// Precision comparison of the mean of an equilibrated series.
pub mod convergence;
/// Detection of the transient head of an observation series.
pub mod equilibration;
/// Append-only observation matrices and per-component addressing.
pub mod sampler;
/// Mean and precision estimation for weighted and unweighted series.
pub mod statistics;

pub use convergence::{component_convergence_check, IndividualConvergenceCheckResult};
pub use equilibration::{
    default_equilibration_check, default_equilibration_check_fn, EquilibrationCheckFn,
    IndividualEquilibrationCheckResult,
};
pub use sampler::{
    default_component_names, unroll_column_major, RequestedPrecision, Sampler, SamplerComponent,
};
pub use statistics::{
    BasicStatistics, BasicStatisticsCalculator, CalcStatisticsFn, WeightedObservationsMethod,
};
