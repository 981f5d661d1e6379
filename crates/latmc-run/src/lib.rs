#![deny(missing_docs)]

//! Sampling schedules, completion checks and run management for lattice
//! occupation Monte Carlo.
//!
//! A [`StateSampler`] decides *when* a sample is taken and captures the
//! observations; a [`CompletionCheck`] decides *when a run is finished*; a
//! [`RunManager`] multiplexes several sampling fixtures over one simulation.
//! The [`metropolis`] and [`kinetic`] modules provide the driving loops.

/// Results-analysis functions evaluated after a run.
pub mod analysis;
/// Completion checking: cutoffs plus equilibration and convergence.
pub mod completion;
/// Named sampling-function objects.
pub mod function;
/// Kinetic (rejection-free) Monte Carlo driving loop.
pub mod kinetic;
/// Periodic status snapshots and the run wall clock.
pub mod method_log;
/// Semi-grand canonical Metropolis driving loop.
pub mod metropolis;
/// Sampling, cutoff and convergence configuration records.
pub mod params;
/// Serialization of sampled data.
pub mod results;
/// Run management across sampling fixtures.
pub mod run_manager;
/// The occupation-state contract drivers rely on.
pub mod state;
/// Step / pass / time counters and sample capture.
pub mod state_sampler;

pub use analysis::{make_analysis, ResultsAnalysisFunction, ResultsAnalysisFunctionMap};
pub use completion::{
    CompletionCheck, CompletionCheckParams, CompletionCheckResults, ConvergenceCheckResults,
    EquilibrationCheckResults, IndividualConvergenceEntry, IndividualEquilibrationEntry,
};
pub use function::{StateSamplingFunction, StateSamplingFunctionMap};
pub use kinetic::{kinetic_monte_carlo, EventSelector, KmcData};
pub use method_log::{MethodLog, RunClock};
pub use metropolis::occupation_metropolis;
pub use params::{requested_precision_map, Bounds, ConvergenceSpec, CutoffCheckParams, SamplingParams};
pub use results::{sampled_data, SampledData};
pub use run_manager::{RunManager, SamplingFixture};
pub use state::OccupationState;
pub use state_sampler::StateSampler;
