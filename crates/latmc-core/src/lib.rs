#![deny(missing_docs)]
#![doc = "Shared definitions for the latmc Monte Carlo engine: counters, \
sampling modes, structured errors and the deterministic RNG handle."]

use serde::{Deserialize, Serialize};

pub mod errors;
pub mod rng;

pub use errors::{ErrorInfo, McError};
pub use rng::{derive_substream_seed, RngHandle};

/// Counter type used for steps, passes and sample counts.
pub type CountType = u64;

/// Simulated-time type used for kinetic Monte Carlo.
pub type TimeType = f64;

/// What is counted when deciding that a sample is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleMode {
    /// Sample when the step counter reaches the next scheduled count.
    Step,
    /// Sample when the pass counter reaches the next scheduled count.
    Pass,
    /// Sample when simulated time reaches the next scheduled instant.
    Time,
}

/// Spacing of scheduled samples within a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleMethod {
    /// Linearly spaced: the n-th target is `begin + (period / samples_per_period) * n`.
    Linear,
    /// Logarithmically spaced: the n-th target is
    /// `begin + period ^ ((n + shift) / samples_per_period)`.
    Log,
}

impl SampleMode {
    /// Returns the lowercase configuration name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleMode::Step => "step",
            SampleMode::Pass => "pass",
            SampleMode::Time => "time",
        }
    }
}

impl SampleMethod {
    /// Returns the lowercase configuration name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleMethod::Linear => "linear",
            SampleMethod::Log => "log",
        }
    }
}
