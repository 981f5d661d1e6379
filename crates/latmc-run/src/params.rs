use std::collections::BTreeMap;
use std::collections::BTreeSet;

use latmc_core::{ErrorInfo, McError, SampleMethod, SampleMode};
use latmc_stats::{RequestedPrecision, SamplerComponent};
use serde::{Deserialize, Serialize};

use crate::function::StateSamplingFunctionMap;

/// Parameters determining when samples are taken and what is sampled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Sample by step, pass, or time (time only where the method allows it).
    #[serde(rename = "sample_by")]
    pub sample_mode: SampleMode,
    /// Linear or logarithmic sample spacing.
    #[serde(rename = "spacing", default = "default_sample_method")]
    pub sample_method: SampleMethod,
    /// Count or time at which the first sample is scheduled.
    #[serde(default)]
    pub begin: f64,
    /// A number of counts, or a period of time; see [`SampleMethod`].
    pub period: f64,
    /// How many samples to take per period.
    #[serde(default = "default_samples_per_period")]
    pub samples_per_period: f64,
    /// Logarithmic spacing shift.
    #[serde(default)]
    pub shift: f64,
    /// If true, the deterministic spacing only sets the sampling rate and the
    /// next sample instant is drawn from the matching renewal process.
    #[serde(default)]
    pub stochastic_sample_period: bool,
    /// Names of the quantities to sample.
    #[serde(rename = "quantities", default)]
    pub sampler_names: Vec<String>,
    /// If true, the configuration is snapshotted whenever a sample is taken.
    #[serde(rename = "sample_trajectory", default)]
    pub do_sample_trajectory: bool,
    /// If true, the simulated time is recorded whenever a sample is taken.
    #[serde(default)]
    pub do_sample_time: bool,
}

fn default_sample_method() -> SampleMethod {
    SampleMethod::Linear
}

fn default_samples_per_period() -> f64 {
    1.0
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            sample_mode: SampleMode::Pass,
            sample_method: SampleMethod::Linear,
            begin: 0.0,
            period: 1.0,
            samples_per_period: 1.0,
            shift: 0.0,
            stochastic_sample_period: false,
            sampler_names: Vec::new(),
            do_sample_trajectory: false,
            do_sample_time: false,
        }
    }
}

impl SamplingParams {
    /// Rejects invalid parameters before a run starts.
    ///
    /// `time_sampling_allowed` is false for methods without a simulated time
    /// (e.g. Metropolis); `sampling_function_names` are the known quantities.
    pub fn validate<'n>(
        &self,
        sampling_function_names: impl IntoIterator<Item = &'n String>,
        time_sampling_allowed: bool,
    ) -> Result<(), McError> {
        if self.sample_mode == SampleMode::Time && !time_sampling_allowed {
            return Err(McError::Config(ErrorInfo::new(
                "sample-by-time",
                "this method does not support sampling by time",
            )));
        }
        match self.sample_method {
            SampleMethod::Log if self.period <= 1.0 => {
                return Err(McError::Config(
                    ErrorInfo::new("log-period", "log spacing requires period > 1")
                        .with_context("period", self.period.to_string()),
                ));
            }
            SampleMethod::Linear if self.period <= 0.0 => {
                return Err(McError::Config(
                    ErrorInfo::new("linear-period", "linear spacing requires period > 0")
                        .with_context("period", self.period.to_string()),
                ));
            }
            _ => {}
        }
        if self.samples_per_period <= 0.0 {
            return Err(McError::Config(
                ErrorInfo::new("samples-per-period", "samples_per_period must be positive")
                    .with_context("samples_per_period", self.samples_per_period.to_string()),
            ));
        }
        let known: BTreeSet<&String> = sampling_function_names.into_iter().collect();
        for name in &self.sampler_names {
            if !known.contains(name) {
                return Err(McError::Config(
                    ErrorInfo::new("unknown-quantity", "not a sampling option")
                        .with_context("quantity", name.clone()),
                ));
            }
        }
        Ok(())
    }
}

/// Optional lower and upper bound on one run quantity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bounds<T> {
    /// Applies a minimum, if set.
    #[serde(default)]
    pub min: Option<T>,
    /// Applies a maximum, if set.
    #[serde(default)]
    pub max: Option<T>,
}

impl<T> Default for Bounds<T> {
    fn default() -> Self {
        Self {
            min: None,
            max: None,
        }
    }
}

/// Hard cutoffs that prevent a run from stopping too soon, or force it to
/// stop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CutoffCheckParams {
    /// Bounds on the step or pass count.
    #[serde(default)]
    pub count: Bounds<u64>,
    /// Bounds on the number of samples taken.
    #[serde(default)]
    pub sample: Bounds<u64>,
    /// Bounds on simulated time (time-based methods only).
    #[serde(default)]
    pub time: Bounds<f64>,
    /// Bounds on elapsed wall-clock seconds.
    #[serde(default)]
    pub clocktime: Bounds<f64>,
}

impl CutoffCheckParams {
    /// Whether every configured minimum is satisfied.
    pub fn all_minimums_met(
        &self,
        count: u64,
        n_samples: u64,
        time: Option<f64>,
        clocktime: f64,
    ) -> bool {
        if let Some(min) = self.count.min {
            if count < min {
                return false;
            }
        }
        if let Some(min) = self.sample.min {
            if n_samples < min {
                return false;
            }
        }
        if let (Some(min), Some(time)) = (self.time.min, time) {
            if time < min {
                return false;
            }
        }
        if let Some(min) = self.clocktime.min {
            if clocktime < min {
                return false;
            }
        }
        true
    }

    /// Whether any configured maximum is reached.
    pub fn any_maximum_met(
        &self,
        count: u64,
        n_samples: u64,
        time: Option<f64>,
        clocktime: f64,
    ) -> bool {
        if let Some(max) = self.count.max {
            if count >= max {
                return true;
            }
        }
        if let Some(max) = self.sample.max {
            if n_samples >= max {
                return true;
            }
        }
        if let (Some(max), Some(time)) = (self.time.max, time) {
            if time >= max {
                return true;
            }
        }
        if let Some(max) = self.clocktime.max {
            if clocktime >= max {
                return true;
            }
        }
        false
    }
}

/// One convergence request: a quantity, a precision, and optionally a subset
/// of its components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceSpec {
    /// Name of the sampled quantity.
    pub quantity: String,
    /// Requested absolute precision, if any.
    #[serde(default)]
    pub abs_precision: Option<f64>,
    /// Requested relative precision (scaled by `|mean|`), if any.
    #[serde(default)]
    pub rel_precision: Option<f64>,
    /// Components selected by index. Mutually exclusive with
    /// `component_name`; omitting both converges all components.
    #[serde(default)]
    pub component_index: Option<Vec<usize>>,
    /// Components selected by name.
    #[serde(default)]
    pub component_name: Option<Vec<String>>,
}

/// Resolves convergence specifications against the sampling-function registry
/// into a per-component precision request map.
pub fn requested_precision_map<C>(
    specs: &[ConvergenceSpec],
    sampling_functions: &StateSamplingFunctionMap<C>,
) -> Result<BTreeMap<SamplerComponent, RequestedPrecision>, McError> {
    let mut map = BTreeMap::new();
    for spec in specs {
        let function = sampling_functions.get(&spec.quantity).ok_or_else(|| {
            McError::Config(
                ErrorInfo::new("unknown-quantity", "not a sampling option")
                    .with_context("quantity", spec.quantity.clone()),
            )
        })?;
        let precision = match (spec.abs_precision, spec.rel_precision) {
            (Some(abs), Some(rel)) => RequestedPrecision::abs_and_rel(abs, rel),
            (Some(abs), None) => RequestedPrecision::abs(abs),
            (None, Some(rel)) => RequestedPrecision::rel(rel),
            (None, None) => {
                return Err(McError::Config(
                    ErrorInfo::new("missing-precision", "no precision requested")
                        .with_context("quantity", spec.quantity.clone()),
                ));
            }
        };

        let names = &function.component_names;
        let indices: Vec<usize> = match (&spec.component_index, &spec.component_name) {
            (Some(_), Some(_)) => {
                return Err(McError::Config(
                    ErrorInfo::new(
                        "component-selector",
                        "cannot specify both component_index and component_name",
                    )
                    .with_context("quantity", spec.quantity.clone()),
                ));
            }
            (Some(indices), None) => {
                for &index in indices {
                    if index >= names.len() {
                        return Err(McError::Config(
                            ErrorInfo::new("component-range", "component index out of range")
                                .with_context("quantity", spec.quantity.clone())
                                .with_context("component_index", index.to_string())
                                .with_context("n_components", names.len().to_string()),
                        ));
                    }
                }
                indices.clone()
            }
            (None, Some(selected)) => {
                let mut indices = Vec::with_capacity(selected.len());
                for name in selected {
                    let index = names.iter().position(|n| n == name).ok_or_else(|| {
                        McError::Config(
                            ErrorInfo::new("component-name", "component name not found")
                                .with_context("quantity", spec.quantity.clone())
                                .with_context("component_name", name.clone()),
                        )
                    })?;
                    indices.push(index);
                }
                indices
            }
            (None, None) => (0..names.len()).collect(),
        };

        for index in indices {
            map.insert(
                SamplerComponent::new(spec.quantity.clone(), index, names[index].clone()),
                precision,
            );
        }
    }
    Ok(map)
}
