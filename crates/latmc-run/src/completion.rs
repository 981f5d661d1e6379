use std::collections::BTreeMap;

use latmc_core::{ErrorInfo, McError};
use latmc_stats::{
    component_convergence_check, default_equilibration_check_fn, BasicStatistics,
    BasicStatisticsCalculator, CalcStatisticsFn, EquilibrationCheckFn,
    IndividualConvergenceCheckResult, IndividualEquilibrationCheckResult, RequestedPrecision,
    Sampler, SamplerComponent,
};
use serde::Serialize;

use crate::params::CutoffCheckParams;

/// Parameters combining hard cutoffs with statistical completion criteria.
///
/// The convergence-check schedule reuses the linear / log spacing formula of
/// the sample schedule so that the expensive statistics run at a controlled
/// cadence.
#[derive(Clone)]
pub struct CompletionCheckParams {
    /// Hard cutoffs that prevent the run from stopping too soon, or force it
    /// to stop.
    pub cutoff_params: CutoffCheckParams,
    /// Precision requests per sampler component; empty means completion is
    /// decided by cutoffs alone.
    pub requested_precision: BTreeMap<SamplerComponent, RequestedPrecision>,
    /// Pluggable equilibration check.
    pub equilibration_check_f: EquilibrationCheckFn,
    /// Pluggable statistics calculator.
    pub calc_statistics_f: CalcStatisticsFn,
    /// Logarithmic convergence-check spacing, if true.
    pub log_spacing: bool,
    /// Earliest number of samples at which to begin convergence checking.
    pub check_begin: f64,
    /// A number of samples; the spacing period of convergence checks.
    pub check_period: f64,
    /// Number of convergence checks per period.
    pub checks_per_period: f64,
    /// Logarithmic spacing shift.
    pub check_shift: f64,
}

impl Default for CompletionCheckParams {
    fn default() -> Self {
        Self {
            cutoff_params: CutoffCheckParams::default(),
            requested_precision: BTreeMap::new(),
            equilibration_check_f: default_equilibration_check_fn(),
            calc_statistics_f: BasicStatisticsCalculator::default().shared(),
            log_spacing: false,
            check_begin: 0.0,
            check_period: 10.0,
            checks_per_period: 1.0,
            check_shift: 1.0,
        }
    }
}

impl std::fmt::Debug for CompletionCheckParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionCheckParams")
            .field("cutoff_params", &self.cutoff_params)
            .field("requested_precision", &self.requested_precision)
            .field("log_spacing", &self.log_spacing)
            .field("check_begin", &self.check_begin)
            .field("check_period", &self.check_period)
            .field("checks_per_period", &self.checks_per_period)
            .field("check_shift", &self.check_shift)
            .finish()
    }
}

impl CompletionCheckParams {
    /// Rejects invalid parameters before a run starts.
    pub fn validate(&self) -> Result<(), McError> {
        if self.log_spacing && self.check_period <= 1.0 {
            return Err(McError::Config(
                ErrorInfo::new("log-period", "log spacing requires period > 1")
                    .with_context("period", self.check_period.to_string()),
            ));
        }
        if !self.log_spacing && self.check_period <= 0.0 {
            return Err(McError::Config(
                ErrorInfo::new("linear-period", "linear spacing requires period > 0")
                    .with_context("period", self.check_period.to_string()),
            ));
        }
        if self.checks_per_period <= 0.0 {
            return Err(McError::Config(
                ErrorInfo::new("checks-per-period", "checks_per_period must be positive")
                    .with_context("checks_per_period", self.checks_per_period.to_string()),
            ));
        }
        Ok(())
    }
}

/// Equilibration result for one requested component.
#[derive(Debug, Clone, Serialize)]
pub struct IndividualEquilibrationEntry {
    /// The component the check applies to.
    pub component: SamplerComponent,
    /// The check outcome.
    #[serde(flatten)]
    pub result: IndividualEquilibrationCheckResult,
}

/// Combined equilibration results over all requested components.
#[derive(Debug, Clone, Serialize)]
pub struct EquilibrationCheckResults {
    /// Whether every requested component has equilibrated.
    pub all_equilibrated: bool,
    /// Number of samples to discard so that every component is equilibrated.
    pub n_samples_for_all_to_equilibrate: usize,
    /// Per-component results.
    pub individual_results: Vec<IndividualEquilibrationEntry>,
}

/// Convergence result for one requested component.
#[derive(Debug, Clone, Serialize)]
pub struct IndividualConvergenceEntry {
    /// The component the check applies to.
    pub component: SamplerComponent,
    /// The check outcome, with the numbers for reporting.
    #[serde(flatten)]
    pub result: IndividualConvergenceCheckResult,
}

/// Combined convergence results over all requested components.
#[derive(Debug, Clone, Serialize)]
pub struct ConvergenceCheckResults {
    /// Whether every requested component reached its requested precision.
    pub all_converged: bool,
    /// Number of samples the statistics were computed from.
    pub n_samples_for_statistics: usize,
    /// Per-component results.
    pub individual_results: Vec<IndividualConvergenceEntry>,
}

/// Self-describing completion state, updated on every check.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionCheckResults {
    /// Whether all configured minimum cutoffs are satisfied.
    pub has_all_minimums_met: bool,
    /// Whether any configured maximum cutoff is reached.
    pub has_any_maximum_met: bool,
    /// Step or pass count at the last check.
    pub count: u64,
    /// Simulated time at the last check, if the method tracks time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    /// Elapsed wall-clock seconds at the last check.
    pub clocktime: f64,
    /// Number of samples at the last check.
    pub n_samples: usize,
    /// Whether the run is finished.
    pub is_complete: bool,
    /// Number of samples when the last convergence check ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_samples_at_convergence_check: Option<usize>,
    /// Equilibration results of the last convergence check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equilibration_check_results: Option<EquilibrationCheckResults>,
    /// Convergence results of the last convergence check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convergence_check_results: Option<ConvergenceCheckResults>,
}

impl CompletionCheckResults {
    fn empty() -> Self {
        Self {
            has_all_minimums_met: false,
            has_any_maximum_met: false,
            count: 0,
            time: None,
            clocktime: 0.0,
            n_samples: 0,
            is_complete: false,
            n_samples_at_convergence_check: None,
            equilibration_check_results: None,
            convergence_check_results: None,
        }
    }
}

/// Decides when a run is finished.
///
/// The run is complete iff any maximum cutoff is reached, or all minimum
/// cutoffs are satisfied, precision was requested, the convergence-check
/// schedule is due, and every requested component is both equilibrated and
/// converged.
pub struct CompletionCheck {
    params: CompletionCheckParams,
    results: CompletionCheckResults,
    next_check_index: u64,
}

impl std::fmt::Debug for CompletionCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionCheck")
            .field("params", &self.params)
            .field("results", &self.results)
            .field("next_check_index", &self.next_check_index)
            .finish()
    }
}

impl CompletionCheck {
    /// Creates a completion check, validating the parameters.
    pub fn new(params: CompletionCheckParams) -> Result<Self, McError> {
        params.validate()?;
        Ok(Self {
            params,
            results: CompletionCheckResults::empty(),
            next_check_index: 0,
        })
    }

    /// The sample count at which the `n`-th convergence check is scheduled.
    fn check_at(&self, n: f64) -> f64 {
        if self.params.log_spacing {
            self.params.check_begin
                + self
                    .params
                    .check_period
                    .powf((n + self.params.check_shift) / self.params.checks_per_period)
        } else {
            self.params.check_begin + (self.params.check_period / self.params.checks_per_period) * n
        }
    }

    /// Evaluates completion at the current run position.
    ///
    /// Reads, but never mutates, the sampled data.
    pub fn is_complete(
        &mut self,
        samplers: &BTreeMap<String, Sampler>,
        sample_weight: &Sampler,
        count: u64,
        time: Option<f64>,
        clocktime: f64,
    ) -> Result<bool, McError> {
        let n_samples = samplers
            .values()
            .next()
            .map(Sampler::n_samples)
            .unwrap_or(0);

        self.results.count = count;
        self.results.time = time;
        self.results.clocktime = clocktime;
        self.results.n_samples = n_samples;
        self.results.has_all_minimums_met = self.params.cutoff_params.all_minimums_met(
            count,
            n_samples as u64,
            time,
            clocktime,
        );
        self.results.has_any_maximum_met = self.params.cutoff_params.any_maximum_met(
            count,
            n_samples as u64,
            time,
            clocktime,
        );

        if self.results.has_any_maximum_met {
            self.results.is_complete = true;
            // Run a final convergence check so the results report the
            // statistics reached when the run was cut off.
            if !self.params.requested_precision.is_empty() && n_samples >= 2 {
                self.run_convergence_checks(samplers, sample_weight, n_samples)?;
            }
            return Ok(true);
        }

        let due = self.results.has_all_minimums_met
            && !self.params.requested_precision.is_empty()
            && n_samples >= 2
            && n_samples as f64 >= self.check_at(self.next_check_index as f64).round();
        if due {
            let converged = self.run_convergence_checks(samplers, sample_weight, n_samples)?;
            while self.check_at(self.next_check_index as f64).round() <= n_samples as f64 {
                self.next_check_index += 1;
            }
            self.results.is_complete = converged;
        } else {
            self.results.is_complete = false;
        }
        Ok(self.results.is_complete)
    }

    /// Runs the equilibration and (when all components are equilibrated) the
    /// convergence check; returns whether everything equilibrated and
    /// converged.
    fn run_convergence_checks(
        &mut self,
        samplers: &BTreeMap<String, Sampler>,
        sample_weight: &Sampler,
        n_samples: usize,
    ) -> Result<bool, McError> {
        let weights: Vec<f64> = if sample_weight.n_samples() > 0 {
            sample_weight.component(0)?
        } else {
            Vec::new()
        };

        let mut series = Vec::with_capacity(self.params.requested_precision.len());
        for (component, requested) in &self.params.requested_precision {
            let sampler = samplers.get(&component.sampler_name).ok_or_else(|| {
                McError::Sampling(
                    ErrorInfo::new("unknown-sampler", "requested precision names no sampler")
                        .with_context("sampler_name", component.sampler_name.clone()),
                )
            })?;
            let observations = sampler.component(component.component_index)?;
            series.push((component.clone(), *requested, observations));
        }

        let mut equilibration_entries = Vec::with_capacity(series.len());
        let mut all_equilibrated = true;
        let mut n_for_all = 0;
        for (component, requested, observations) in &series {
            let result = (self.params.equilibration_check_f)(observations, &weights, *requested);
            all_equilibrated &= result.is_equilibrated;
            n_for_all = n_for_all.max(result.n_samples_for_equilibration);
            equilibration_entries.push(IndividualEquilibrationEntry {
                component: component.clone(),
                result,
            });
        }
        self.results.equilibration_check_results = Some(EquilibrationCheckResults {
            all_equilibrated,
            n_samples_for_all_to_equilibrate: n_for_all,
            individual_results: equilibration_entries,
        });
        self.results.n_samples_at_convergence_check = Some(n_samples);

        if !all_equilibrated {
            self.results.convergence_check_results = None;
            return Ok(false);
        }

        // Statistics are computed on the common equilibrated tail.
        let mut convergence_entries = Vec::with_capacity(series.len());
        let mut all_converged = true;
        let tail_len = n_samples.saturating_sub(n_for_all);
        for (component, requested, observations) in &series {
            let tail = &observations[n_for_all..];
            let weight_tail: &[f64] = if weights.is_empty() {
                &[]
            } else {
                weights.get(n_for_all..).unwrap_or(&[])
            };
            let stats = if tail.len() >= 2 {
                (self.params.calc_statistics_f)(tail, weight_tail)?
            } else {
                BasicStatistics {
                    mean: f64::NAN,
                    calculated_precision: f64::INFINITY,
                }
            };
            let result = component_convergence_check(stats, *requested);
            all_converged &= result.is_converged;
            convergence_entries.push(IndividualConvergenceEntry {
                component: component.clone(),
                result,
            });
        }
        self.results.convergence_check_results = Some(ConvergenceCheckResults {
            all_converged,
            n_samples_for_statistics: tail_len,
            individual_results: convergence_entries,
        });
        Ok(all_converged)
    }

    /// The parameters the check was built from.
    pub fn params(&self) -> &CompletionCheckParams {
        &self.params
    }

    /// The results of the most recent evaluation.
    pub fn results(&self) -> &CompletionCheckResults {
        &self.results
    }
}
