use std::collections::BTreeMap;

use latmc_core::{ErrorInfo, McError, RngHandle, SampleMethod, SampleMode};
use latmc_stats::Sampler;

use crate::function::{StateSamplingFunction, StateSamplingFunctionMap};
use crate::params::SamplingParams;

/// Encapsulates when samples are taken, the functions that take them, the
/// step / pass / time counters, and the sampled data.
///
/// Call [`StateSampler::reset`] with the number of steps per pass before
/// sampling begins. The driving loop then advances the counters with
/// [`StateSampler::increment_step`] and offers sampling opportunities through
/// the `*_if_due` methods.
pub struct StateSampler<C> {
    rng: RngHandle,

    /// Sample by step, pass, or time.
    pub sample_mode: SampleMode,
    /// Linear or logarithmic spacing.
    pub sample_method: SampleMethod,
    /// Count or time of the first scheduled sample.
    pub begin: f64,
    /// Spacing period; see [`SampleMethod`].
    pub period: f64,
    /// Samples per period.
    pub samples_per_period: f64,
    /// Logarithmic spacing shift.
    pub shift: f64,
    /// Whether the next sample instant is drawn stochastically at the
    /// deterministic spacing's rate.
    pub stochastic_sample_period: bool,
    /// Whether the configuration is snapshotted at each sample.
    pub do_sample_trajectory: bool,
    /// Whether the simulated time is recorded at each sample.
    pub do_sample_time: bool,

    functions: Vec<StateSamplingFunction<C>>,

    /// Monte Carlo steps within the current pass.
    pub step: u64,
    /// Completed passes.
    pub pass: u64,
    /// Steps per pass; conventionally the number of mutating sites.
    pub steps_per_pass: u64,
    /// The step or pass count, depending on the sampling mode.
    pub count: u64,
    /// Simulated time, where applicable.
    pub time: f64,
    /// Steps with an accepted event.
    pub n_accept: u64,
    /// Steps with a rejected event.
    pub n_reject: u64,
    /// Next count at which a sample is due, for count-based sampling.
    pub next_sample_count: u64,
    /// Next time at which a sample is due, for time-based sampling.
    pub next_sample_time: f64,

    samplers: BTreeMap<String, Sampler>,
    sample_weight: Sampler,

    /// Count at which each sample was taken.
    pub sample_count: Vec<u64>,
    /// Simulated time of each sample, if recorded.
    pub sample_time: Vec<f64>,
    /// Wall-clock seconds at each sample.
    pub sample_clocktime: Vec<f64>,
    /// Configuration snapshot at each sample, if recorded.
    pub sample_trajectory: Vec<C>,
}

impl<C: std::fmt::Debug> std::fmt::Debug for StateSampler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSampler")
            .field("rng", &self.rng)
            .field("sample_mode", &self.sample_mode)
            .field("sample_method", &self.sample_method)
            .field("begin", &self.begin)
            .field("period", &self.period)
            .field("samples_per_period", &self.samples_per_period)
            .field("shift", &self.shift)
            .field("stochastic_sample_period", &self.stochastic_sample_period)
            .field("do_sample_trajectory", &self.do_sample_trajectory)
            .field("do_sample_time", &self.do_sample_time)
            .field("functions", &self.functions)
            .field("step", &self.step)
            .field("pass", &self.pass)
            .field("steps_per_pass", &self.steps_per_pass)
            .field("count", &self.count)
            .field("time", &self.time)
            .field("n_accept", &self.n_accept)
            .field("n_reject", &self.n_reject)
            .field("next_sample_count", &self.next_sample_count)
            .field("next_sample_time", &self.next_sample_time)
            .field("samplers", &self.samplers)
            .field("sample_weight", &self.sample_weight)
            .field("sample_count", &self.sample_count)
            .field("sample_time", &self.sample_time)
            .field("sample_clocktime", &self.sample_clocktime)
            .field("sample_trajectory", &self.sample_trajectory)
            .finish()
    }
}

impl<C: Clone> StateSampler<C> {
    /// Creates a sampler from parameters, resolving the requested quantities
    /// against the sampling-function registry.
    ///
    /// The RNG handle drives the stochastic sample schedule and must be an
    /// independent substream per sampler.
    pub fn new(
        params: &SamplingParams,
        sampling_functions: &StateSamplingFunctionMap<C>,
        rng: RngHandle,
    ) -> Result<Self, McError> {
        let mut functions = Vec::with_capacity(params.sampler_names.len());
        for name in &params.sampler_names {
            let function = sampling_functions.get(name).ok_or_else(|| {
                McError::Config(
                    ErrorInfo::new("unknown-quantity", "not a sampling option")
                        .with_context("quantity", name.clone()),
                )
            })?;
            functions.push(function.clone());
        }
        let mut sampler = Self {
            rng,
            sample_mode: params.sample_mode,
            sample_method: params.sample_method,
            begin: params.begin,
            period: params.period,
            samples_per_period: params.samples_per_period,
            shift: params.shift,
            stochastic_sample_period: params.stochastic_sample_period,
            do_sample_trajectory: params.do_sample_trajectory,
            do_sample_time: params.do_sample_time,
            functions,
            step: 0,
            pass: 0,
            steps_per_pass: 1,
            count: 0,
            time: 0.0,
            n_accept: 0,
            n_reject: 0,
            next_sample_count: 0,
            next_sample_time: 0.0,
            samplers: BTreeMap::new(),
            sample_weight: Sampler::new(vec![]),
            sample_count: Vec::new(),
            sample_time: Vec::new(),
            sample_clocktime: Vec::new(),
            sample_trajectory: Vec::new(),
        };
        sampler.reset(1)?;
        Ok(sampler)
    }

    /// Resets counters, clears all sampled data, re-creates the samplers and
    /// arms the first sample target.
    pub fn reset(&mut self, steps_per_pass: u64) -> Result<(), McError> {
        self.steps_per_pass = steps_per_pass;
        self.step = 0;
        self.pass = 0;
        self.count = 0;
        self.time = 0.0;
        self.n_accept = 0;
        self.n_reject = 0;

        self.samplers.clear();
        for function in &self.functions {
            let sampler = Sampler::with_component_names(
                function.shape.clone(),
                function.component_names.clone(),
            )?;
            self.samplers.insert(function.name.clone(), sampler);
        }
        self.sample_weight = Sampler::new(vec![]);
        self.sample_count.clear();
        self.sample_time.clear();
        self.sample_clocktime.clear();
        self.sample_trajectory.clear();

        if self.sample_mode == SampleMode::Time {
            self.next_sample_count = 0;
            self.next_sample_time = self.sample_at(0);
            if self.next_sample_time < 0.0 {
                return Err(schedule_error(
                    "negative-sample-time",
                    "first sample time is negative",
                    self.next_sample_time,
                ));
            }
        } else {
            self.next_sample_time = 0.0;
            let target = self.sample_at(0).round();
            if target < 0.0 {
                return Err(schedule_error(
                    "negative-sample-count",
                    "first sample count is negative",
                    target,
                ));
            }
            self.next_sample_count = target as u64;
        }
        Ok(())
    }

    /// The count or time at which the `sample_index`-th sample should be
    /// taken.
    ///
    /// With `stochastic_sample_period`, the deterministic spacing only fixes
    /// the instantaneous sampling rate and the next instant is drawn relative
    /// to the previous sample: a geometric trial for counts, an exponential
    /// draw for time.
    fn sample_at(&mut self, sample_index: usize) -> f64 {
        if self.stochastic_sample_period {
            if sample_index == 0 {
                return self.begin;
            }
            let n = sample_index as f64;
            let rate = match self.sample_method {
                SampleMethod::Linear => self.samples_per_period / self.period,
                SampleMethod::Log => {
                    self.samples_per_period
                        / (self.period.ln()
                            * self
                                .period
                                .powf((n + self.shift) / self.samples_per_period))
                }
            };
            if self.sample_mode == SampleMode::Time {
                self.time + self.stochastic_time_step(rate)
            } else {
                self.count as f64 + self.stochastic_count_step(rate) as f64
            }
        } else {
            let n = sample_index as f64;
            match self.sample_method {
                SampleMethod::Linear => self.begin + (self.period / self.samples_per_period) * n,
                SampleMethod::Log => {
                    self.begin
                        + self
                            .period
                            .powf((n + self.shift) / self.samples_per_period)
                }
            }
        }
    }

    /// Geometric trial: accept the current count offset with probability
    /// `sample_rate`, else advance.
    fn stochastic_count_step(&mut self, sample_rate: f64) -> u64 {
        let mut dn = 1;
        loop {
            if self.rng.uniform_real(1.0) < sample_rate {
                return dn;
            }
            dn += 1;
        }
    }

    /// Exponential inter-sample time at the given rate.
    fn stochastic_time_step(&mut self, sample_rate: f64) -> f64 {
        -ln_nonzero(&mut self.rng) / sample_rate
    }

    /// True if a count-based sample is due at the current count.
    pub fn sample_is_due_by_count(&self) -> bool {
        self.sample_mode != SampleMode::Time && self.count == self.next_sample_count
    }

    /// True if a time-based sample is due at or before `event_time`.
    pub fn sample_is_due_by_time(&self, event_time: f64) -> bool {
        self.sample_mode == SampleMode::Time && event_time >= self.next_sample_time
    }

    /// Takes a sample: records the side channels, evaluates every sampling
    /// function, and schedules the next sample.
    ///
    /// The next target must be strictly past the current position; anything
    /// else is a schedule violation and fatal.
    pub fn sample_data(&mut self, state: &C, clocktime: f64) -> Result<(), McError> {
        self.sample_count.push(self.count);
        if self.do_sample_time {
            self.sample_time.push(self.time);
        }
        self.sample_clocktime.push(clocktime);
        if self.do_sample_trajectory {
            self.sample_trajectory.push(state.clone());
        }

        for function in &self.functions {
            let observation = (function.function)(state);
            let sampler = self.samplers.get_mut(&function.name).ok_or_else(|| {
                McError::Sampling(
                    ErrorInfo::new("unknown-sampler", "no sampler for function")
                        .with_context("function", function.name.clone()),
                )
            })?;
            sampler.push_back(&observation)?;
        }

        let n_samples = self.sample_count.len();
        if self.sample_mode == SampleMode::Time {
            self.next_sample_time = self.sample_at(n_samples);
            if self.next_sample_time <= self.time {
                return Err(schedule_error(
                    "non-monotonic-time",
                    "next sample time is not past the current time",
                    self.next_sample_time,
                ));
            }
        } else {
            let target = self.sample_at(n_samples).round();
            if target <= self.count as f64 {
                return Err(schedule_error(
                    "non-monotonic-count",
                    "next sample count is not past the current count",
                    target,
                ));
            }
            self.next_sample_count = target as u64;
        }
        Ok(())
    }

    /// Takes a sample if one is due by count.
    pub fn sample_data_by_count_if_due(&mut self, state: &C, clocktime: f64) -> Result<bool, McError> {
        if self.sample_is_due_by_count() {
            self.sample_data(state, clocktime)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Takes a sample if one is due by time.
    ///
    /// The recorded time is the scheduled `next_sample_time`, not
    /// `event_time`: this keeps sample times on the regular schedule lattice,
    /// while the sampled observables are evaluated at the current post-event
    /// configuration.
    pub fn sample_data_by_time_if_due(
        &mut self,
        state: &C,
        event_time: f64,
        clocktime: f64,
    ) -> Result<bool, McError> {
        if self.sample_is_due_by_time(event_time) {
            self.time = self.next_sample_time;
            self.sample_data(state, clocktime)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Sets the weight given to the next (or just-taken) sample.
    pub fn push_back_sample_weight(&mut self, weight: f64) -> Result<(), McError> {
        self.sample_weight.push_back(&[weight])
    }

    /// Increments the step counter, updating pass and count as appropriate.
    pub fn increment_step(&mut self) {
        self.step += 1;
        if self.sample_mode == SampleMode::Step {
            self.count += 1;
        }
        if self.step == self.steps_per_pass {
            self.pass += 1;
            if self.sample_mode != SampleMode::Step {
                self.count += 1;
            }
            self.step = 0;
        }
    }

    /// Records one acceptance.
    pub fn increment_n_accept(&mut self) {
        self.n_accept += 1;
    }

    /// Records one rejection.
    pub fn increment_n_reject(&mut self) {
        self.n_reject += 1;
    }

    /// Sets the simulated time.
    pub fn set_time(&mut self, event_time: f64) {
        self.time = event_time;
    }

    /// Fraction of steps with an accepted event.
    pub fn acceptance_rate(&self) -> f64 {
        let total = self.n_accept + self.n_reject;
        if total == 0 {
            0.0
        } else {
            self.n_accept as f64 / total as f64
        }
    }

    /// Number of samples taken so far.
    pub fn n_samples(&self) -> usize {
        self.sample_count.len()
    }

    /// The named samplers holding the observation matrices.
    pub fn samplers(&self) -> &BTreeMap<String, Sampler> {
        &self.samplers
    }

    /// One named sampler.
    pub fn sampler(&self, name: &str) -> Option<&Sampler> {
        self.samplers.get(name)
    }

    /// Per-sample weights (empty when unweighted).
    pub fn sample_weight(&self) -> &Sampler {
        &self.sample_weight
    }

    /// The sampling functions, in requested order.
    pub fn functions(&self) -> &[StateSamplingFunction<C>] {
        &self.functions
    }
}

/// Uniform draw in (0, 1] suitable for an exponential inverse transform.
fn ln_nonzero(rng: &mut RngHandle) -> f64 {
    let draw = 1.0 - rng.uniform_real(1.0);
    draw.ln()
}

fn schedule_error(code: &str, message: &str, target: f64) -> McError {
    McError::Schedule(
        ErrorInfo::new(code, message).with_context("target", target.to_string()),
    )
}
