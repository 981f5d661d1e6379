use latmc_core::{McError, RngHandle, SampleMode};
use serde_json::json;

use crate::completion::{CompletionCheck, CompletionCheckParams, CompletionCheckResults};
use crate::function::StateSamplingFunctionMap;
use crate::method_log::{MethodLog, RunClock};
use crate::params::SamplingParams;
use crate::results::{sampled_data, SampledData};
use crate::state_sampler::StateSampler;

/// A named bundle of state sampler and completion check, evaluated over one
/// driving loop.
pub struct SamplingFixture<C> {
    label: String,
    state_sampler: StateSampler<C>,
    completion_check: CompletionCheck,
}

impl<C: Clone> SamplingFixture<C> {
    /// Creates a fixture from its parameter records.
    ///
    /// The RNG handle must be an independent substream per fixture, derived
    /// from the master seed.
    pub fn new(
        label: impl Into<String>,
        sampling_params: &SamplingParams,
        completion_check_params: CompletionCheckParams,
        sampling_functions: &StateSamplingFunctionMap<C>,
        rng: RngHandle,
    ) -> Result<Self, McError> {
        Ok(Self {
            label: label.into(),
            state_sampler: StateSampler::new(sampling_params, sampling_functions, rng)?,
            completion_check: CompletionCheck::new(completion_check_params)?,
        })
    }

    /// The fixture label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The fixture's state sampler.
    pub fn state_sampler(&self) -> &StateSampler<C> {
        &self.state_sampler
    }

    /// Mutable access to the state sampler (for weight pushing and resets).
    pub fn state_sampler_mut(&mut self) -> &mut StateSampler<C> {
        &mut self.state_sampler
    }

    /// The most recent completion check results.
    pub fn results(&self) -> &CompletionCheckResults {
        self.completion_check.results()
    }

    /// The fixture's sampled data in the self-describing layout.
    pub fn sampled_data(&self) -> SampledData {
        sampled_data(&self.state_sampler)
    }

    /// Evaluates the fixture's completion check at the current position.
    pub fn is_complete(&mut self, clocktime: f64) -> Result<bool, McError> {
        let time = self
            .state_sampler
            .do_sample_time
            .then_some(self.state_sampler.time);
        self.completion_check.is_complete(
            self.state_sampler.samplers(),
            self.state_sampler.sample_weight(),
            self.state_sampler.count,
            time,
            clocktime,
        )
    }
}

/// Multiplexes several sampling fixtures over one simulation.
///
/// Counters advance together; sampling fans out to every fixture whose
/// schedule is due, bracketed by caller-supplied pre- and post-sample hooks;
/// the run is complete when every fixture reports completion.
pub struct RunManager<C> {
    fixtures: Vec<SamplingFixture<C>>,
    clock: RunClock,
    method_log: Option<MethodLog>,
    next_sampling_fixture: Option<usize>,
}

impl<C: Clone> RunManager<C> {
    /// Creates a manager over the given fixtures and starts the run clock.
    pub fn new(fixtures: Vec<SamplingFixture<C>>) -> Self {
        Self {
            fixtures,
            clock: RunClock::new(),
            method_log: None,
            next_sampling_fixture: None,
        }
    }

    /// Attaches a status log.
    pub fn with_method_log(mut self, method_log: MethodLog) -> Self {
        self.method_log = Some(method_log);
        self
    }

    /// Resets every fixture and arms the schedules.
    pub fn initialize(&mut self, steps_per_pass: u64) -> Result<(), McError> {
        for fixture in &mut self.fixtures {
            fixture.state_sampler.reset(steps_per_pass)?;
        }
        self.update_next_sampling_fixture();
        Ok(())
    }

    /// The fixtures, in construction order.
    pub fn fixtures(&self) -> &[SamplingFixture<C>] {
        &self.fixtures
    }

    /// Mutable access to the fixtures.
    pub fn fixtures_mut(&mut self) -> &mut [SamplingFixture<C>] {
        &mut self.fixtures
    }

    /// Elapsed wall-clock seconds of this run.
    pub fn clocktime_s(&self) -> f64 {
        self.clock.elapsed_s()
    }

    /// Advances every fixture by one step.
    pub fn increment_step(&mut self) {
        for fixture in &mut self.fixtures {
            fixture.state_sampler.increment_step();
        }
    }

    /// Sets the simulated time on every fixture.
    pub fn set_time(&mut self, event_time: f64) {
        for fixture in &mut self.fixtures {
            fixture.state_sampler.set_time(event_time);
        }
    }

    /// Records one acceptance on every fixture.
    pub fn increment_n_accept(&mut self) {
        for fixture in &mut self.fixtures {
            fixture.state_sampler.increment_n_accept();
        }
    }

    /// Records one rejection on every fixture.
    pub fn increment_n_reject(&mut self) {
        for fixture in &mut self.fixtures {
            fixture.state_sampler.increment_n_reject();
        }
    }

    /// Re-selects the time-based fixture whose next sample instant is
    /// smallest, so callers can read its target without scanning.
    pub fn update_next_sampling_fixture(&mut self) {
        self.next_sampling_fixture = self
            .fixtures
            .iter()
            .enumerate()
            .filter(|(_, fixture)| fixture.state_sampler.sample_mode == SampleMode::Time)
            .min_by(|(_, a), (_, b)| {
                a.state_sampler
                    .next_sample_time
                    .total_cmp(&b.state_sampler.next_sample_time)
            })
            .map(|(index, _)| index);
    }

    /// Next scheduled sample time over all time-based fixtures.
    pub fn next_sample_time(&self) -> Option<f64> {
        self.next_sampling_fixture
            .map(|index| self.fixtures[index].state_sampler.next_sample_time)
    }

    /// Label of the fixture scheduled to sample next, if any samples by time.
    pub fn next_sampling_fixture_label(&self) -> Option<&str> {
        self.next_sampling_fixture
            .map(|index| self.fixtures[index].label.as_str())
    }

    /// Offers a count-based sampling opportunity to every fixture; each due
    /// fixture runs the pre-sample hook, takes its sample, then runs the
    /// post-sample hook.
    pub fn sample_data_by_count_if_due(
        &mut self,
        state: &C,
        pre_sample: &mut dyn FnMut(&SamplingFixture<C>),
        post_sample: &mut dyn FnMut(&SamplingFixture<C>),
    ) -> Result<(), McError> {
        let clocktime = self.clock.elapsed_s();
        for index in 0..self.fixtures.len() {
            if self.fixtures[index].state_sampler.sample_is_due_by_count() {
                pre_sample(&self.fixtures[index]);
                self.fixtures[index]
                    .state_sampler
                    .sample_data(state, clocktime)?;
                post_sample(&self.fixtures[index]);
            }
        }
        Ok(())
    }

    /// Offers a time-based sampling opportunity to every fixture whose next
    /// scheduled instant is at or before `event_time`.
    ///
    /// The recorded sample time is the scheduled instant; the hooks bracket
    /// each fixture's sample exactly as in the count-based fan-out.
    pub fn sample_data_by_time_if_due(
        &mut self,
        event_time: f64,
        state: &C,
        pre_sample: &mut dyn FnMut(&SamplingFixture<C>),
        post_sample: &mut dyn FnMut(&SamplingFixture<C>),
    ) -> Result<(), McError> {
        let clocktime = self.clock.elapsed_s();
        for index in 0..self.fixtures.len() {
            if self.fixtures[index]
                .state_sampler
                .sample_is_due_by_time(event_time)
            {
                pre_sample(&self.fixtures[index]);
                self.fixtures[index]
                    .state_sampler
                    .sample_data_by_time_if_due(state, event_time, clocktime)?;
                post_sample(&self.fixtures[index]);
            }
        }
        self.update_next_sampling_fixture();
        Ok(())
    }

    /// Whether every fixture reports completion.
    pub fn is_complete(&mut self) -> Result<bool, McError> {
        let clocktime = self.clock.elapsed_s();
        let mut all = true;
        for fixture in &mut self.fixtures {
            all &= fixture.is_complete(clocktime)?;
        }
        Ok(all)
    }

    /// Writes a status snapshot if a log is attached and due.
    pub fn write_status_if_due(&mut self) -> Result<(), McError> {
        let clocktime = self.clock.elapsed_s();
        let method_log = match &mut self.method_log {
            Some(method_log) => method_log,
            None => return Ok(()),
        };
        let fixtures: Vec<serde_json::Value> = self
            .fixtures
            .iter()
            .map(|fixture| {
                json!({
                    "label": fixture.label,
                    "count": fixture.state_sampler.count,
                    "n_samples": fixture.state_sampler.n_samples(),
                    "acceptance_rate": fixture.state_sampler.acceptance_rate(),
                    "is_complete": fixture.completion_check.results().is_complete,
                })
            })
            .collect();
        let status = json!({
            "clocktime": clocktime,
            "fixtures": fixtures,
        });
        method_log.write_status_if_due(clocktime, &status)?;
        Ok(())
    }
}
