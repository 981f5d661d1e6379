use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use latmc_core::{ErrorInfo, McError, RngHandle, SampleMode};
use latmc_events::OccLocation;

use crate::run_manager::{RunManager, SamplingFixture};
use crate::state::OccupationState;

/// Selects kinetic Monte Carlo events and their time increments.
pub trait EventSelector {
    /// Identifier of a selectable event.
    type EventId;

    /// Total event rate of the current configuration.
    fn total_rate(&self) -> f64;

    /// Selects the next event and the time increment until it occurs.
    fn select_event(&mut self, rng: &mut RngHandle) -> Result<(Self::EventId, f64), McError>;
}

/// Data made available to KMC sampling functions alongside the state.
///
/// The driving loop refreshes the current fields in the pre-sample hook and
/// stores the per-fixture previous-sample values in the post-sample hook, so
/// sampling functions can compute displacements since the beginning of the
/// run or since the last sample of their fixture.
#[derive(Debug, Clone, Default)]
pub struct KmcData {
    /// Label of the fixture currently sampling.
    pub sampling_fixture_label: String,
    /// Total event rate just before the sampled event was selected.
    pub total_rate: f64,
    /// Time the sample is attributed to. For time-based fixtures this is the
    /// scheduled sample time; for count-based fixtures the time of the last
    /// applied event.
    pub time: f64,
    /// Time of the previous sample, by fixture label.
    pub prev_time: BTreeMap<String, f64>,
    /// Species index of each atom column, set by the caller.
    pub atom_name_index_list: Vec<usize>,
    /// Current atom positions, one Cartesian column per atom.
    pub atom_positions_cart: Vec<[f64; 3]>,
    /// Atom positions at the previous sample, by fixture label.
    pub prev_atom_positions_cart: BTreeMap<String, Vec<[f64; 3]>>,
}

/// Runs a kinetic (rejection-free) Monte Carlo calculation to completion.
///
/// Each iteration selects an event and its time increment, offers count- and
/// time-based sampling opportunities *before* applying the event, then
/// applies it through the occupant tracker and advances the clock and
/// counters. Samples scheduled by time are recorded at their scheduled
/// instants even though the configuration is the current post-event one.
pub fn kinetic_monte_carlo<C, S, FGetEvent>(
    state: &mut C,
    occ_location: &mut OccLocation<'_>,
    kmc_data: &Rc<RefCell<KmcData>>,
    event_selector: &mut S,
    mut get_event_f: FGetEvent,
    rng: &mut RngHandle,
    run_manager: &mut RunManager<C>,
) -> Result<(), McError>
where
    C: OccupationState + Clone,
    S: EventSelector,
    FGetEvent: FnMut(&S::EventId, &OccLocation<'_>) -> latmc_events::OccEvent,
{
    if occ_location.mol_size() == 0 {
        return Err(McError::Tracking(ErrorInfo::new(
            "no-mutating-sites",
            "cannot run KMC without mutating occupants",
        )));
    }

    {
        let mut data = kmc_data.borrow_mut();
        data.time = 0.0;
        data.atom_positions_cart = occ_location.atom_positions_cart();
        data.prev_time.clear();
        data.prev_atom_positions_cart.clear();
        let positions = data.atom_positions_cart.clone();
        for fixture in run_manager.fixtures() {
            data.prev_time.insert(fixture.label().to_string(), 0.0);
            data.prev_atom_positions_cart
                .insert(fixture.label().to_string(), positions.clone());
        }
    }

    run_manager.initialize(occ_location.mol_size() as u64)?;

    while !run_manager.is_complete()? {
        run_manager.write_status_if_due()?;

        let total_rate = event_selector.total_rate();
        let (event_id, time_increment) = event_selector.select_event(rng)?;
        if time_increment < 0.0 {
            return Err(McError::Schedule(
                ErrorInfo::new("negative-time-increment", "event time increment must be >= 0")
                    .with_context("time_increment", time_increment.to_string()),
            ));
        }
        let event_time = kmc_data.borrow().time + time_increment;

        {
            let mut pre_sample = |fixture: &SamplingFixture<C>| {
                let mut data = kmc_data.borrow_mut();
                data.sampling_fixture_label = fixture.label().to_string();
                data.atom_positions_cart = occ_location.atom_positions_cart();
                data.total_rate = total_rate;
                if fixture.state_sampler().sample_mode == SampleMode::Time {
                    data.time = fixture.state_sampler().next_sample_time;
                }
            };
            let mut post_sample = |fixture: &SamplingFixture<C>| {
                let mut data = kmc_data.borrow_mut();
                let time = data.time;
                let positions = data.atom_positions_cart.clone();
                data.prev_time.insert(fixture.label().to_string(), time);
                data.prev_atom_positions_cart
                    .insert(fixture.label().to_string(), positions);
            };

            run_manager.sample_data_by_count_if_due(state, &mut pre_sample, &mut post_sample)?;
            run_manager.sample_data_by_time_if_due(
                event_time,
                state,
                &mut pre_sample,
                &mut post_sample,
            )?;
        }

        run_manager.increment_n_accept();
        let event = get_event_f(&event_id, occ_location);
        occ_location.apply(&event, state.occupation_mut())?;
        kmc_data.borrow_mut().time = event_time;

        run_manager.set_time(event_time);
        run_manager.increment_step();
    }
    Ok(())
}
