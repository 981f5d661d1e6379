use latmc_core::{ErrorInfo, McError, RngHandle};
use latmc_events::{OccEvent, OccLocation};

use crate::run_manager::RunManager;
use crate::state::OccupationState;

/// Runs a semi-grand canonical Metropolis calculation to completion.
///
/// The driver supplies an event proposer and a potential-difference
/// calculator; the loop Metropolis-accepts on `beta * delta`, applies
/// accepted events through the occupant tracker, advances every fixture's
/// counters and offers count-based sampling opportunities until the run
/// manager reports completion.
pub fn occupation_metropolis<C, FPropose, FDelta>(
    state: &mut C,
    occ_location: &mut OccLocation<'_>,
    beta: f64,
    mut propose_event: FPropose,
    mut delta_potential: FDelta,
    rng: &mut RngHandle,
    run_manager: &mut RunManager<C>,
) -> Result<(), McError>
where
    C: OccupationState + Clone,
    FPropose: FnMut(&C, &OccLocation<'_>, &mut RngHandle) -> Result<OccEvent, McError>,
    FDelta: FnMut(&C, &OccEvent) -> f64,
{
    if occ_location.mol_size() == 0 {
        return Err(McError::Tracking(ErrorInfo::new(
            "no-mutating-sites",
            "cannot run Metropolis without mutating occupants",
        )));
    }
    run_manager.initialize(occ_location.mol_size() as u64)?;

    while !run_manager.is_complete()? {
        run_manager.write_status_if_due()?;

        let event = propose_event(state, occ_location, rng)?;
        let delta = delta_potential(state, &event);
        let acceptance = (-beta * delta).exp().min(1.0);
        if rng.uniform_real(1.0) < acceptance {
            run_manager.increment_n_accept();
            occ_location.apply(&event, state.occupation_mut())?;
        } else {
            run_manager.increment_n_reject();
        }

        run_manager.increment_step();
        run_manager.sample_data_by_count_if_due(state, &mut |_| {}, &mut |_| {})?;
    }
    Ok(())
}
