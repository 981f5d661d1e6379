use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use latmc_core::{derive_substream_seed, McError, RngHandle, SampleMode};
use latmc_events::{
    AtomLocation, AtomTraj, Conversions, OccCandidateList, OccEvent, OccLocation, OccTransform,
    SiteCoord,
};
use latmc_run::{
    kinetic_monte_carlo, Bounds, CompletionCheckParams, CutoffCheckParams, EventSelector, KmcData,
    OccupationState, RunManager, SamplingFixture, SamplingParams, StateSamplingFunction,
    StateSamplingFunctionMap,
};

/// Periodic chain hosting atoms (occ 0) and one vacancy (occ 1).
#[derive(Clone)]
struct ChainConfig {
    occupation: Vec<i32>,
}

impl OccupationState for ChainConfig {
    fn occupation(&self) -> &[i32] {
        &self.occupation
    }
    fn occupation_mut(&mut self) -> &mut [i32] {
        &mut self.occupation
    }
}

struct ChainConversions {
    n: usize,
}

impl Conversions for ChainConversions {
    fn n_sites(&self) -> usize {
        self.n
    }
    fn n_asym(&self) -> usize {
        1
    }
    fn asym(&self, _linear_site_index: usize) -> usize {
        0
    }
    fn n_species(&self) -> usize {
        2
    }
    fn species_index(&self, _asym: usize, occ_index: i32) -> Option<usize> {
        match occ_index {
            0 => Some(0),
            1 => Some(1),
            _ => None,
        }
    }
    fn occ_index(&self, _asym: usize, species_index: usize) -> Option<i32> {
        match species_index {
            0 => Some(0),
            1 => Some(1),
            _ => None,
        }
    }
    fn components(&self, species_index: usize) -> usize {
        if species_index == 0 {
            1
        } else {
            0
        }
    }
    fn basis_coordinate(&self, linear_site_index: usize) -> SiteCoord {
        SiteCoord::new(0, [linear_site_index as i64, 0, 0])
    }
    fn position_cart(&self, coord: &SiteCoord, delta: [i64; 3]) -> [f64; 3] {
        [
            (coord.unitcell[0] + delta[0]) as f64,
            (coord.unitcell[1] + delta[1]) as f64,
            (coord.unitcell[2] + delta[2]) as f64,
        ]
    }
}

/// A vacancy exchanging with either neighbour at unit rate; every event takes
/// the same residence time.
struct VacancyHopSelector {
    l_vacancy: usize,
    n: usize,
}

#[derive(Debug, Clone, Copy)]
struct Hop {
    l_vacancy: usize,
    l_atom: usize,
    delta_unitcell: [i64; 3],
}

impl EventSelector for VacancyHopSelector {
    type EventId = Hop;

    fn total_rate(&self) -> f64 {
        2.0
    }

    fn select_event(&mut self, rng: &mut RngHandle) -> Result<(Hop, f64), McError> {
        let hop_right = rng.uniform_index(2) == 0;
        let l_atom = if hop_right {
            (self.l_vacancy + 1) % self.n
        } else {
            (self.l_vacancy + self.n - 1) % self.n
        };
        // The atom moves opposite to the vacancy.
        let delta_unitcell = if hop_right { [-1, 0, 0] } else { [1, 0, 0] };
        let hop = Hop {
            l_vacancy: self.l_vacancy,
            l_atom,
            delta_unitcell,
        };
        self.l_vacancy = l_atom;
        Ok((hop, 1.0 / self.total_rate()))
    }
}

fn hop_to_event(hop: &Hop, occ_location: &OccLocation<'_>) -> OccEvent {
    let vacancy_id = occ_location.l_to_mol_id(hop.l_vacancy);
    let atom_mol_id = occ_location.l_to_mol_id(hop.l_atom);
    OccEvent {
        linear_site_index: vec![hop.l_vacancy, hop.l_atom],
        new_occ: vec![0, 1],
        occ_transform: vec![
            OccTransform {
                linear_site_index: hop.l_vacancy,
                mol_id: atom_mol_id,
                asym: 0,
                from_species: 0,
                to_species: 0,
            },
            OccTransform {
                linear_site_index: hop.l_atom,
                mol_id: vacancy_id,
                asym: 0,
                from_species: 1,
                to_species: 1,
            },
        ],
        atom_traj: vec![AtomTraj {
            from: AtomLocation {
                linear_site_index: hop.l_atom,
                mol_id: atom_mol_id,
                mol_comp: 0,
            },
            to: AtomLocation {
                linear_site_index: hop.l_vacancy,
                mol_id: atom_mol_id,
                mol_comp: 0,
            },
            delta_unitcell: hop.delta_unitcell,
        }],
    }
}

fn kmc_sampling_functions(
    kmc_data: &Rc<RefCell<KmcData>>,
) -> StateSamplingFunctionMap<ChainConfig> {
    let mut functions = StateSamplingFunctionMap::new();

    let data = Rc::clone(kmc_data);
    let mean_atom_x = StateSamplingFunction::new(
        "mean_atom_x",
        "Mean unwrapped atom x-coordinate",
        vec![],
        Arc::new(move |_: &ChainConfig| {
            let data = data.borrow();
            let n = data.atom_positions_cart.len().max(1);
            let sum: f64 = data.atom_positions_cart.iter().map(|column| column[0]).sum();
            vec![sum / n as f64]
        }),
    );

    let data = Rc::clone(kmc_data);
    let total_rate = StateSamplingFunction::new(
        "total_rate",
        "Total event rate at sampling time",
        vec![],
        Arc::new(move |_: &ChainConfig| vec![data.borrow().total_rate]),
    );

    functions.insert(mean_atom_x.name.clone(), mean_atom_x);
    functions.insert(total_rate.name.clone(), total_rate);
    functions
}

struct KmcOutput {
    sample_time: Vec<f64>,
    by_count_samples: usize,
    mean_atom_x: Vec<f64>,
    trajectory_vacancies: Vec<usize>,
    prev_time: f64,
    time_results_json: serde_json::Value,
}

fn run_vacancy_kmc(master_seed: u64) -> KmcOutput {
    let n = 8;
    let convert = ChainConversions { n };
    let candidates = OccCandidateList::from_conversions(&convert);
    let mut occ_location = OccLocation::new(&convert, &candidates, true);

    let mut config = ChainConfig {
        occupation: {
            let mut occupation = vec![0; n];
            occupation[0] = 1;
            occupation
        },
    };
    occ_location.initialize(&config.occupation).unwrap();

    let kmc_data = Rc::new(RefCell::new(KmcData::default()));
    kmc_data.borrow_mut().atom_name_index_list = occ_location
        .atoms()
        .map(|atom| atom.species_index)
        .collect();
    let functions = kmc_sampling_functions(&kmc_data);

    let by_time_params = SamplingParams {
        sample_mode: SampleMode::Time,
        period: 10.0,
        sampler_names: vec!["mean_atom_x".to_string(), "total_rate".to_string()],
        do_sample_trajectory: true,
        do_sample_time: true,
        ..SamplingParams::default()
    };
    by_time_params.validate(functions.keys(), true).unwrap();
    let by_time_completion = CompletionCheckParams {
        cutoff_params: CutoffCheckParams {
            time: Bounds {
                min: None,
                max: Some(50.0),
            },
            ..CutoffCheckParams::default()
        },
        ..CompletionCheckParams::default()
    };

    let by_count_params = SamplingParams {
        sample_mode: SampleMode::Pass,
        period: 1.0,
        sampler_names: vec!["mean_atom_x".to_string()],
        ..SamplingParams::default()
    };
    let by_count_completion = CompletionCheckParams {
        cutoff_params: CutoffCheckParams {
            count: Bounds {
                min: None,
                max: Some(12),
            },
            ..CutoffCheckParams::default()
        },
        ..CompletionCheckParams::default()
    };

    let fixtures = vec![
        SamplingFixture::new(
            "displacement",
            &by_time_params,
            by_time_completion,
            &functions,
            RngHandle::from_seed(derive_substream_seed(master_seed, 0)),
        )
        .unwrap(),
        SamplingFixture::new(
            "by_count",
            &by_count_params,
            by_count_completion,
            &functions,
            RngHandle::from_seed(derive_substream_seed(master_seed, 1)),
        )
        .unwrap(),
    ];
    let mut run_manager = RunManager::new(fixtures);
    let mut rng = RngHandle::from_seed(derive_substream_seed(master_seed, 2));
    let mut event_selector = VacancyHopSelector { l_vacancy: 0, n };

    kinetic_monte_carlo(
        &mut config,
        &mut occ_location,
        &kmc_data,
        &mut event_selector,
        hop_to_event,
        &mut rng,
        &mut run_manager,
    )
    .unwrap();

    let by_time = &run_manager.fixtures()[0];
    let by_count = &run_manager.fixtures()[1];
    let prev_time = *kmc_data.borrow().prev_time.get("displacement").unwrap();
    KmcOutput {
        sample_time: by_time.state_sampler().sample_time.clone(),
        by_count_samples: by_count.state_sampler().n_samples(),
        mean_atom_x: by_time
            .state_sampler()
            .sampler("mean_atom_x")
            .unwrap()
            .component(0)
            .unwrap(),
        trajectory_vacancies: by_time
            .state_sampler()
            .sample_trajectory
            .iter()
            .map(|snapshot| snapshot.occupation.iter().filter(|&&occ| occ == 1).count())
            .collect(),
        prev_time,
        time_results_json: serde_json::to_value(by_time.results()).unwrap(),
    }
}

#[test]
fn by_time_samples_sit_on_the_schedule_lattice() {
    let output = run_vacancy_kmc(7);

    // Events arrive every 0.5 time units, so the run cuts off exactly at the
    // configured maximum time and every scheduled instant is sampled.
    assert_eq!(output.sample_time, vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0]);
    assert_eq!(output.mean_atom_x.len(), 6);
    // The first sample precedes any event: atoms sit on sites 1..=7.
    assert_eq!(output.mean_atom_x[0], 4.0);
    assert!(output.mean_atom_x.iter().all(|value| value.is_finite()));

    assert_eq!(output.time_results_json["is_complete"], true);
    assert_eq!(output.time_results_json["has_any_maximum_met"], true);
    assert_eq!(output.time_results_json["time"], 50.0);
}

#[test]
fn count_fixture_samples_alongside_the_time_fixture() {
    let output = run_vacancy_kmc(7);

    // One sample at pass 0 plus one per completed pass up to the count
    // cutoff.
    assert_eq!(output.by_count_samples, 13);
}

#[test]
fn trajectory_snapshots_preserve_the_occupancy() {
    let output = run_vacancy_kmc(7);

    assert_eq!(output.trajectory_vacancies, vec![1; 6]);
}

#[test]
fn post_sample_hook_tracks_the_previous_sample_time() {
    let output = run_vacancy_kmc(7);

    assert_eq!(output.prev_time, 50.0);
}

#[test]
fn kmc_runs_are_deterministic_under_a_fixed_seed() {
    let output_a = run_vacancy_kmc(31);
    let output_b = run_vacancy_kmc(31);

    assert_eq!(output_a.mean_atom_x, output_b.mean_atom_x);
    assert_eq!(output_a.sample_time, output_b.sample_time);
}
