use latmc_core::RngHandle;
use latmc_events::{
    Conversions, Mol, OccCandidateList, OccEvent, OccLocation, OccTransform, SiteCoord,
};

/// Square-lattice Ising occupancy: one sublattice, occupation +1 or -1
/// mapping to species 0 or 1.
struct IsingConversions {
    rows: usize,
    cols: usize,
}

impl Conversions for IsingConversions {
    fn n_sites(&self) -> usize {
        self.rows * self.cols
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
            1 => Some(0),
            -1 => Some(1),
            _ => None,
        }
    }
    fn occ_index(&self, _asym: usize, species_index: usize) -> Option<i32> {
        match species_index {
            0 => Some(1),
            1 => Some(-1),
            _ => None,
        }
    }
    fn components(&self, _species_index: usize) -> usize {
        1
    }
    fn basis_coordinate(&self, linear_site_index: usize) -> SiteCoord {
        SiteCoord::new(
            0,
            [
                (linear_site_index % self.cols) as i64,
                (linear_site_index / self.cols) as i64,
                0,
            ],
        )
    }
    fn position_cart(&self, coord: &SiteCoord, delta: [i64; 3]) -> [f64; 3] {
        [
            (coord.unitcell[0] + delta[0]) as f64,
            (coord.unitcell[1] + delta[1]) as f64,
            (coord.unitcell[2] + delta[2]) as f64,
        ]
    }
}

fn flip_event(occ_location: &OccLocation, occupation: &[i32], l: usize) -> OccEvent {
    let mol_id = occ_location.l_to_mol_id(l);
    let (from_species, to_species) = if occupation[l] == 1 { (0, 1) } else { (1, 0) };
    OccEvent {
        linear_site_index: vec![l],
        new_occ: vec![-occupation[l]],
        occ_transform: vec![OccTransform {
            linear_site_index: l,
            mol_id,
            asym: 0,
            from_species,
            to_species,
        }],
        atom_traj: Vec::new(),
    }
}

fn assert_consistent(
    occ_location: &OccLocation,
    occupation: &[i32],
    convert: &IsingConversions,
    candidates: &OccCandidateList,
) {
    for (l, &occ) in occupation.iter().enumerate() {
        let mol_id = occ_location.l_to_mol_id(l);
        assert!(mol_id < occ_location.mol_size(), "site {l} has no occupant record");
        let mol = occ_location.mol(mol_id);
        assert_eq!(mol.l, l);
        assert_eq!(
            Some(mol.species_index),
            convert.species_index(mol.asym, occ)
        );
    }
    let mut total = 0;
    for cand_index in 0..candidates.len() {
        let cand = candidates.get(cand_index).unwrap();
        for loc in 0..occ_location.cand_size(cand_index) {
            let mol = occ_location.mol(occ_location.mol_id(cand_index, loc));
            assert_eq!(mol.loc, loc);
            assert_eq!((mol.asym, mol.species_index), (cand.asym, cand.species_index));
        }
        let expected = (0..occ_location.mol_size())
            .filter(|&mol_id| {
                let mol = occ_location.mol(mol_id);
                (mol.asym, mol.species_index) == (cand.asym, cand.species_index)
            })
            .count();
        assert_eq!(occ_location.cand_size(cand_index), expected);
        total += occ_location.cand_size(cand_index);
    }
    assert_eq!(total, occ_location.mol_size());
}

fn snapshot(occ_location: &OccLocation, n_sites: usize, n_cand: usize) -> (Vec<usize>, Vec<Vec<usize>>, Vec<Mol>) {
    let site_map = (0..n_sites).map(|l| occ_location.l_to_mol_id(l)).collect();
    let buckets = (0..n_cand)
        .map(|c| (0..occ_location.cand_size(c)).map(|i| occ_location.mol_id(c, i)).collect())
        .collect();
    let mols = (0..occ_location.mol_size())
        .map(|id| occ_location.mol(id).clone())
        .collect();
    (site_map, buckets, mols)
}

#[test]
fn initialize_establishes_the_tables() {
    let convert = IsingConversions { rows: 4, cols: 4 };
    let candidates = OccCandidateList::from_conversions(&convert);
    let mut occ_location = OccLocation::new(&convert, &candidates, false);

    // Checkerboard occupation.
    let occupation: Vec<i32> = (0..16).map(|l| if (l + l / 4) % 2 == 0 { 1 } else { -1 }).collect();
    occ_location.initialize(&occupation).unwrap();

    assert_eq!(occ_location.mol_size(), 16);
    assert_eq!(occ_location.cand_size(0), 8);
    assert_eq!(occ_location.cand_size(1), 8);
    assert_consistent(&occ_location, &occupation, &convert, &candidates);
}

#[test]
fn invalid_occupation_values_are_rejected() {
    let convert = IsingConversions { rows: 2, cols: 2 };
    let candidates = OccCandidateList::from_conversions(&convert);
    let mut occ_location = OccLocation::new(&convert, &candidates, false);

    let err = occ_location.initialize(&[1, 1, 7, 1]).unwrap_err();
    assert_eq!(err.info().code, "invalid-occupation");

    let err = occ_location.initialize(&[1, 1]).unwrap_err();
    assert_eq!(err.info().code, "occupation-length");
}

#[test]
fn single_flip_moves_an_occupant_between_buckets() {
    let convert = IsingConversions { rows: 4, cols: 4 };
    let candidates = OccCandidateList::from_conversions(&convert);
    let mut occ_location = OccLocation::new(&convert, &candidates, false);

    let mut occupation = vec![1; 16];
    occ_location.initialize(&occupation).unwrap();
    assert_eq!(occ_location.cand_size(0), 16);
    assert_eq!(occ_location.cand_size(1), 0);

    let event = flip_event(&occ_location, &occupation, 0);
    occ_location.apply(&event, &mut occupation).unwrap();

    assert_eq!(occupation[0], -1);
    assert_eq!(occ_location.cand_size(0), 15);
    assert_eq!(occ_location.cand_size(1), 1);
    assert_consistent(&occ_location, &occupation, &convert, &candidates);

    let inverse = flip_event(&occ_location, &occupation, 0);
    occ_location.apply(&inverse, &mut occupation).unwrap();

    assert_eq!(occupation, vec![1; 16]);
    assert_eq!(occ_location.cand_size(0), 16);
    assert_eq!(occ_location.cand_size(1), 0);
    assert_consistent(&occ_location, &occupation, &convert, &candidates);
}

#[test]
fn flip_round_trip_restores_the_full_state() {
    let convert = IsingConversions { rows: 4, cols: 4 };
    let candidates = OccCandidateList::from_conversions(&convert);
    let mut occ_location = OccLocation::new(&convert, &candidates, false);

    let mut occupation = vec![1; 16];
    occ_location.initialize(&occupation).unwrap();

    // Flipping the bucket-final occupant makes the swap-with-last removal a
    // no-op, so the inverse event restores the state exactly.
    let before = snapshot(&occ_location, 16, candidates.len());
    let event = flip_event(&occ_location, &occupation, 15);
    occ_location.apply(&event, &mut occupation).unwrap();
    let inverse = flip_event(&occ_location, &occupation, 15);
    occ_location.apply(&inverse, &mut occupation).unwrap();

    assert_eq!(occupation, vec![1; 16]);
    assert_eq!(snapshot(&occ_location, 16, candidates.len()), before);
}

#[test]
fn reinitializing_matches_incremental_updates() {
    let convert = IsingConversions { rows: 6, cols: 6 };
    let candidates = OccCandidateList::from_conversions(&convert);
    let mut occ_location = OccLocation::new(&convert, &candidates, false);

    let mut occupation = vec![1; 36];
    occ_location.initialize(&occupation).unwrap();

    let mut rng = RngHandle::from_seed(99);
    for _ in 0..200 {
        let l = rng.uniform_index(36);
        let event = flip_event(&occ_location, &occupation, l);
        occ_location.apply(&event, &mut occupation).unwrap();
    }
    assert_consistent(&occ_location, &occupation, &convert, &candidates);

    let mut fresh = OccLocation::new(&convert, &candidates, false);
    fresh.initialize(&occupation).unwrap();

    for l in 0..36 {
        assert_eq!(fresh.l_to_mol_id(l), occ_location.l_to_mol_id(l));
    }
    for cand_index in 0..candidates.len() {
        assert_eq!(fresh.cand_size(cand_index), occ_location.cand_size(cand_index));
    }
}

#[test]
fn choose_mol_draws_from_the_requested_bucket() {
    let convert = IsingConversions { rows: 4, cols: 4 };
    let candidates = OccCandidateList::from_conversions(&convert);
    let mut occ_location = OccLocation::new(&convert, &candidates, false);

    let mut occupation = vec![1; 16];
    occ_location.initialize(&occupation).unwrap();

    let mut rng = RngHandle::from_seed(5);
    let err = occ_location.choose_mol(1, &mut rng).unwrap_err();
    assert_eq!(err.info().code, "empty-candidate");

    for _ in 0..100 {
        let mol = occ_location.choose_mol(0, &mut rng).unwrap();
        assert_eq!(mol.species_index, 0);
    }

    for l in [2, 7, 11] {
        let event = flip_event(&occ_location, &occupation, l);
        occ_location.apply(&event, &mut occupation).unwrap();
    }
    for _ in 0..100 {
        let mol = occ_location.choose_mol(1, &mut rng).unwrap();
        assert_eq!(mol.species_index, 1);
        assert!([2, 7, 11].contains(&mol.l));
    }
}

#[test]
fn stale_or_malformed_events_are_rejected() {
    let convert = IsingConversions { rows: 2, cols: 2 };
    let candidates = OccCandidateList::from_conversions(&convert);
    let mut occ_location = OccLocation::new(&convert, &candidates, false);

    let mut occupation = vec![1; 4];
    occ_location.initialize(&occupation).unwrap();

    // Claims the occupant is already species 1.
    let stale = OccEvent {
        linear_site_index: vec![0],
        new_occ: vec![1],
        occ_transform: vec![OccTransform {
            linear_site_index: 0,
            mol_id: 0,
            asym: 0,
            from_species: 1,
            to_species: 0,
        }],
        atom_traj: Vec::new(),
    };
    let err = occ_location.apply(&stale, &mut occupation).unwrap_err();
    assert_eq!(err.info().code, "species-mismatch");

    let unknown_mol = OccEvent {
        linear_site_index: vec![0],
        new_occ: vec![-1],
        occ_transform: vec![OccTransform {
            linear_site_index: 0,
            mol_id: 42,
            asym: 0,
            from_species: 0,
            to_species: 1,
        }],
        atom_traj: Vec::new(),
    };
    let err = occ_location.apply(&unknown_mol, &mut occupation).unwrap_err();
    assert_eq!(err.info().code, "mol-range");

    let mut ragged = flip_event(&occ_location, &occupation, 0);
    ragged.new_occ.push(1);
    let err = occ_location.apply(&ragged, &mut occupation).unwrap_err();
    assert_eq!(err.info().code, "event-shape");
}
