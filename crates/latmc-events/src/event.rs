use serde::{Deserialize, Serialize};

/// Per-site record describing how one occupant is transformed by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccTransform {
    /// Site the occupant ends up on.
    pub linear_site_index: usize,
    /// Tracker id of the occupant being transformed.
    pub mol_id: usize,
    /// Asymmetric-unit index of `linear_site_index`.
    pub asym: usize,
    /// Species index before the transformation.
    pub from_species: usize,
    /// Species index after the transformation.
    pub to_species: usize,
}

/// Location of one atomic component: site, occupant, component slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomLocation {
    /// Site the component sits on.
    pub linear_site_index: usize,
    /// Tracker id of the occupant holding the component.
    pub mol_id: usize,
    /// Index within the occupant's component list.
    pub mol_comp: usize,
}

/// One atomic-component move, used when tracking trajectories for KMC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomTraj {
    /// Where the component is read from.
    pub from: AtomLocation,
    /// Where the component is written to.
    pub to: AtomLocation,
    /// Physical unit-cell displacement of the move (unwrapped across periodic
    /// boundaries).
    pub delta_unitcell: [i64; 3],
}

/// Description of a Monte Carlo event that modifies occupation.
///
/// `linear_site_index` and `new_occ` are parallel arrays giving the new
/// occupation value on each modified site; `occ_transform` carries the
/// per-site tracker updates and is aligned with them. `atom_traj` is only
/// populated when atom trajectories are tracked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccEvent {
    /// Sites whose occupation is modified.
    pub linear_site_index: Vec<usize>,
    /// New occupation value for each modified site.
    pub new_occ: Vec<i32>,
    /// Occupant tracking updates, one per modified site.
    pub occ_transform: Vec<OccTransform>,
    /// Atomic-component moves (KMC trajectory tracking only).
    pub atom_traj: Vec<AtomTraj>,
}

impl OccEvent {
    /// Empties the event so the buffer can be reused by a proposal generator.
    pub fn clear(&mut self) {
        self.linear_site_index.clear();
        self.new_occ.clear();
        self.occ_transform.clear();
        self.atom_traj.clear();
    }
}
