use latmc_core::{ErrorInfo, McError, RngHandle};

use crate::candidate::{OccCandidate, OccCandidateList};
use crate::conversions::{Conversions, SiteCoord};
use crate::event::OccEvent;

/// One atomic component of an occupant (tracked in KMC mode only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    /// Species the component belongs to.
    pub species_index: usize,
    /// Which component of its species this atom is.
    pub atom_index: usize,
    /// Index into the tracker's atom table.
    pub id: usize,
    /// Integral lattice coordinate where the atom first appeared.
    pub bijk_begin: SiteCoord,
    /// Unit-cell displacement accumulated since `bijk_begin`.
    pub delta_unitcell: [i64; 3],
    /// Component slot the atom initially occupied in its parent occupant.
    pub mol_comp_begin: usize,
}

/// One mutating occupant currently residing on a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mol {
    /// Index into the tracker's occupant table.
    pub id: usize,
    /// Site the occupant sits on.
    pub l: usize,
    /// Asymmetric-unit index of `l`.
    pub asym: usize,
    /// Current species index; consistent with the occupation value on `l`.
    pub species_index: usize,
    /// Atom ids of the occupant's components, in component order.
    pub component: Vec<usize>,
    /// Position within the per-candidate location bucket.
    pub loc: usize,
}

/// Staged atom move: all reads happen before any component list is written.
#[derive(Debug, Clone, Copy)]
struct StagedAtomMove {
    atom_id: usize,
    to_mol: usize,
    to_comp: usize,
    delta_unitcell: [i64; 3],
}

/// Tracks every mutating occupant on the lattice.
///
/// The tracker keeps three mutually consistent tables: the occupant table
/// (`mols`), the per-candidate location buckets (`loc`, enabling O(1) uniform
/// selection of an occupant of a given class) and the site-to-occupant map
/// (`l_to_mol`, with `mol_size()` as the sentinel for non-mutating sites).
/// In KMC mode an atom table records where every atomic component started and
/// how far it has travelled.
pub struct OccLocation<'a> {
    convert: &'a dyn Conversions,
    candidate_list: &'a OccCandidateList,
    mols: Vec<Mol>,
    atoms: Vec<Atom>,
    loc: Vec<Vec<usize>>,
    l_to_mol: Vec<usize>,
    update_atoms: bool,
    staged: Vec<StagedAtomMove>,
}

impl<'a> OccLocation<'a> {
    /// Creates an empty tracker. Call [`OccLocation::initialize`] before use.
    pub fn new(
        convert: &'a dyn Conversions,
        candidate_list: &'a OccCandidateList,
        update_atoms: bool,
    ) -> Self {
        Self {
            convert,
            candidate_list,
            mols: Vec::new(),
            atoms: Vec::new(),
            loc: Vec::new(),
            l_to_mol: Vec::new(),
            update_atoms,
            staged: Vec::new(),
        }
    }

    /// Rebuilds all tables from an occupation vector.
    ///
    /// Walks every site; sites whose occupant maps to a candidate get an
    /// occupant record (and, in KMC mode, atom records for each component),
    /// registered in the matching location bucket. Sites whose occupant is
    /// not a candidate are non-mutating and ignored.
    pub fn initialize(&mut self, occupation: &[i32]) -> Result<(), McError> {
        let n_sites = self.convert.n_sites();
        if occupation.len() != n_sites {
            return Err(McError::Tracking(
                ErrorInfo::new("occupation-length", "occupation vector does not match lattice")
                    .with_context("expected", n_sites.to_string())
                    .with_context("found", occupation.len().to_string()),
            ));
        }

        self.mols.clear();
        self.atoms.clear();
        self.loc = vec![Vec::new(); self.candidate_list.len()];
        self.l_to_mol = vec![usize::MAX; n_sites];

        for (l, &occ) in occupation.iter().enumerate() {
            let asym = self.convert.asym(l);
            let species_index = self.convert.species_index(asym, occ).ok_or_else(|| {
                McError::Tracking(
                    ErrorInfo::new("invalid-occupation", "occupation value not allowed on site")
                        .with_context("linear_site_index", l.to_string())
                        .with_context("occ", occ.to_string()),
                )
            })?;
            let cand_index = match self.candidate_list.index(asym, species_index) {
                Some(index) => index,
                None => continue,
            };

            let mol_id = self.mols.len();
            let mut component = Vec::new();
            if self.update_atoms {
                let bijk = self.convert.basis_coordinate(l);
                for atom_index in 0..self.convert.components(species_index) {
                    let atom_id = self.atoms.len();
                    self.atoms.push(Atom {
                        species_index,
                        atom_index,
                        id: atom_id,
                        bijk_begin: bijk,
                        delta_unitcell: [0, 0, 0],
                        mol_comp_begin: atom_index,
                    });
                    component.push(atom_id);
                }
            }

            let bucket = &mut self.loc[cand_index];
            bucket.push(mol_id);
            self.mols.push(Mol {
                id: mol_id,
                l,
                asym,
                species_index,
                component,
                loc: bucket.len() - 1,
            });
            self.l_to_mol[l] = mol_id;
        }

        // Non-mutating sites map to the sentinel value mol_size().
        let sentinel = self.mols.len();
        for entry in &mut self.l_to_mol {
            if *entry == usize::MAX {
                *entry = sentinel;
            }
        }
        Ok(())
    }

    /// Uniformly chooses an occupant of the given candidate class.
    pub fn choose_mol(&self, cand_index: usize, rng: &mut RngHandle) -> Result<&Mol, McError> {
        let bucket = self.loc.get(cand_index).ok_or_else(|| {
            McError::Tracking(
                ErrorInfo::new("candidate-range", "candidate index out of range")
                    .with_context("cand_index", cand_index.to_string()),
            )
        })?;
        if bucket.is_empty() {
            return Err(McError::Tracking(
                ErrorInfo::new("empty-candidate", "no occupant of the requested type")
                    .with_context("cand_index", cand_index.to_string()),
            ));
        }
        let mol_id = bucket[rng.uniform_index(bucket.len())];
        Ok(&self.mols[mol_id])
    }

    /// Uniformly chooses an occupant of the given candidate value.
    pub fn choose_mol_by_candidate(
        &self,
        cand: &OccCandidate,
        rng: &mut RngHandle,
    ) -> Result<&Mol, McError> {
        let cand_index = self.candidate_list.index_of(cand).ok_or_else(|| {
            McError::Tracking(
                ErrorInfo::new("candidate-miss", "pair is not a candidate")
                    .with_context("asym", cand.asym.to_string())
                    .with_context("species_index", cand.species_index.to_string()),
            )
        })?;
        self.choose_mol(cand_index, rng)
    }

    /// Updates the occupation vector and all tracking tables to reflect that
    /// event `event` occurred.
    ///
    /// Runs in O(|occ_transform| + |atom_traj|). Atom moves are staged before
    /// any component list is written, so events that permute components
    /// within or between occupants cannot clobber their own reads.
    pub fn apply(&mut self, event: &OccEvent, occupation: &mut [i32]) -> Result<(), McError> {
        if event.occ_transform.len() != event.new_occ.len() {
            return Err(McError::Tracking(
                ErrorInfo::new("event-shape", "occ_transform and new_occ lengths differ")
                    .with_context("occ_transform", event.occ_transform.len().to_string())
                    .with_context("new_occ", event.new_occ.len().to_string()),
            ));
        }

        if self.update_atoms {
            self.stage_atom_moves(event)?;
        }

        // First clear every vacated site so swap events cannot clobber the
        // site map while both occupants are in flight.
        let sentinel = self.mols.len();
        for transform in &event.occ_transform {
            let mol = self.mols.get(transform.mol_id).ok_or_else(|| {
                McError::Tracking(
                    ErrorInfo::new("mol-range", "event references an unknown occupant")
                        .with_context("mol_id", transform.mol_id.to_string()),
                )
            })?;
            if mol.species_index != transform.from_species {
                return Err(McError::Tracking(
                    ErrorInfo::new("species-mismatch", "occupant is not of the expected species")
                        .with_context("mol_id", transform.mol_id.to_string())
                        .with_context("expected", transform.from_species.to_string())
                        .with_context("found", mol.species_index.to_string()),
                ));
            }
            self.l_to_mol[mol.l] = sentinel;
        }

        for (i, transform) in event.occ_transform.iter().enumerate() {
            let (cur_asym, cur_species, cur_loc) = {
                let mol = &self.mols[transform.mol_id];
                (mol.asym, mol.species_index, mol.loc)
            };

            // Remove from the current bucket by swap-with-last-and-pop,
            // fixing the swapped neighbour's back-index.
            let from_cand = self
                .candidate_list
                .index(cur_asym, cur_species)
                .ok_or_else(|| candidate_miss(cur_asym, cur_species))?;
            let bucket = &mut self.loc[from_cand];
            let moved = *bucket.last().ok_or_else(|| {
                McError::Tracking(
                    ErrorInfo::new("empty-candidate", "bucket empty during apply")
                        .with_context("cand_index", from_cand.to_string()),
                )
            })?;
            bucket[cur_loc] = moved;
            bucket.pop();
            if moved != transform.mol_id {
                self.mols[moved].loc = cur_loc;
            }

            // Register under the destination candidate.
            let to_cand = self
                .candidate_list
                .index(transform.asym, transform.to_species)
                .ok_or_else(|| candidate_miss(transform.asym, transform.to_species))?;
            let bucket = &mut self.loc[to_cand];
            bucket.push(transform.mol_id);
            let new_loc = bucket.len() - 1;

            let mol = &mut self.mols[transform.mol_id];
            mol.loc = new_loc;
            mol.species_index = transform.to_species;
            mol.asym = transform.asym;
            mol.l = transform.linear_site_index;
            self.l_to_mol[transform.linear_site_index] = transform.mol_id;

            occupation[transform.linear_site_index] = event.new_occ[i];
        }

        if self.update_atoms {
            self.commit_atom_moves();
        }
        Ok(())
    }

    fn stage_atom_moves(&mut self, event: &OccEvent) -> Result<(), McError> {
        self.staged.clear();
        for traj in &event.atom_traj {
            let from_mol = self.mols.get(traj.from.mol_id).ok_or_else(|| {
                McError::Tracking(
                    ErrorInfo::new("mol-range", "atom trajectory references an unknown occupant")
                        .with_context("mol_id", traj.from.mol_id.to_string()),
                )
            })?;
            let atom_id = *from_mol.component.get(traj.from.mol_comp).ok_or_else(|| {
                McError::Tracking(
                    ErrorInfo::new("atom-component-range", "component slot out of range")
                        .with_context("mol_id", traj.from.mol_id.to_string())
                        .with_context("mol_comp", traj.from.mol_comp.to_string()),
                )
            })?;
            if traj.to.mol_id >= self.mols.len()
                || traj.to.mol_comp >= self.mols[traj.to.mol_id].component.len()
            {
                return Err(McError::Tracking(
                    ErrorInfo::new("atom-component-range", "destination slot out of range")
                        .with_context("mol_id", traj.to.mol_id.to_string())
                        .with_context("mol_comp", traj.to.mol_comp.to_string()),
                ));
            }
            self.staged.push(StagedAtomMove {
                atom_id,
                to_mol: traj.to.mol_id,
                to_comp: traj.to.mol_comp,
                delta_unitcell: traj.delta_unitcell,
            });
        }
        Ok(())
    }

    fn commit_atom_moves(&mut self) {
        for i in 0..self.staged.len() {
            let staged = self.staged[i];
            self.mols[staged.to_mol].component[staged.to_comp] = staged.atom_id;
            let atom = &mut self.atoms[staged.atom_id];
            atom.delta_unitcell[0] += staged.delta_unitcell[0];
            atom.delta_unitcell[1] += staged.delta_unitcell[1];
            atom.delta_unitcell[2] += staged.delta_unitcell[2];
        }
    }

    /// Cartesian positions of all tracked atoms, one column per atom, in
    /// atom-id order: `bijk_begin + delta` composed through the injected
    /// Cartesian basis.
    pub fn atom_positions_cart(&self) -> Vec<[f64; 3]> {
        self.atoms
            .iter()
            .map(|atom| self.convert.position_cart(&atom.bijk_begin, atom.delta_unitcell))
            .collect()
    }

    /// Total number of mutating occupants.
    pub fn mol_size(&self) -> usize {
        self.mols.len()
    }

    /// Occupant by tracker id.
    pub fn mol(&self, mol_id: usize) -> &Mol {
        &self.mols[mol_id]
    }

    /// Total number of tracked atoms.
    pub fn atom_size(&self) -> usize {
        self.atoms.len()
    }

    /// Atom by tracker id.
    pub fn atom(&self, atom_id: usize) -> &Atom {
        &self.atoms[atom_id]
    }

    /// Iterates over the tracked atoms in id order.
    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.iter()
    }

    /// Number of occupants of a candidate class currently present.
    pub fn cand_size(&self, cand_index: usize) -> usize {
        self.loc[cand_index].len()
    }

    /// Occupant id at position `loc` within a candidate bucket.
    pub fn mol_id(&self, cand_index: usize, loc: usize) -> usize {
        self.loc[cand_index][loc]
    }

    /// Occupant id for a site; `mol_size()` for non-mutating sites.
    pub fn l_to_mol_id(&self, linear_site_index: usize) -> usize {
        self.l_to_mol[linear_site_index]
    }

    /// The candidate list this tracker selects from.
    pub fn candidate_list(&self) -> &OccCandidateList {
        self.candidate_list
    }

    /// The injected conversions.
    pub fn convert(&self) -> &dyn Conversions {
        self.convert
    }

    /// Whether atom trajectories are tracked.
    pub fn update_atoms(&self) -> bool {
        self.update_atoms
    }
}

fn candidate_miss(asym: usize, species_index: usize) -> McError {
    McError::Tracking(
        ErrorInfo::new("candidate-miss", "pair is not a candidate")
            .with_context("asym", asym.to_string())
            .with_context("species_index", species_index.to_string()),
    )
}
