use latmc_core::{ErrorInfo, McError};
use serde::{Deserialize, Serialize};

use crate::conversions::Conversions;

/// One `(asymmetric unit, species)` occupant class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OccCandidate {
    /// Asymmetric-unit index.
    pub asym: usize,
    /// Species index.
    pub species_index: usize,
}

impl OccCandidate {
    /// Creates a candidate.
    pub fn new(asym: usize, species_index: usize) -> Self {
        Self {
            asym,
            species_index,
        }
    }
}

const NOT_A_CANDIDATE: usize = usize::MAX;

/// The finite enumerated set of occupant classes a simulation selects from.
///
/// Provides a dense `(asym, species) -> candidate index` lookup so event
/// proposal and application stay O(1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccCandidateList {
    candidates: Vec<OccCandidate>,
    lookup: Vec<Vec<usize>>,
}

impl OccCandidateList {
    /// Builds a candidate list from explicit candidates.
    ///
    /// Candidates must be unique and in range for the given table dimensions.
    pub fn new(
        candidates: Vec<OccCandidate>,
        n_asym: usize,
        n_species: usize,
    ) -> Result<Self, McError> {
        let mut lookup = vec![vec![NOT_A_CANDIDATE; n_species]; n_asym];
        for (index, cand) in candidates.iter().enumerate() {
            if cand.asym >= n_asym || cand.species_index >= n_species {
                return Err(McError::Config(
                    ErrorInfo::new("candidate-range", "candidate outside conversion tables")
                        .with_context("asym", cand.asym.to_string())
                        .with_context("species_index", cand.species_index.to_string()),
                ));
            }
            let slot = &mut lookup[cand.asym][cand.species_index];
            if *slot != NOT_A_CANDIDATE {
                return Err(McError::Config(
                    ErrorInfo::new("candidate-duplicate", "candidate listed twice")
                        .with_context("asym", cand.asym.to_string())
                        .with_context("species_index", cand.species_index.to_string()),
                ));
            }
            *slot = index;
        }
        Ok(Self { candidates, lookup })
    }

    /// Builds the list of every `(asym, species)` pair the conversions allow.
    pub fn from_conversions(convert: &dyn Conversions) -> Self {
        let mut candidates = Vec::new();
        let mut lookup = vec![vec![NOT_A_CANDIDATE; convert.n_species()]; convert.n_asym()];
        for asym in 0..convert.n_asym() {
            for species_index in 0..convert.n_species() {
                if convert.occ_index(asym, species_index).is_some() {
                    lookup[asym][species_index] = candidates.len();
                    candidates.push(OccCandidate::new(asym, species_index));
                }
            }
        }
        Self { candidates, lookup }
    }

    /// Candidate index for `(asym, species_index)`, if the pair is a
    /// candidate.
    pub fn index(&self, asym: usize, species_index: usize) -> Option<usize> {
        let slot = *self.lookup.get(asym)?.get(species_index)?;
        (slot != NOT_A_CANDIDATE).then_some(slot)
    }

    /// Candidate index of a candidate value.
    pub fn index_of(&self, cand: &OccCandidate) -> Option<usize> {
        self.index(cand.asym, cand.species_index)
    }

    /// Candidate at `index`.
    pub fn get(&self, index: usize) -> Option<&OccCandidate> {
        self.candidates.get(index)
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Iterates over the candidates in index order.
    pub fn iter(&self) -> impl Iterator<Item = &OccCandidate> {
        self.candidates.iter()
    }
}
