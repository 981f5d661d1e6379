#![deny(missing_docs)]

//! Occupant bookkeeping for lattice occupation Monte Carlo.
//!
//! [`OccLocation`] tracks every mutating occupant on the lattice so that
//! events can be chosen in O(1) and applied in time proportional to the number
//! of affected sites. In kinetic Monte Carlo mode it additionally tracks the
//! trajectory of every atomic component, so samplers can compute
//! displacements from the accumulated unit-cell translations.

/// Enumeration of the `(asymmetric unit, species)` occupant classes.
pub mod candidate;
/// Injected crystallographic conversion contract.
pub mod conversions;
/// Occupation-changing event descriptions.
pub mod event;
/// The occupant location tracker itself.
pub mod location;

pub use candidate::{OccCandidate, OccCandidateList};
pub use conversions::{Conversions, SiteCoord};
pub use event::{AtomLocation, AtomTraj, OccEvent, OccTransform};
pub use location::{Atom, Mol, OccLocation};
