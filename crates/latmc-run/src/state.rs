/// The configuration contract the driving loops rely on.
///
/// The framework sees a configuration only through its occupation vector;
/// everything else (conditions, neighbour tables, cached energies) belongs to
/// the driver.
pub trait OccupationState {
    /// The current occupation vector, one entry per lattice site.
    fn occupation(&self) -> &[i32];

    /// Mutable access for event application.
    fn occupation_mut(&mut self) -> &mut [i32];
}
