//! Collaborator seams for world-visible feedback.
//!
//! The engine only emits; nothing here returns a value the scheduler acts
//! on. Rendering, particles, and block placement live outside this crate.

use skyforge_core::MachinePos;

/// Receives amount/progress updates for in-world machine labels.
pub trait MachineDisplay: Send + Sync {
    /// Refresh the label for a machine: buffered quantity plus production
    /// progress toward the next cycle.
    fn show_production(
        &self,
        pos: &MachinePos,
        definition_id: &str,
        quantity: u32,
        progress_current: u64,
        progress_max: u64,
    );

    /// Mark a machine as idle (freshly placed, or buffer full).
    fn show_idle(&self, pos: &MachinePos);

    /// Tear down whatever is displayed at `pos`.
    fn remove(&self, pos: &MachinePos);
}

/// Places and clears the physical marker block for a machine.
pub trait WorldMarker: Send + Sync {
    /// Set the marker block at a newly registered machine's position.
    fn set_marker(&self, pos: &MachinePos, block: &str);

    /// Clear the marker when the machine is unregistered.
    fn clear_marker(&self, pos: &MachinePos);
}

/// No-op display for embedders that render elsewhere, and for tests.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl MachineDisplay for NullDisplay {
    fn show_production(&self, _: &MachinePos, _: &str, _: u32, _: u64, _: u64) {}
    fn show_idle(&self, _: &MachinePos) {}
    fn remove(&self, _: &MachinePos) {}
}

/// No-op world marker.
#[derive(Debug, Default)]
pub struct NullMarker;

impl WorldMarker for NullMarker {
    fn set_marker(&self, _: &MachinePos, _: &str) {}
    fn clear_marker(&self, _: &MachinePos) {}
}
