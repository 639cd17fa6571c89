//! Console-backed display collaborators.
//!
//! A game embedding would drive holograms and world blocks from these
//! callbacks; the standalone server narrates the same events to the log.

use skyforge_core::MachinePos;
use skyforge_machines::{MachineDisplay, WorldMarker};
use tracing::{debug, info};

const BAR_CELLS: u64 = 10;

/// Renders machine labels as log lines with a textual progress bar.
pub struct LogDisplay;

impl MachineDisplay for LogDisplay {
    fn show_production(
        &self,
        pos: &MachinePos,
        definition_id: &str,
        quantity: u32,
        progress_current: u64,
        progress_max: u64,
    ) {
        let filled = (progress_current * BAR_CELLS / progress_max.max(1)).min(BAR_CELLS) as usize;
        let bar: String = "#".repeat(filled) + &"-".repeat(BAR_CELLS as usize - filled);
        debug!("[{pos}] {definition_id}: {quantity} stored [{bar}]");
    }

    fn show_idle(&self, pos: &MachinePos) {
        debug!("[{pos}] idle");
    }

    fn remove(&self, pos: &MachinePos) {
        debug!("[{pos}] display cleared");
    }
}

/// Logs marker block placement instead of touching a world.
pub struct LogMarker;

impl WorldMarker for LogMarker {
    fn set_marker(&self, pos: &MachinePos, block: &str) {
        info!("Placed {block} marker at {pos}");
    }

    fn clear_marker(&self, pos: &MachinePos) {
        info!("Cleared marker at {pos}");
    }
}
