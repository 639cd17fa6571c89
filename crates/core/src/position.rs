//! World position keys for machine placement.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Anchor position of one machine: world name plus integer block coordinates.
///
/// Exactly one machine may occupy a position. The scheduler, the display
/// layer, and the persistence store all key per-machine state by this type.
/// Ordering is lexical by `(world, x, y, z)` so persisted snapshots iterate
/// in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MachinePos {
    /// Name of the hosting world.
    pub world: String,
    /// Block x coordinate.
    pub x: i32,
    /// Block y coordinate.
    pub y: i32,
    /// Block z coordinate.
    pub z: i32,
}

impl MachinePos {
    /// Build a position from a world name and block coordinates.
    pub fn new(world: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }
}

impl fmt::Display for MachinePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{},{},{}", self.world, self.x, self.y, self.z)
    }
}
