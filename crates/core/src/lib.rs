#![warn(missing_docs)]
//! Core primitives shared across the workspace.

mod position;
mod resource;

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// Re-export commonly used types
pub use position::MachinePos;
pub use resource::Resource;

/// Default wall-clock duration of one scheduler tick (20 TPS => 50 ms).
///
/// Only catch-up math converts ticks to wall-clock time; in-session
/// scheduling runs on per-position tick counters.
pub const DEFAULT_TICK_DURATION_MS: u64 = 50;

/// Identity of the entity (player or island) that owns a placed machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub Uuid);

impl OwnerId {
    /// Generate a fresh random owner id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_ids_are_distinct() {
        assert_ne!(OwnerId::random(), OwnerId::random());
    }

    #[test]
    fn owner_id_serializes_as_plain_uuid() {
        let owner = OwnerId(Uuid::nil());
        let json = serde_json::to_string(&owner).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }
}
