//! Definition registry with lenient JSON loading.
//!
//! A malformed entry is skipped with a warning and never aborts the rest of
//! the load; only an unreadable document is an error.

use crate::definition::{MachineDefinition, MachineKind, RawDefinition};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Immutable lookup table of machine definitions, keyed by config id.
/// Frozen after load; replaced wholesale on explicit reload.
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    defs: HashMap<String, Arc<MachineDefinition>>,
}

/// Error for a definition document that cannot be read at all.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The document was not a JSON array of entries.
    #[error("invalid machine definition document: {0}")]
    Parse(#[from] serde_json::Error),
}

impl DefinitionRegistry {
    /// Empty registry. Lookups treat absence as a recoverable condition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load definitions from a JSON array. Entries that fail to decode or
    /// name an unknown machine type are skipped with a warning.
    pub fn load_from_str(json: &str) -> Result<Self, RegistryError> {
        let entries: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let mut defs = HashMap::new();
        for entry in entries {
            let raw: RawDefinition = match serde_json::from_value(entry) {
                Ok(raw) => raw,
                Err(err) => {
                    warn!("Skipping malformed machine definition: {err}");
                    continue;
                }
            };
            let Some(kind) = MachineKind::parse(&raw.kind) else {
                warn!(
                    "Skipping machine definition {}: unknown type {:?}",
                    raw.id, raw.kind
                );
                continue;
            };
            let id = raw.id.clone();
            let def = MachineDefinition {
                kind,
                display_name: raw.name.unwrap_or_else(|| raw.id.clone()),
                id: raw.id,
                marker_block: raw.block,
                base_interval_ticks: raw.base_interval.max(1),
                base_yield: raw.base_yield,
            };
            if defs.insert(id.clone(), Arc::new(def)).is_some() {
                warn!("Duplicate machine definition {id}, keeping the last entry");
            }
        }
        Ok(Self { defs })
    }

    /// Look up a definition by id. Absence means "unknown machine type" and
    /// is never fatal; callers decide how to degrade.
    pub fn get(&self, id: &str) -> Option<Arc<MachineDefinition>> {
        self.defs.get(id).cloned()
    }

    /// Number of loaded definitions.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Whether no definitions loaded.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Iterate over the loaded definition ids.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }
}
