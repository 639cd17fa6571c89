//! Durable storage of active machines.
//!
//! Records are flat and self-contained so the store can stay format-agnostic.
//! Loading is partial-failure-tolerant: one bad record is skipped with a
//! warning and never aborts the batch.

use crate::machine::ActiveMachine;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use skyforge_core::{MachinePos, OwnerId, Resource};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// One persisted machine. Field-for-field what survives a restart; the
/// scheduler's transient bookkeeping (tick counters, display caches) is
/// deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineRecord {
    pub owner: OwnerId,
    pub definition_id: String,
    pub world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub level: u32,
    pub next_due_tick: u64,
    /// Wall-clock ms of the last production; 0 = unknown (no catch-up).
    #[serde(default)]
    pub last_production_ms: u64,
    /// Resource name -> buffered count. BTreeMap keeps serialized order
    /// stable across saves.
    #[serde(default)]
    pub storage: BTreeMap<String, u32>,
}

impl MachineRecord {
    /// Snapshot a live machine.
    pub fn from_machine(machine: &ActiveMachine) -> Self {
        let pos = machine.pos();
        let storage = machine
            .storage()
            .iter()
            .map(|(resource, count)| (resource.name().to_string(), *count))
            .collect();
        Self {
            owner: machine.owner(),
            definition_id: machine.definition().id.clone(),
            world: pos.world.clone(),
            x: pos.x,
            y: pos.y,
            z: pos.z,
            level: machine.level(),
            next_due_tick: machine.next_due_tick(),
            last_production_ms: machine.last_production_ms(),
            storage,
        }
    }

    /// The position key this record restores to.
    pub fn pos(&self) -> MachinePos {
        MachinePos::new(self.world.clone(), self.x, self.y, self.z)
    }

    /// Decode the storage map, skipping resource names this build does not
    /// know (data written by a newer version).
    pub fn decode_storage(&self) -> Vec<(Resource, u32)> {
        let mut decoded = Vec::with_capacity(self.storage.len());
        for (name, count) in &self.storage {
            match Resource::parse(name) {
                Some(resource) => decoded.push((resource, *count)),
                None => warn!(
                    "Ignoring unknown resource {name:?} in persisted machine at {}",
                    self.pos()
                ),
            }
        }
        decoded
    }
}

/// Opaque durable store for machine records.
pub trait MachineStore: Send + Sync {
    /// Replace the persisted set with `records`.
    fn write_all(&self, records: &[MachineRecord]) -> Result<()>;

    /// Read every decodable persisted record.
    fn read_all(&self) -> Result<Vec<MachineRecord>>;
}

/// File-backed store holding all records in one JSON document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store rooted at `path`; parent directories are created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MachineStore for JsonFileStore {
    fn write_all(&self, records: &[MachineRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create machine data directory")?;
        }
        let json =
            serde_json::to_string_pretty(records).context("Failed to serialize machine records")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<MachineRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let entries: Vec<serde_json::Value> = serde_json::from_str(&contents)
            .with_context(|| format!("{} is not a JSON array", self.path.display()))?;

        // Decode records one by one so a single corrupt entry cannot take
        // the rest of the file down with it.
        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value::<MachineRecord>(entry) {
                Ok(record) => records.push(record),
                Err(err) => warn!("Skipping malformed machine record: {err}"),
            }
        }
        Ok(records)
    }
}

/// In-memory store for tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<MachineRecord>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the last written records.
    pub fn records(&self) -> Vec<MachineRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl MachineStore for MemoryStore {
    fn write_all(&self, records: &[MachineRecord]) -> Result<()> {
        if let Ok(mut stored) = self.records.lock() {
            *stored = records.to_vec();
        }
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<MachineRecord>> {
        Ok(self.records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_record() -> MachineRecord {
        MachineRecord {
            owner: OwnerId(Uuid::nil()),
            definition_id: "basic_miner".to_string(),
            world: "islands".to_string(),
            x: 10,
            y: 64,
            z: -4,
            level: 2,
            next_due_tick: 80,
            last_production_ms: 123_456,
            storage: BTreeMap::from([("cobblestone".to_string(), 42)]),
        }
    }

    #[test]
    fn decode_storage_skips_unknown_resources() {
        let mut record = sample_record();
        record
            .storage
            .insert("mystery_ore".to_string(), 7);
        let decoded = record.decode_storage();
        assert_eq!(decoded, vec![(Resource::Cobblestone, 42)]);
    }

    #[test]
    fn record_defaults_tolerate_old_files() {
        // Files written before last_production_ms existed still decode.
        let json = r#"{
            "owner": "00000000-0000-0000-0000-000000000000",
            "definition_id": "basic_miner",
            "world": "islands", "x": 0, "y": 64, "z": 0,
            "level": 1, "next_due_tick": 40
        }"#;
        let record: MachineRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.last_production_ms, 0);
        assert!(record.storage.is_empty());
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::new();
        store.write_all(&[sample_record()]).unwrap();
        let records = store.read_all().unwrap();
        assert_eq!(records, vec![sample_record()]);
    }
}
