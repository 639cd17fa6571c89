//! Save/restore behavior across manager instances, including offline
//! production catch-up.

use skyforge_core::{MachinePos, OwnerId, Resource};
use skyforge_machines::{
    DefinitionRegistry, JsonFileStore, MachineManager, MachineStore, NullDisplay, NullMarker,
    STORAGE_CEILING,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique scratch file per test run.
fn temp_store_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("skyforge-machines-{name}-{nanos}.json"))
}

fn registry() -> DefinitionRegistry {
    DefinitionRegistry::load_from_str(
        r#"[
            {"id": "basic_miner", "type": "miner", "block": "cobblestone",
             "base_interval": 40, "base_yield": 1},
            {"id": "wood_cutter", "type": "lumber", "block": "oak_log",
             "base_interval": 60, "base_yield": 2}
        ]"#,
    )
    .unwrap()
}

// Dormant timer: polling happens hours apart, so tests control all state.
const TICK_MS: u64 = 3_600_000;

fn manager(store: Arc<dyn MachineStore>) -> MachineManager {
    MachineManager::new(
        registry(),
        store,
        Arc::new(NullDisplay),
        Arc::new(NullMarker),
        TICK_MS,
    )
}

#[tokio::test]
async fn machines_survive_a_manager_restart() {
    let path = temp_store_path("restart");
    let pos_a = MachinePos::new("islands", 0, 64, 0);
    let pos_b = MachinePos::new("islands", 8, 64, -3);
    let owner = OwnerId::random();

    {
        let first = manager(Arc::new(JsonFileStore::new(&path)));
        first.register(owner, "basic_miner", pos_a.clone()).unwrap();
        first.register(owner, "wood_cutter", pos_b.clone()).unwrap();
        first.set_level(&pos_a, 3);
        first.save();
        first.shutdown();
    }

    let second = manager(Arc::new(JsonFileStore::new(&path)));
    assert_eq!(second.load(0), 2);
    assert_eq!(second.active_count(), 2);
    assert_eq!(second.with_machine(&pos_a, |m| m.level()), Some(3));
    assert_eq!(second.with_machine(&pos_a, |m| m.owner()), Some(owner));
    assert_eq!(
        second.with_machine(&pos_b, |m| m.definition().id.clone()),
        Some("wood_cutter".to_string())
    );
    second.shutdown();

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn restore_replays_missed_production_cycles() {
    let path = temp_store_path("catch-up");
    let pos = MachinePos::new("islands", 2, 64, 2);
    let interval_ms = 40 * TICK_MS;
    let last = 1_000_000_000_000u64;

    {
        let first = manager(Arc::new(JsonFileStore::new(&path)));
        first
            .register(OwnerId::random(), "basic_miner", pos.clone())
            .unwrap();
        first.shutdown();
    }

    // Age the record on disk the way a save from a long-dead session looks.
    let contents = fs::read_to_string(&path).unwrap();
    let mut records: Vec<serde_json::Value> = serde_json::from_str(&contents).unwrap();
    records[0]["last_production_ms"] = serde_json::json!(last);
    fs::write(&path, serde_json::to_string_pretty(&records).unwrap()).unwrap();

    // Exactly 3 intervals plus change elapsed: 3 cycles, floored.
    let now = last + 3 * interval_ms + interval_ms / 2;
    let second = manager(Arc::new(JsonFileStore::new(&path)));
    assert_eq!(second.load(now), 1);
    assert_eq!(
        second.with_machine(&pos, |m| m.stored(Resource::Cobblestone)),
        Some(3)
    );
    assert_eq!(
        second.with_machine(&pos, |m| m.last_production_ms()),
        Some(last + 3 * interval_ms)
    );
    second.shutdown();

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn restore_caps_catch_up_at_the_storage_ceiling() {
    let path = temp_store_path("ceiling");
    let pos = MachinePos::new("islands", 4, 64, 4);
    let interval_ms = 40 * TICK_MS;
    let last = 1_000_000_000_000u64;

    {
        let first = manager(Arc::new(JsonFileStore::new(&path)));
        first
            .register(OwnerId::random(), "basic_miner", pos.clone())
            .unwrap();
        first.shutdown();
    }

    let contents = fs::read_to_string(&path).unwrap();
    let mut records: Vec<serde_json::Value> = serde_json::from_str(&contents).unwrap();
    records[0]["last_production_ms"] = serde_json::json!(last);
    records[0]["storage"] = serde_json::json!({ "cobblestone": STORAGE_CEILING - 1 });
    fs::write(&path, serde_json::to_string_pretty(&records).unwrap()).unwrap();

    // 5 cycles elapsed but only 1 unit of headroom remains.
    let second = manager(Arc::new(JsonFileStore::new(&path)));
    assert_eq!(second.load(last + 5 * interval_ms), 1);
    assert_eq!(
        second.with_machine(&pos, |m| m.stored(Resource::Cobblestone)),
        Some(STORAGE_CEILING)
    );
    // The lost cycles are not owed later.
    assert_eq!(
        second.with_machine(&pos, |m| m.last_production_ms()),
        Some(last + 5 * interval_ms)
    );
    second.shutdown();

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn corrupt_records_are_skipped_not_fatal() {
    let path = temp_store_path("corrupt");
    fs::write(
        &path,
        r#"[
            {"bogus": true},
            {"owner": "00000000-0000-0000-0000-000000000000",
             "definition_id": "basic_miner",
             "world": "islands", "x": 1, "y": 64, "z": 1,
             "level": 1, "next_due_tick": 40},
            {"owner": "00000000-0000-0000-0000-000000000000",
             "definition_id": "removed_machine_kind",
             "world": "islands", "x": 2, "y": 64, "z": 2,
             "level": 1, "next_due_tick": 40}
        ]"#,
    )
    .unwrap();

    let restored = manager(Arc::new(JsonFileStore::new(&path)));
    // One record is undecodable, one names a definition this build lacks.
    assert_eq!(restored.load(0), 1);
    assert_eq!(restored.active_count(), 1);
    assert!(restored
        .with_machine(&MachinePos::new("islands", 1, 64, 1), |m| m.level())
        .is_some());
    restored.shutdown();

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn missing_store_file_loads_nothing() {
    let path = temp_store_path("missing");
    let fresh = manager(Arc::new(JsonFileStore::new(&path)));
    assert_eq!(fresh.load(0), 0);
    assert_eq!(fresh.active_count(), 0);
}
