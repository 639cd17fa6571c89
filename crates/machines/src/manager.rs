//! Per-position production scheduling.
//!
//! Every active machine gets its own repeating timer task. Tasks never
//! capture machine state; each firing looks the position up again in the
//! shared slot map, so a cancelled task cannot resurrect a removed machine.
//! All per-position mutation funnels through that position's single timer
//! (or through registration/unregistration), which is what lets the slot
//! contents live behind one small mutex with no further coordination.

use crate::definition::MachineDefinition;
use crate::display::{MachineDisplay, WorldMarker};
use crate::machine::ActiveMachine;
use crate::persist::{MachineRecord, MachineStore};
use crate::registry::DefinitionRegistry;
use skyforge_core::{MachinePos, OwnerId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Timer polling period, in scheduler ticks. The timer fires far more often
/// than production occurs so the progress display stays responsive.
pub const POLL_PERIOD_TICKS: u64 = 5;

/// Cells in the progress indicator; display refreshes are deduplicated at
/// this granularity.
const PROGRESS_CELLS: u64 = 10;

/// Milliseconds since the Unix epoch.
pub fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Mutex poisoning can only follow a panic in a lock holder; recover the
/// guard instead of cascading that panic through the scheduler.
fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Why a machine could not be registered.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("unknown machine definition: {0}")]
    UnknownDefinition(String),
    #[error("a machine is already registered at {0}")]
    PositionOccupied(MachinePos),
}

/// One active machine plus the scheduler's transient bookkeeping for it.
/// The bookkeeping is discarded on unregistration and never persisted.
struct MachineSlot {
    machine: ActiveMachine,
    /// Monotonic per-position tick counter, advanced only by this
    /// position's timer. Decoupled from any externally visible clock.
    ticks: u64,
    last_amount: u32,
    last_cell: u64,
    idle_shown: bool,
}

/// Owns the active-machine registry and one timer per registered position.
///
/// Cheap to clone; clones share the same underlying state. `register` and
/// `load` spawn timers and must be called from within a tokio runtime.
#[derive(Clone)]
pub struct MachineManager {
    inner: Arc<Inner>,
}

struct Inner {
    definitions: RwLock<DefinitionRegistry>,
    slots: Mutex<HashMap<MachinePos, Arc<Mutex<MachineSlot>>>>,
    tasks: Mutex<HashMap<MachinePos, JoinHandle<()>>>,
    display: Arc<dyn MachineDisplay>,
    marker: Arc<dyn WorldMarker>,
    store: Arc<dyn MachineStore>,
    tick_duration_ms: u64,
}

impl MachineManager {
    /// Build a manager around its collaborators. No timers run until the
    /// first registration or restore.
    pub fn new(
        definitions: DefinitionRegistry,
        store: Arc<dyn MachineStore>,
        display: Arc<dyn MachineDisplay>,
        marker: Arc<dyn WorldMarker>,
        tick_duration_ms: u64,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                definitions: RwLock::new(definitions),
                slots: Mutex::new(HashMap::new()),
                tasks: Mutex::new(HashMap::new()),
                display,
                marker,
                store,
                tick_duration_ms: tick_duration_ms.max(1),
            }),
        }
    }

    /// Activate a fresh machine at `pos` and start its production timer.
    pub fn register(
        &self,
        owner: OwnerId,
        definition_id: &str,
        pos: MachinePos,
    ) -> Result<(), RegisterError> {
        let definition = self
            .get_definition(definition_id)
            .ok_or_else(|| RegisterError::UnknownDefinition(definition_id.to_string()))?;
        let machine = ActiveMachine::new(owner, definition.clone(), pos.clone(), 0);
        self.insert_slot(machine)?;
        self.inner.marker.set_marker(&pos, &definition.marker_block);
        self.inner.display.show_idle(&pos);
        info!("Registered machine {definition_id} at {pos} for {owner}");
        self.spawn_timer(pos);
        self.save();
        Ok(())
    }

    /// Deactivate the machine at `pos`, cancelling its timer first so no
    /// further firing can observe a half-removed machine. Returns whether a
    /// machine was present.
    pub fn unregister(&self, pos: &MachinePos) -> bool {
        if let Some(task) = relock(&self.inner.tasks).remove(pos) {
            task.abort();
        }
        let Some(slot) = relock(&self.inner.slots).remove(pos) else {
            return false;
        };
        self.inner.display.remove(pos);
        self.inner.marker.clear_marker(pos);
        info!(
            "Unregistered machine {} at {pos}",
            relock(&slot).machine.definition().id
        );
        self.save();
        true
    }

    /// Cancel every timer, then clear all registries and displays. No timer
    /// fires once this returns.
    pub fn shutdown(&self) {
        let tasks: Vec<JoinHandle<()>> = relock(&self.inner.tasks)
            .drain()
            .map(|(_, task)| task)
            .collect();
        for task in &tasks {
            task.abort();
        }
        let positions: Vec<MachinePos> = relock(&self.inner.slots)
            .drain()
            .map(|(pos, _)| pos)
            .collect();
        for pos in &positions {
            self.inner.display.remove(pos);
        }
        info!("Machine scheduler stopped; released {} machines", positions.len());
    }

    /// Snapshot every machine to the store. A write failure is logged and
    /// otherwise ignored: in-memory state stays authoritative and the next
    /// save attempt is independent.
    pub fn save(&self) {
        let records = self.records();
        if let Err(err) = self.inner.store.write_all(&records) {
            warn!("Failed to persist machines: {err:#}");
        }
    }

    /// Restore persisted machines, replay production missed while the
    /// system was down, and start their timers. Returns the restored count.
    pub fn load(&self, now_ms: u64) -> usize {
        let records = match self.inner.store.read_all() {
            Ok(records) => records,
            Err(err) => {
                warn!("Failed to read persisted machines: {err:#}");
                return 0;
            }
        };
        let mut restored = 0;
        for record in records {
            if self.restore(record, now_ms) {
                restored += 1;
            }
        }
        if restored > 0 {
            info!("Restored {restored} machines from persistent storage");
        }
        restored
    }

    /// Replace the definition table. Running machines keep the definition
    /// they were built with; new registrations see the new table.
    pub fn reload_definitions(&self, registry: DefinitionRegistry) {
        if let Ok(mut definitions) = self.inner.definitions.write() {
            *definitions = registry;
            info!("Reloaded {} machine definitions", definitions.len());
        }
    }

    /// Look up a machine definition by id.
    pub fn get_definition(&self, id: &str) -> Option<Arc<MachineDefinition>> {
        self.inner
            .definitions
            .read()
            .ok()
            .and_then(|definitions| definitions.get(id))
    }

    /// Number of loaded definitions.
    pub fn definition_count(&self) -> usize {
        self.inner
            .definitions
            .read()
            .map(|definitions| definitions.len())
            .unwrap_or(0)
    }

    /// Number of active machines.
    pub fn active_count(&self) -> usize {
        relock(&self.inner.slots).len()
    }

    /// Current internal tick counter for `pos` (0 if nothing is there).
    pub fn current_tick(&self, pos: &MachinePos) -> u64 {
        self.inner
            .slot(pos)
            .map(|slot| relock(&slot).ticks)
            .unwrap_or(0)
    }

    /// Run a read-only closure against the machine at `pos`.
    pub fn with_machine<R>(&self, pos: &MachinePos, f: impl FnOnce(&ActiveMachine) -> R) -> Option<R> {
        let slot = self.inner.slot(pos)?;
        let guard = relock(&slot);
        Some(f(&guard.machine))
    }

    /// Set the level of the machine at `pos`. The new interval takes effect
    /// when the current cycle reschedules. Returns whether a machine was
    /// present.
    pub fn set_level(&self, pos: &MachinePos, level: u32) -> bool {
        let Some(slot) = self.inner.slot(pos) else {
            return false;
        };
        relock(&slot).machine.set_level(level);
        true
    }

    /// Take up to `amount` units of the machine's primary product out of its
    /// buffer, refreshing the display. Returns what was actually taken.
    pub fn withdraw(&self, pos: &MachinePos, amount: u32) -> u32 {
        self.withdraw_impl(pos, Some(amount))
    }

    /// Empty the machine's primary-product buffer. Returns the quantity.
    pub fn withdraw_all(&self, pos: &MachinePos) -> u32 {
        self.withdraw_impl(pos, None)
    }

    fn withdraw_impl(&self, pos: &MachinePos, amount: Option<u32>) -> u32 {
        let Some(slot) = self.inner.slot(pos) else {
            return 0;
        };
        let mut guard = relock(&slot);
        let slot = &mut *guard;
        let product = slot.machine.primary_product();
        let taken = match amount {
            Some(amount) => slot.machine.retrieve(product, amount),
            None => slot.machine.retrieve_all(product),
        };
        if taken > 0 {
            let remaining = slot.machine.stored(product);
            let interval = slot.machine.effective_interval();
            let cycle_start = slot.machine.next_due_tick().saturating_sub(interval);
            let progress = slot.ticks.saturating_sub(cycle_start).min(interval);
            self.inner.display.show_production(
                pos,
                &slot.machine.definition().id,
                remaining,
                progress,
                interval,
            );
            slot.last_amount = remaining;
            slot.idle_shown = false;
        }
        taken
    }

    fn restore(&self, record: MachineRecord, now_ms: u64) -> bool {
        let pos = record.pos();
        let Some(definition) = self.get_definition(&record.definition_id) else {
            warn!(
                "Skipping machine at {pos}: unknown definition {:?}",
                record.definition_id
            );
            return false;
        };
        let mut machine = ActiveMachine::new(record.owner, definition.clone(), pos.clone(), 0);
        machine.set_level(record.level);
        if record.next_due_tick > 0 {
            machine.set_next_due_tick(record.next_due_tick);
        }
        machine.set_last_production_ms(record.last_production_ms);
        for (resource, count) in record.decode_storage() {
            machine.set_stored(resource, count);
        }

        let report = machine.catch_up(now_ms, self.inner.tick_duration_ms);
        if report.cycles_due > 0 {
            debug!(
                "Machine at {pos} caught up {} of {} missed production cycles",
                report.cycles_applied, report.cycles_due
            );
        }

        let amount = machine.stored(machine.primary_product());
        let interval = machine.effective_interval();
        if self.insert_slot(machine).is_err() {
            warn!("Skipping duplicate persisted machine at {pos}");
            return false;
        }
        self.inner.marker.set_marker(&pos, &definition.marker_block);
        self.inner
            .display
            .show_production(&pos, &record.definition_id, amount, 0, interval);
        self.spawn_timer(pos);
        true
    }

    fn insert_slot(&self, machine: ActiveMachine) -> Result<(), RegisterError> {
        let pos = machine.pos().clone();
        // Counter starts one interval before the due tick so elapsed time
        // within the cycle is consistent for fresh and restored machines.
        let ticks = machine
            .next_due_tick()
            .saturating_sub(machine.effective_interval());
        let last_amount = machine.stored(machine.primary_product());
        let slot = MachineSlot {
            machine,
            ticks,
            last_amount,
            last_cell: 0,
            idle_shown: false,
        };
        let mut slots = relock(&self.inner.slots);
        if slots.contains_key(&pos) {
            return Err(RegisterError::PositionOccupied(pos));
        }
        slots.insert(pos, Arc::new(Mutex::new(slot)));
        Ok(())
    }

    fn spawn_timer(&self, pos: MachinePos) {
        let weak = Arc::downgrade(&self.inner);
        let period = Duration::from_millis(
            POLL_PERIOD_TICKS
                .saturating_mul(self.inner.tick_duration_ms)
                .max(1),
        );
        let task_pos = pos.clone();
        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // An interval's first tick completes immediately; consume it so
            // the counter only advances after a full polling period.
            timer.tick().await;
            loop {
                timer.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                if !inner.poll_position(&task_pos) {
                    break;
                }
            }
        });
        if let Some(previous) = relock(&self.inner.tasks).insert(pos, handle) {
            previous.abort();
        }
    }

    fn records(&self) -> Vec<MachineRecord> {
        let slots: Vec<Arc<Mutex<MachineSlot>>> =
            relock(&self.inner.slots).values().cloned().collect();
        let mut records: Vec<MachineRecord> = slots
            .iter()
            .map(|slot| MachineRecord::from_machine(&relock(slot).machine))
            .collect();
        records.sort_by(|a, b| a.pos().cmp(&b.pos()));
        records
    }
}

impl Inner {
    fn slot(&self, pos: &MachinePos) -> Option<Arc<Mutex<MachineSlot>>> {
        relock(&self.slots).get(pos).cloned()
    }

    /// One timer firing for `pos`. Returns `false` once the position is
    /// gone so the timer task stops itself.
    fn poll_position(&self, pos: &MachinePos) -> bool {
        let Some(slot) = self.slot(pos) else {
            return false;
        };
        let mut guard = relock(&slot);
        let slot = &mut *guard;

        slot.ticks += POLL_PERIOD_TICKS;
        let interval = slot.machine.effective_interval();
        let cycle_start = slot.machine.next_due_tick().saturating_sub(interval);
        let progress = slot.ticks.saturating_sub(cycle_start).min(interval);
        let cell = progress * PROGRESS_CELLS / interval.max(1);

        if slot.ticks >= slot.machine.next_due_tick() {
            if slot.machine.produce_and_check() {
                slot.machine.set_last_production_ms(unix_ms());
                slot.idle_shown = false;
                let amount = slot.machine.stored(slot.machine.primary_product());
                if amount != slot.last_amount || cell != slot.last_cell {
                    self.display.show_production(
                        pos,
                        &slot.machine.definition().id,
                        amount,
                        progress,
                        interval,
                    );
                    slot.last_amount = amount;
                    slot.last_cell = cell;
                }
                debug!(
                    "Machine at {pos} produced; {amount} {} buffered",
                    slot.machine.primary_product()
                );
            } else {
                // A full buffer is a normal skip, not an error. The machine
                // retries at the next interval boundary instead of
                // busy-looping on every poll.
                if !slot.idle_shown {
                    self.display.show_idle(pos);
                    slot.idle_shown = true;
                }
                debug!("Machine at {pos} skipped production: buffer full");
            }
            let now = slot.ticks;
            slot.machine.schedule_next(now);
        } else if cell != slot.last_cell {
            let amount = slot.machine.stored(slot.machine.primary_product());
            self.display.show_production(
                pos,
                &slot.machine.definition().id,
                amount,
                progress,
                interval,
            );
            slot.last_amount = amount;
            slot.last_cell = cell;
        }
        true
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Timers hold only a weak handle back here, but abort them anyway so
        // a dropped manager quiesces immediately rather than at next firing.
        if let Ok(tasks) = self.tasks.get_mut() {
            for task in tasks.values() {
                task.abort();
            }
        }
    }
}
