//! Active machine state: bounded resource buffer and production timing.
//!
//! Boundary conditions (empty buffer, full buffer) are expressed as boolean
//! or zero-quantity results, never as errors.

use crate::definition::MachineDefinition;
use skyforge_core::{MachinePos, OwnerId, Resource};
use std::collections::HashMap;
use std::sync::Arc;

/// Hard per-resource storage cap. A production cycle that would overshoot
/// this ceiling is refused outright, not clamped.
pub const STORAGE_CEILING: u32 = 10_000;

/// Level step subtracted from the base interval per level above 1, in ticks.
const INTERVAL_STEP_PER_LEVEL: u64 = 5;

/// Outcome of replaying missed production after a restart.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CatchUpReport {
    /// Full cycles that elapsed while the system was down.
    pub cycles_due: u64,
    /// Cycles that actually produced before the ceiling stopped the replay.
    pub cycles_applied: u64,
}

/// Live, mutable machine instance bound to one world position.
#[derive(Debug, Clone)]
pub struct ActiveMachine {
    owner: OwnerId,
    pos: MachinePos,
    definition: Arc<MachineDefinition>,
    level: u32,
    storage: HashMap<Resource, u32>,
    next_due_tick: u64,
    last_production_ms: u64,
}

impl ActiveMachine {
    /// Fresh machine: level 1, empty buffer, first cycle scheduled relative
    /// to `current_tick`.
    pub fn new(
        owner: OwnerId,
        definition: Arc<MachineDefinition>,
        pos: MachinePos,
        current_tick: u64,
    ) -> Self {
        let mut machine = Self {
            owner,
            pos,
            definition,
            level: 1,
            storage: HashMap::new(),
            next_due_tick: 0,
            last_production_ms: 0,
        };
        machine.schedule_next(current_tick);
        machine
    }

    /// Owning entity id.
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// World position this machine is bound to.
    pub fn pos(&self) -> &MachinePos {
        &self.pos
    }

    /// Shared definition this machine was built from.
    pub fn definition(&self) -> &Arc<MachineDefinition> {
        &self.definition
    }

    /// Current level (always >= 1).
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Set the level; values below 1 clamp to 1.
    pub fn set_level(&mut self, level: u32) {
        self.level = level.max(1);
    }

    /// Absolute tick at which the next production cycle fires.
    pub fn next_due_tick(&self) -> u64 {
        self.next_due_tick
    }

    /// Restore the scheduling state from a persisted record.
    pub fn set_next_due_tick(&mut self, tick: u64) {
        self.next_due_tick = tick;
    }

    /// Wall-clock timestamp of the last successful production (ms since the
    /// Unix epoch, 0 = unknown). Used only for offline catch-up.
    pub fn last_production_ms(&self) -> u64 {
        self.last_production_ms
    }

    /// Record when production last happened.
    pub fn set_last_production_ms(&mut self, ms: u64) {
        self.last_production_ms = ms;
    }

    /// Production interval at the current level, never below 1 tick.
    pub fn effective_interval(&self) -> u64 {
        self.definition
            .base_interval_ticks
            .saturating_sub(u64::from(self.level - 1) * INTERVAL_STEP_PER_LEVEL)
            .max(1)
    }

    /// Units one production cycle yields at the current level.
    pub fn cycle_yield(&self) -> u32 {
        self.definition.base_yield + (self.level - 1)
    }

    /// The resource this machine accrues.
    pub fn primary_product(&self) -> Resource {
        self.definition.primary_product()
    }

    /// Schedule the next cycle one interval after `current_tick`.
    pub fn schedule_next(&mut self, current_tick: u64) {
        self.next_due_tick = current_tick + self.effective_interval();
    }

    /// Whether one more cycle fits under the storage ceiling. Side-effect
    /// free.
    pub fn can_produce(&self) -> bool {
        let stored = self.stored(self.primary_product());
        stored.saturating_add(self.cycle_yield()) <= STORAGE_CEILING
    }

    /// Run one production cycle. Returns `false` without touching storage
    /// when the buffer is full; the caller retries at the next due tick.
    pub fn produce_and_check(&mut self) -> bool {
        if !self.can_produce() {
            return false;
        }
        let product = self.primary_product();
        let produced = self.cycle_yield();
        *self.storage.entry(product).or_insert(0) += produced;
        true
    }

    /// Quantity currently buffered for `resource`.
    pub fn stored(&self, resource: Resource) -> u32 {
        self.storage.get(&resource).copied().unwrap_or(0)
    }

    /// Overwrite the buffered quantity for `resource` (restore path).
    pub fn set_stored(&mut self, resource: Resource, amount: u32) {
        self.storage.insert(resource, amount);
    }

    /// Full storage map.
    pub fn storage(&self) -> &HashMap<Resource, u32> {
        &self.storage
    }

    /// Remove up to `amount` units of `resource`, returning what was
    /// actually removed. Requests beyond stock truncate to the stock.
    pub fn retrieve(&mut self, resource: Resource, amount: u32) -> u32 {
        let available = self.stored(resource);
        let taken = amount.min(available);
        if taken > 0 {
            self.storage.insert(resource, available - taken);
        }
        taken
    }

    /// Empty the buffer for `resource`, returning the prior quantity.
    pub fn retrieve_all(&mut self, resource: Resource) -> u32 {
        self.retrieve(resource, u32::MAX)
    }

    /// Replay production missed while the system was down.
    ///
    /// Applies up to `floor(elapsed / interval_ms)` cycles, stopping early
    /// once the ceiling is reached. The timestamp always advances by the
    /// full due span; cycles lost to the ceiling are not carried as debt.
    pub fn catch_up(&mut self, now_ms: u64, tick_duration_ms: u64) -> CatchUpReport {
        let mut report = CatchUpReport::default();
        let interval_ms = self.effective_interval().saturating_mul(tick_duration_ms);
        if self.last_production_ms == 0 || interval_ms == 0 || now_ms <= self.last_production_ms {
            return report;
        }
        report.cycles_due = (now_ms - self.last_production_ms) / interval_ms;
        for _ in 0..report.cycles_due {
            if !self.produce_and_check() {
                break;
            }
            report.cycles_applied += 1;
        }
        self.last_production_ms += report.cycles_due * interval_ms;
        report
    }
}
