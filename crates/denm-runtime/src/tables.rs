//! Originating and receiving tables
//!
//! Each table is a map keyed by action id, so at most one entry per action
//! id exists on either side. Entries carry the timers that eventually delete
//! them; the service guards each table with its own lock.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use denm_core::{ActionId, OriginatingEntry, ReceivingEntry, StationId};
use denm_time::{Scheduler, TimerSet, TimerSlot};

/// Originating entry with its three timers
#[derive(Debug)]
pub struct OriginatingSlot {
    pub entry: OriginatingEntry,
    pub timers: TimerSet,
}

impl OriginatingSlot {
    pub fn new(entry: OriginatingEntry) -> Self {
        OriginatingSlot {
            entry,
            timers: TimerSet::new(),
        }
    }
}

/// Events this station is broadcasting
#[derive(Debug, Default)]
pub struct OriginatingTable {
    next_sequence: u32,
    entries: HashMap<ActionId, OriginatingSlot>,
}

impl OriginatingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next action id for `station`
    ///
    /// The counter advances even if the caller later fails to announce the
    /// event, so a sequence number is never handed out twice.
    pub fn allocate(&mut self, station: StationId) -> ActionId {
        let id = ActionId::new(station, self.next_sequence);
        self.next_sequence = self.next_sequence.wrapping_add(1);
        id
    }

    /// Sequence number the next allocation will use
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    pub fn get(&self, id: &ActionId) -> Option<&OriginatingSlot> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &ActionId) -> Option<&mut OriginatingSlot> {
        self.entries.get_mut(id)
    }

    /// Insert a slot; an existing slot for the same id is replaced and its
    /// timers cancelled
    pub fn insert(&mut self, slot: OriginatingSlot, scheduler: &dyn Scheduler) -> &mut OriginatingSlot {
        match self.entries.entry(slot.entry.action_id) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().timers.cancel_all(scheduler);
                occupied.insert(slot);
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(slot),
        }
    }

    pub fn remove(&mut self, id: &ActionId) -> Option<OriginatingSlot> {
        self.entries.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<ActionId> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Cancel every timer; entries stay in place
    pub fn cancel_all_timers(&mut self, scheduler: &dyn Scheduler) {
        for slot in self.entries.values_mut() {
            slot.timers.cancel_all(scheduler);
        }
    }
}

/// Receiving entry with its validity timer
#[derive(Debug)]
pub struct ReceivingSlot {
    pub entry: ReceivingEntry,
    pub validity: TimerSlot,
}

impl ReceivingSlot {
    pub fn new(entry: ReceivingEntry) -> Self {
        ReceivingSlot {
            entry,
            validity: TimerSlot::new(),
        }
    }
}

/// Events learned from other stations
#[derive(Debug, Default)]
pub struct ReceivingTable {
    entries: HashMap<ActionId, ReceivingSlot>,
}

impl ReceivingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ActionId) -> Option<&ReceivingSlot> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &ActionId) -> Option<&mut ReceivingSlot> {
        self.entries.get_mut(id)
    }

    /// Store `entry`, replacing the entry of an existing slot
    ///
    /// An existing slot keeps its validity timer; the caller re-arms it.
    pub fn upsert(&mut self, entry: ReceivingEntry) -> &mut ReceivingSlot {
        match self.entries.entry(entry.action_id) {
            Entry::Occupied(occupied) => {
                let slot = occupied.into_mut();
                slot.entry = entry;
                slot
            }
            Entry::Vacant(vacant) => vacant.insert(ReceivingSlot::new(entry)),
        }
    }

    pub fn remove(&mut self, id: &ActionId) -> Option<ReceivingSlot> {
        self.entries.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<ActionId> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Cancel every validity timer; entries stay in place
    pub fn cancel_all_timers(&mut self, scheduler: &dyn Scheduler) {
        for slot in self.entries.values_mut() {
            slot.validity.cancel(scheduler);
        }
    }
}
