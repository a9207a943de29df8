//! History buffer - bounded snapshot ring enabling rewindable playback.
//!
//! Every non-paused forward tick appends a deep, independent snapshot of the
//! world's entity data. The buffer is a strict FIFO ring: once full, each
//! append evicts the oldest entry. Reverse playback walks a cursor backward
//! one snapshot per tick; jump-back moves the cursor a fixed distance in one
//! step. Resuming forward truncates every snapshot newer than the restored
//! point - the un-taken future is discarded, which keeps tick numbers
//! strictly increasing along the buffer.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::world::{Base, BaseId, CommandGroup, Drone, DroneId, GroupId, WorldState};

/// A deep, independent copy of the world's entity data at one tick.
///
/// Never aliases live state: capture clones in, restore clones out. Clock
/// state (pause flag, playback direction) is deliberately absent - it belongs
/// to the engine, not to the world being replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub tick: u64,
    pub drones: BTreeMap<DroneId, Drone>,
    pub bases: BTreeMap<BaseId, Base>,
    pub groups: BTreeMap<GroupId, CommandGroup>,
}

impl HistorySnapshot {
    /// Captures the world's entity data by value.
    pub fn capture(world: &WorldState) -> Self {
        Self {
            tick: world.tick,
            drones: world.drones.clone(),
            bases: world.bases.clone(),
            groups: world.groups.clone(),
        }
    }

    /// Restores this snapshot into the live world as a fresh copy.
    ///
    /// Id counters are left alone: they are monotone across the whole
    /// session so a rewind can never recycle an identity.
    pub fn restore(&self, world: &mut WorldState) {
        world.tick = self.tick;
        world.drones = self.drones.clone();
        world.bases = self.bases.clone();
        world.groups = self.groups.clone();
    }
}

/// Fixed-capacity snapshot ring with a reverse-playback cursor.
#[derive(Debug)]
pub struct History {
    snapshots: VecDeque<HistorySnapshot>,
    capacity: usize,
    cursor: Option<usize>,
}

impl History {
    /// Creates an empty buffer holding at most `capacity` snapshots.
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
            cursor: None,
        }
    }

    /// Appends a snapshot, evicting the oldest when full.
    ///
    /// Only legal while running forward; the engine resumes (truncating any
    /// rewound-away future) before it appends again.
    pub fn push(&mut self, snapshot: HistorySnapshot) {
        debug_assert!(self.cursor.is_none(), "push while reverse cursor active");
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    /// Number of retained snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tick of the oldest retained snapshot.
    pub fn oldest_tick(&self) -> Option<u64> {
        self.snapshots.front().map(|s| s.tick)
    }

    /// Tick of the newest retained snapshot.
    pub fn newest_tick(&self) -> Option<u64> {
        self.snapshots.back().map(|s| s.tick)
    }

    /// Steps the reverse cursor one snapshot further into the past and
    /// returns the snapshot to restore.
    ///
    /// The first reverse step starts from the newest entry (which mirrors
    /// the live state) and lands on its predecessor. Returns `None` once the
    /// oldest retained snapshot has been reached: reversal halts there.
    pub fn step_back(&mut self) -> Option<&HistorySnapshot> {
        if self.snapshots.is_empty() {
            return None;
        }

        let current = self.cursor.unwrap_or(self.snapshots.len() - 1);
        if current == 0 {
            self.cursor = Some(0);
            return None;
        }

        let target = current - 1;
        self.cursor = Some(target);
        self.snapshots.get(target)
    }

    /// Moves the cursor `ticks` snapshots into the past in one step,
    /// clamped to the oldest retained snapshot, and returns the snapshot to
    /// restore.
    pub fn jump_back(&mut self, ticks: u64) -> Option<&HistorySnapshot> {
        if self.snapshots.is_empty() {
            return None;
        }

        let current = self.cursor.unwrap_or(self.snapshots.len() - 1);
        let target = current.saturating_sub(ticks as usize);
        self.cursor = Some(target);
        self.snapshots.get(target)
    }

    /// Ends playback: discards every snapshot newer than the cursor and
    /// clears it, so forward appends continue from the restored point.
    pub fn resume_forward(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            self.snapshots.truncate(cursor + 1);
        }
    }

    /// Drops all snapshots and playback state (full reset).
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.cursor = None;
    }
}
