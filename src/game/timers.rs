//! Keyed one-shot timers for delayed player transitions
//!
//! Timers never run callbacks themselves. The owner of the simulation polls
//! [`TimerScheduler::pop_due`] and applies each fired key on its own task, so
//! every transition lands on the same serialization point as movement and
//! combat.

use std::collections::HashMap;
use std::time::Duration;

use super::PlayerId;

/// Delayed transition kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    /// Clears the fatigue latch so stamina can regenerate again
    FatigueRelease,
    /// Moves a dead player back into play
    Respawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerKey {
    pub player_id: PlayerId,
    pub kind: TimerKind,
}

impl TimerKey {
    pub fn new(player_id: PlayerId, kind: TimerKind) -> Self {
        Self { player_id, kind }
    }
}

/// At most one pending deadline per key. Deadlines are offsets from the
/// simulation start.
#[derive(Debug, Default)]
pub struct TimerScheduler {
    deadlines: HashMap<TimerKey, Duration>,
}

impl TimerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` to fire `delay` after `now`. Returns true if a pending
    /// entry for the same key was superseded.
    pub fn arm(&mut self, key: TimerKey, now: Duration, delay: Duration) -> bool {
        self.deadlines.insert(key, now + delay).is_some()
    }

    /// Returns true if something was pending
    pub fn cancel(&mut self, key: TimerKey) -> bool {
        self.deadlines.remove(&key).is_some()
    }

    /// Cancel every timer belonging to a player, returning how many were dropped
    pub fn cancel_player(&mut self, player_id: PlayerId) -> usize {
        let before = self.deadlines.len();
        self.deadlines.retain(|key, _| key.player_id != player_id);
        before - self.deadlines.len()
    }

    pub fn is_armed(&self, key: TimerKey) -> bool {
        self.deadlines.contains_key(&key)
    }

    pub fn deadline(&self, key: TimerKey) -> Option<Duration> {
        self.deadlines.get(&key).copied()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Duration> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every key due at `now`, earliest first
    pub fn pop_due(&mut self, now: Duration) -> Vec<TimerKey> {
        let mut due: Vec<(Duration, TimerKey)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, deadline)| (*deadline, *key))
            .collect();
        due.sort_unstable();

        for (_, key) in &due {
            self.deadlines.remove(key);
        }

        due.into_iter().map(|(_, key)| key).collect()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
