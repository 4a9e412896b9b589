use std::collections::VecDeque;

use crate::models::OddsUpdate;

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Bounded log of recently applied updates, newest first.
#[derive(Debug, Clone)]
pub struct RecentUpdates {
    capacity: usize,
    entries: VecDeque<OddsUpdate>,
    pushed: u64,
}

impl RecentUpdates {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            pushed: 0,
        }
    }

    /// Append, evicting the oldest entry once full.
    pub fn push(&mut self, update: OddsUpdate) {
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(update);
        self.pushed += 1;
    }

    /// Updates ever pushed, evicted ones included.
    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }

    /// Entries pushed after the first `seen`, oldest first, and how many of
    /// those have already been evicted.
    pub fn since(&self, seen: u64) -> (Vec<&OddsUpdate>, u64) {
        let fresh = self.pushed.saturating_sub(seen);
        let kept = fresh.min(self.entries.len() as u64);
        let updates = self.entries.iter().take(kept as usize).rev().collect();
        (updates, fresh - kept)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OddsUpdate> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<OddsUpdate> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RecentUpdates {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
