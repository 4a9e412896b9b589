use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use super::slip::BetSelection;

pub const DEFAULT_RECENT_CAPACITY: usize = 50;

/// Fixed-capacity, insertion-ordered set of recent submission hashes.
/// The oldest entry is evicted in O(1) once the set is full, and entries
/// older than `window` no longer count as duplicates.
#[derive(Debug, Clone)]
pub struct RecentHashes {
    capacity: usize,
    window: Duration,
    order: VecDeque<(String, Instant)>,
    members: HashSet<String>,
}

impl RecentHashes {
    pub fn new(capacity: usize, window: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            window,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, hash: String) {
        self.insert_at(hash, Instant::now());
    }

    fn insert_at(&mut self, hash: String, at: Instant) {
        if self.members.contains(&hash) {
            // Refresh: drop the old position so the window restarts.
            self.order.retain(|(h, _)| h != &hash);
        } else if self.order.len() == self.capacity {
            if let Some((oldest, _)) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        self.members.insert(hash.clone());
        self.order.push_back((hash, at));
    }

    pub fn is_duplicate(&self, hash: &str) -> bool {
        self.is_duplicate_at(hash, Instant::now())
    }

    fn is_duplicate_at(&self, hash: &str, now: Instant) -> bool {
        if !self.members.contains(hash) {
            return false;
        }
        self.order
            .iter()
            .find(|(h, _)| h == hash)
            .map(|(_, at)| now.saturating_duration_since(*at) < self.window)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Order-independent fingerprint of a set of selections.
pub fn fingerprint(selections: &[BetSelection]) -> String {
    let mut lines: Vec<String> = selections
        .iter()
        .map(|s| format!("{}|{}|{}", s.event_id, s.outcome_id, s.stake.normalize()))
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
