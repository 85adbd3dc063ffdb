//! Bounded memory of recently seen keys
//!
//! Used for inbound event ids (duplicate suppression) and for each
//! participant's finished trade ids.

use crate::types::EventId;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

/// Remembers the most recent `capacity` keys; inserting past that forgets
/// the oldest.
#[derive(Debug)]
pub struct RecentSet<T> {
    capacity: usize,
    order: VecDeque<T>,
    members: HashSet<T>,
}

/// Recent event ids, so a replayed occurrence is never dispatched twice
pub type SeenEvents = RecentSet<EventId>;

impl<T: Eq + Hash + Clone> RecentSet<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Record `key`; false if it is already in the window
    pub fn insert(&mut self, key: T) -> bool {
        if !self.members.insert(key.clone()) {
            return false;
        }

        self.order.push_back(key);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        true
    }

    pub fn contains(&self, key: &T) -> bool {
        self.members.contains(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
