//! Bounded set of recently processed ids

use std::collections::{HashSet, VecDeque};

/// Capacity used by the comment queue
pub const PROCESSED_ID_CAPACITY: usize = 1000;

/// Insertion-ordered id set that evicts its oldest entry once full
#[derive(Debug, Clone)]
pub struct RotatingIdSet {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl RotatingIdSet {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Insert `id`; returns `false` if it was already present
    pub fn insert(&mut self, id: &str) -> bool {
        if self.members.contains(id) {
            return false;
        }
        self.order.push_back(id.to_string());
        self.members.insert(id.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}

impl Default for RotatingIdSet {
    fn default() -> Self {
        Self::new(PROCESSED_ID_CAPACITY)
    }
}
