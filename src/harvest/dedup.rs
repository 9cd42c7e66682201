// src/harvest/dedup.rs
use std::collections::HashSet;

use crate::harvest::types::ContactRecord;

/// First-seen-wins contact aggregate, kept in insertion order.
///
/// Which duplicate's fields survive depends on processing order (the first
/// source that yields an id owns its snapshot); the set of ids does not.
#[derive(Debug, Default)]
pub struct ContactSet {
    seen: HashSet<String>,
    contacts: Vec<ContactRecord>,
}

impl ContactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unseen records; returns the ones that were actually added.
    pub fn merge(&mut self, batch: &[ContactRecord]) -> Vec<ContactRecord> {
        let mut added = Vec::new();
        for c in batch {
            if self.seen.insert(c.id.clone()) {
                self.contacts.push(c.clone());
                added.push(c.clone());
            }
        }
        added
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn as_slice(&self) -> &[ContactRecord] {
        &self.contacts
    }

    pub fn into_vec(self) -> Vec<ContactRecord> {
        self.contacts
    }
}
