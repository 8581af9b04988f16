//! Id-level diffs between item sets.
//!
//! Used to report what a refresh changed relative to the previous snapshot
//! and to find index entries that no longer exist upstream.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{Document, RawItem};

/// Ids added, updated and removed between two item sets. Sorted.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
}

impl DiffResult {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.updated.is_empty() || !self.removed.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }
}

/// Calculator for computing diffs between snapshots.
#[derive(Debug, Clone, Default)]
pub struct DiffCalculator;

impl DiffCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn calculate(&self, previous: &[RawItem], current: &[RawItem]) -> DiffResult {
        let prev_map: BTreeMap<&str, &RawItem> =
            previous.iter().map(|i| (i.id.as_str(), i)).collect();
        let curr_map: BTreeMap<&str, &RawItem> =
            current.iter().map(|i| (i.id.as_str(), i)).collect();

        let added = curr_map
            .keys()
            .filter(|id| !prev_map.contains_key(*id))
            .map(|id| id.to_string())
            .collect();

        let removed = prev_map
            .keys()
            .filter(|id| !curr_map.contains_key(*id))
            .map(|id| id.to_string())
            .collect();

        let updated = curr_map
            .iter()
            .filter(|(id, curr)| prev_map.get(*id).is_some_and(|prev| prev != *curr))
            .map(|(id, _)| id.to_string())
            .collect();

        DiffResult {
            added,
            updated,
            removed,
        }
    }
}

/// Convenience function to calculate diff.
pub fn calculate_diff(previous: &[RawItem], current: &[RawItem]) -> DiffResult {
    DiffCalculator::new().calculate(previous, current)
}

/// Indexed ids with no counterpart among `current`, sorted.
pub fn orphan_ids(indexed: &[String], current: &[Document]) -> Vec<String> {
    let live: HashSet<&str> = current.iter().map(|d| d.id.as_str()).collect();
    indexed
        .iter()
        .filter(|id| !live.contains(id.as_str()))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
