//! Visit history - which nodes of a dialogue have been entered.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::ids::{NodeGuid, NodeIndex};

/// Which visit record a query looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MemoryScope {
    /// The history of the current conversation only.
    Local,
    /// Everything ever recorded for the dialogue in this process.
    #[default]
    Global,
}

/// Append-only record of visited nodes.
///
/// Keyed by node index, each index keeps every GUID it was visited with, so
/// the record survives index remapping after graph edits: lookups prefer the
/// GUID and only fall back to the index for nil GUIDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    visited: BTreeMap<NodeIndex, BTreeSet<NodeGuid>>,
}

impl History {
    /// Create a new empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a visit. Repeating a visit is a no-op.
    pub fn add(&mut self, node_index: NodeIndex, node_guid: NodeGuid) {
        let guids = self.visited.entry(node_index).or_default();
        if node_guid.is_valid() {
            guids.insert(node_guid);
        }
    }

    /// Whether the node was visited.
    pub fn contains(&self, node_index: NodeIndex, node_guid: NodeGuid) -> bool {
        if node_guid.is_valid() {
            return self.contains_guid(node_guid);
        }
        self.contains_index(node_index)
    }

    /// Whether a node with this GUID was visited, at any index.
    pub fn contains_guid(&self, node_guid: NodeGuid) -> bool {
        self.visited.values().any(|guids| guids.contains(&node_guid))
    }

    /// Whether any node was visited at this index.
    pub fn contains_index(&self, node_index: NodeIndex) -> bool {
        self.visited.contains_key(&node_index)
    }

    /// Merge another history into this one.
    pub fn merge(&mut self, other: &History) {
        for (index, guids) in &other.visited {
            self.visited
                .entry(*index)
                .or_default()
                .extend(guids.iter().copied());
        }
    }

    /// Visited node indices in ascending order.
    pub fn visited_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.visited.keys().copied()
    }

    /// GUIDs recorded for a node index.
    pub fn guids_for_index(&self, node_index: NodeIndex) -> impl Iterator<Item = &NodeGuid> {
        self.visited.get(&node_index).into_iter().flatten()
    }

    /// Number of distinct visited indices.
    pub fn len(&self) -> usize {
        self.visited.len()
    }

    /// Whether nothing was visited yet.
    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }

    /// Forget every visit.
    pub fn clear(&mut self) {
        self.visited.clear();
    }
}
