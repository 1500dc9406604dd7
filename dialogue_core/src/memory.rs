//! The visited-node ledger shared by every context in the process.
//!
//! Entries are keyed by dialogue identity. Each entry keeps a [`History`]
//! of globally visited nodes plus small per-node records used by random
//! selectors. Updates only ever add to a history, so contexts running
//! side by side can interleave writes freely.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use dialogue_model::{DialogueId, History, NodeGuid, NodeIndex};

/// Per-node bookkeeping that outlives a single conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSavedData {
    /// Children already picked in the current selection cycle.
    pub picked_targets: BTreeSet<NodeGuid>,
    /// The child picked last time.
    pub last_pick: Option<NodeGuid>,
}

/// Everything remembered about one dialogue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub history: History,
    pub node_data: BTreeMap<NodeGuid, NodeSavedData>,
}

/// Process-wide record of visited nodes.
///
/// Use [`DialogueMemory::global`] for the shared instance, or create a
/// private one (tests, sandboxed previews) and hand it to a context.
#[derive(Debug, Default)]
pub struct DialogueMemory {
    entries: RwLock<HashMap<DialogueId, MemoryEntry>>,
}

static GLOBAL_MEMORY: OnceLock<Arc<DialogueMemory>> = OnceLock::new();

impl DialogueMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared process-wide ledger, created on first access.
    pub fn global() -> Arc<DialogueMemory> {
        GLOBAL_MEMORY.get_or_init(|| Arc::new(DialogueMemory::new())).clone()
    }

    /// Record a visit. Repeating it is a no-op.
    pub fn set_node_visited(
        &self,
        dialogue: DialogueId,
        node_index: NodeIndex,
        node_guid: NodeGuid,
    ) {
        self.entries
            .write()
            .entry(dialogue)
            .or_default()
            .history
            .add(node_index, node_guid);
    }

    /// Whether the node was ever visited, preferring the GUID for the lookup.
    pub fn is_node_visited(
        &self,
        dialogue: DialogueId,
        node_index: NodeIndex,
        node_guid: NodeGuid,
    ) -> bool {
        self.entries
            .read()
            .get(&dialogue)
            .is_some_and(|entry| entry.history.contains(node_index, node_guid))
    }

    /// Copy of the global history of a dialogue.
    pub fn history(&self, dialogue: DialogueId) -> Option<History> {
        self.entries.read().get(&dialogue).map(|entry| entry.history.clone())
    }

    /// Replace the global history of a dialogue.
    pub fn set_history(&self, dialogue: DialogueId, history: History) {
        self.entries.write().entry(dialogue).or_default().history = history;
    }

    /// Snapshot of the whole ledger, e.g. for a save game.
    pub fn export(&self) -> BTreeMap<DialogueId, MemoryEntry> {
        self.entries
            .read()
            .iter()
            .map(|(id, entry)| (*id, entry.clone()))
            .collect()
    }

    /// Replace the whole ledger with saved data.
    pub fn import(&self, saved: BTreeMap<DialogueId, MemoryEntry>) {
        let mut entries = self.entries.write();
        entries.clear();
        entries.extend(saved);
    }

    /// Forget everything.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Forget everything about one dialogue.
    pub fn clear_dialogue(&self, dialogue: DialogueId) {
        self.entries.write().remove(&dialogue);
    }

    /// Saved data of a node, default if nothing was recorded.
    pub fn node_saved_data(&self, dialogue: DialogueId, node_guid: NodeGuid) -> NodeSavedData {
        self.entries
            .read()
            .get(&dialogue)
            .and_then(|entry| entry.node_data.get(&node_guid))
            .cloned()
            .unwrap_or_default()
    }

    /// Modify the saved data of a node in place.
    pub fn update_node_saved_data<F>(&self, dialogue: DialogueId, node_guid: NodeGuid, update: F)
    where
        F: FnOnce(&mut NodeSavedData),
    {
        let mut entries = self.entries.write();
        let data = entries
            .entry(dialogue)
            .or_default()
            .node_data
            .entry(node_guid)
            .or_default();
        update(data);
    }
}
