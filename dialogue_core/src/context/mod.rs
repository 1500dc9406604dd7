//! Dialogue Context - one conversation running over a [`Dialogue`].
//!
//! The context owns everything that changes while a conversation runs: the
//! active node cursor, the two option lists derived from it, the local
//! visit history and per-node runtime state (constructed texts, the speech
//! sequence cursor, the resolved child of a virtual parent). The graph
//! itself stays shared and untouched.
//!
//! ## Flow
//!
//! 1. [`start`](DialogueContext::start) validates and binds participants,
//!    then enters the first satisfied target of the start nodes.
//! 2. Entering a node records the visit (locally and in the ledger), fires
//!    its enter events and recomputes the options.
//! 3. [`choose_option`](DialogueContext::choose_option) hands the selection
//!    to the active node, which either advances internally (speech
//!    sequences) or enters the option's target.
//!
//! Mutating operations return a [`DialogueError`] and mark the dialogue as
//! ended on failure. Read accessors return empty values and log instead.

mod participants;
mod queries;
mod snapshot;
mod traversal;

pub use participants::*;
pub use snapshot::*;

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use dialogue_model::{
    DialogueParticipant, History, MemoryScope, NodeGuid, NodeIndex, ParticipantTag,
};

use crate::error::DialogueError;
use crate::graph::{Dialogue, Edge, EdgeData};
use crate::memory::DialogueMemory;

/// Per-node state that changes while the conversation runs.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeRuntime {
    /// Current line of a speech sequence.
    pub(crate) sequence_index: usize,
    /// Child a virtual parent resolved to on its last reevaluation.
    pub(crate) virtual_child: Option<NodeIndex>,
    /// Node text with its arguments filled in.
    pub(crate) constructed_text: Option<String>,
    /// Same for each speech sequence entry.
    pub(crate) constructed_entries: Vec<Option<String>>,
}

/// A conversation in progress.
///
/// Cloning yields an independent conversation sharing the same dialogue,
/// ledger and participants, with a copy of the cursor and history. The
/// clone gets a freshly seeded RNG, so its random selectors do not repeat
/// the picks of the original.
pub struct DialogueContext {
    dialogue: Arc<Dialogue>,
    memory: Arc<DialogueMemory>,

    /// Bound participants. The game owns them; dead entries count as missing.
    participants: HashMap<ParticipantTag, Weak<dyn DialogueParticipant>>,

    active_node_index: Option<NodeIndex>,

    /// Options currently satisfied.
    available_children: Vec<Edge>,

    /// Every option, tagged with its satisfaction.
    all_children: Vec<EdgeData>,

    /// Nodes visited during this conversation.
    history: History,

    node_runtime: HashMap<NodeIndex, NodeRuntime>,

    dialogue_ended: bool,

    rng: StdRng,
}

impl Clone for DialogueContext {
    fn clone(&self) -> Self {
        Self {
            dialogue: Arc::clone(&self.dialogue),
            memory: Arc::clone(&self.memory),
            participants: self.participants.clone(),
            active_node_index: self.active_node_index,
            available_children: self.available_children.clone(),
            all_children: self.all_children.clone(),
            history: self.history.clone(),
            node_runtime: self.node_runtime.clone(),
            dialogue_ended: self.dialogue_ended,
            rng: StdRng::from_entropy(),
        }
    }
}

impl std::fmt::Debug for DialogueContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogueContext")
            .field("dialogue", &self.dialogue.name())
            .field("participants", &self.participants.keys().collect::<Vec<_>>())
            .field("active_node_index", &self.active_node_index)
            .field("available_children", &self.available_children.len())
            .field("history", &self.history)
            .field("dialogue_ended", &self.dialogue_ended)
            .finish()
    }
}

impl DialogueContext {
    /// Create a context recording into the process-wide ledger.
    pub fn new(dialogue: Arc<Dialogue>) -> Self {
        Self::with_memory(dialogue, DialogueMemory::global())
    }

    /// Create a context recording into the given ledger.
    pub fn with_memory(dialogue: Arc<Dialogue>, memory: Arc<DialogueMemory>) -> Self {
        Self {
            dialogue,
            memory,
            participants: HashMap::new(),
            active_node_index: None,
            available_children: Vec::new(),
            all_children: Vec::new(),
            history: History::new(),
            node_runtime: HashMap::new(),
            dialogue_ended: false,
            rng: StdRng::from_entropy(),
        }
    }

    /// Make random selectors deterministic.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn dialogue(&self) -> &Arc<Dialogue> {
        &self.dialogue
    }

    pub fn memory(&self) -> &Arc<DialogueMemory> {
        &self.memory
    }

    /// Visit history of this conversation.
    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn has_dialogue_ended(&self) -> bool {
        self.dialogue_ended
    }

    pub fn active_node_index(&self) -> Option<NodeIndex> {
        self.active_node_index
    }

    /// A bound participant, if it is still alive.
    pub fn participant(&self, tag: &ParticipantTag) -> Option<Arc<dyn DialogueParticipant>> {
        self.participants.get(tag).and_then(Weak::upgrade)
    }

    /// Tags of the bound participants, sorted.
    pub fn participant_tags(&self) -> Vec<ParticipantTag> {
        let mut tags: Vec<_> = self.participants.keys().cloned().collect();
        tags.sort();
        tags
    }

    pub(crate) fn bind_participants(&mut self, participants: &ParticipantMap) {
        self.participants = participants
            .iter()
            .map(|(tag, participant)| (tag.clone(), Arc::downgrade(participant)))
            .collect();
    }

    /// Record a visit in the local history and the ledger.
    pub fn set_node_visited(&mut self, node_index: NodeIndex, node_guid: NodeGuid) {
        self.history.add(node_index, node_guid);
        self.memory.set_node_visited(self.dialogue.id(), node_index, node_guid);
    }

    /// Whether a node was visited, in this conversation or ever.
    pub fn is_node_visited(
        &self,
        node_index: NodeIndex,
        node_guid: NodeGuid,
        scope: MemoryScope,
    ) -> bool {
        match scope {
            MemoryScope::Local => self.history.contains(node_index, node_guid),
            MemoryScope::Global => {
                self.memory
                    .is_node_visited(self.dialogue.id(), node_index, node_guid)
            }
        }
    }

    /// Like [`is_node_visited`](Self::is_node_visited), looking the index up by GUID.
    pub fn is_node_guid_visited(&self, node_guid: NodeGuid, scope: MemoryScope) -> bool {
        match self.dialogue.node_index_for_guid(node_guid) {
            Some(index) => self.is_node_visited(index, node_guid, scope),
            None => {
                self.log_error(&format!("is_node_guid_visited - unknown node GUID {}", node_guid));
                false
            }
        }
    }

    /// Whether the node at `node_index` may be entered right now.
    pub fn is_node_enterable(
        &self,
        node_index: NodeIndex,
        already_visited: &HashSet<NodeIndex>,
    ) -> bool {
        match self.dialogue.node(node_index) {
            Some(node) => node.check_enter_conditions(self, node_index, already_visited.clone()),
            None => {
                self.log_error(&format!("is_node_enterable - invalid node index {}", node_index));
                false
            }
        }
    }

    pub fn is_valid_node_index(&self, node_index: NodeIndex) -> bool {
        self.dialogue.is_valid_node_index(node_index)
    }

    pub fn is_valid_node_guid(&self, node_guid: NodeGuid) -> bool {
        self.dialogue.is_valid_node_guid(node_guid)
    }

    pub fn node_guid_for_index(&self, node_index: NodeIndex) -> Option<NodeGuid> {
        self.dialogue.node_guid_for_index(node_index)
    }

    pub fn node_index_for_guid(&self, node_guid: NodeGuid) -> Option<NodeIndex> {
        self.dialogue.node_index_for_guid(node_guid)
    }

    /// Describes the conversation for diagnostics.
    pub fn context_string(&self) -> String {
        let active = self
            .active_node_index
            .map_or_else(|| "none".to_string(), |index| index.to_string());
        let participants: Vec<String> =
            self.participant_tags().iter().map(|t| t.to_string()).collect();
        format!(
            "Dialogue = `{}` ({}), ActiveNodeIndex = {}, Participants = `{}`",
            self.dialogue.name(),
            self.dialogue.id(),
            active,
            participants.join(", ")
        )
    }

    /// Log an error together with the context string.
    pub fn log_error(&self, message: &str) {
        tracing::error!(context = %self.context_string(), "{}", message);
    }

    /// Mark the dialogue as ended when a mutating operation failed.
    fn finish(
        &mut self,
        operation: &str,
        result: Result<(), DialogueError>,
    ) -> Result<(), DialogueError> {
        if let Err(error) = &result {
            self.log_error(&format!("{} - FAILED: {}", operation, error));
            self.dialogue_ended = true;
        }
        result
    }

    pub(crate) fn runtime(&self, node_index: NodeIndex) -> Option<&NodeRuntime> {
        self.node_runtime.get(&node_index)
    }

    pub(crate) fn runtime_mut(&mut self, node_index: NodeIndex) -> &mut NodeRuntime {
        self.node_runtime.entry(node_index).or_default()
    }
}
