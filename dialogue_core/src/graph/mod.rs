//! The authored dialogue graph.
//!
//! A [`Dialogue`] is built once through [`DialogueBuilder`] and then shared
//! read-only (`Arc<Dialogue>`) by every context running it.

mod condition;
mod edge;
mod event;
mod node;
mod text_argument;

pub use condition::*;
pub use edge::*;
pub use event::*;
pub use node::*;
pub use text_argument::*;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use dialogue_model::{DialogueId, DialogueSettings, NodeGuid, NodeIndex, ParticipantTag};

use crate::error::DialogueError;

/// An immutable dialogue graph.
#[derive(Debug)]
pub struct Dialogue {
    id: DialogueId,
    name: String,

    /// Every participant tag the dialogue needs bound.
    participants: BTreeSet<ParticipantTag>,

    /// Entry points, tried in order.
    start_nodes: Vec<Node>,

    nodes: Vec<Node>,

    /// Reverse lookup: GUID -> node index.
    guid_index: HashMap<NodeGuid, NodeIndex>,
}

impl Dialogue {
    /// Start building a dialogue.
    pub fn builder(name: impl Into<String>) -> DialogueBuilder {
        DialogueBuilder::new(name)
    }

    pub fn id(&self) -> DialogueId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn participants(&self) -> &BTreeSet<ParticipantTag> {
        &self.participants
    }

    pub fn start_nodes(&self) -> &[Node] {
        &self.start_nodes
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_valid_node_index(&self, index: NodeIndex) -> bool {
        index < self.nodes.len()
    }

    pub fn is_valid_node_guid(&self, guid: NodeGuid) -> bool {
        self.guid_index.contains_key(&guid)
    }

    pub fn node_index_for_guid(&self, guid: NodeGuid) -> Option<NodeIndex> {
        self.guid_index.get(&guid).copied()
    }

    pub fn node_guid_for_index(&self, index: NodeIndex) -> Option<NodeGuid> {
        self.nodes.get(index).map(|node| node.guid)
    }
}

/// Assembles and validates a [`Dialogue`].
#[derive(Debug)]
pub struct DialogueBuilder {
    id: DialogueId,
    name: String,
    settings: DialogueSettings,
    participants: BTreeSet<ParticipantTag>,
    start_nodes: Vec<Node>,
    nodes: Vec<Node>,
}

impl DialogueBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: DialogueId::new(),
            name: name.into(),
            settings: DialogueSettings::default(),
            participants: BTreeSet::new(),
            start_nodes: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Use a fixed identity, e.g. to match ledger data saved earlier.
    pub fn with_id(mut self, id: DialogueId) -> Self {
        self.id = id;
        self
    }

    pub fn with_settings(mut self, settings: DialogueSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Require a participant that no node refers to.
    pub fn with_participant(mut self, tag: ParticipantTag) -> Self {
        self.participants.insert(tag);
        self
    }

    /// Append a node and return its index.
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Append a start node (see [`Node::root`]).
    pub fn add_start_node(&mut self, node: Node) -> &mut Self {
        self.start_nodes.push(node);
        self
    }

    /// Validate the graph and freeze it.
    pub fn build(self) -> Result<Arc<Dialogue>, DialogueError> {
        let DialogueBuilder {
            id,
            name,
            settings,
            mut participants,
            mut start_nodes,
            mut nodes,
        } = self;

        if let Some(position) = start_nodes.iter().position(|node| !node.is_root()) {
            return Err(DialogueError::InvalidStartNode(position));
        }
        if let Some(index) = nodes.iter().position(Node::is_root) {
            return Err(DialogueError::MisplacedRootNode(index));
        }

        let mut seen_guids = HashSet::new();
        for node in start_nodes.iter_mut().chain(nodes.iter_mut()) {
            if !node.guid.is_valid() {
                node.guid = NodeGuid::new();
            }
            if !seen_guids.insert(node.guid) {
                return Err(DialogueError::DuplicateNodeGuid(node.guid));
            }
        }

        let node_count = nodes.len();
        for node in start_nodes.iter().chain(nodes.iter()) {
            let proxy_target = match &node.kind {
                NodeKind::Proxy(proxy) => Some(proxy.target),
                _ => None,
            };
            let targets = node.children.iter().filter_map(|edge| edge.target_index);
            if let Some(target) = targets.chain(proxy_target).find(|t| *t >= node_count) {
                return Err(DialogueError::InvalidEdgeTarget {
                    node: node.guid,
                    target,
                });
            }
        }

        let end_nodes: HashSet<NodeIndex> = nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_end())
            .map(|(index, _)| index)
            .collect();
        for node in nodes.iter_mut() {
            apply_default_texts(node, &settings, &end_nodes);
        }

        for node in start_nodes.iter().chain(nodes.iter()) {
            participants.extend(node.associated_participants());
        }

        let guid_index = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.guid, index))
            .collect();

        tracing::debug!(
            dialogue = %name,
            nodes = node_count,
            participants = participants.len(),
            "Built dialogue"
        );

        Ok(Arc::new(Dialogue {
            id,
            name,
            participants,
            start_nodes,
            nodes,
            guid_index,
        }))
    }
}

/// Fill empty option texts. Edges of nodes that never show their options
/// (virtual parents, selectors, proxies) are left alone.
fn apply_default_texts(
    node: &mut Node,
    settings: &DialogueSettings,
    end_nodes: &HashSet<NodeIndex>,
) {
    if let NodeKind::SpeechSequence(sequence) = &mut node.kind {
        for entry in sequence.entries.iter_mut().filter(|e| e.edge_text.is_empty()) {
            entry.edge_text = settings.default_speech_sequence_edge_text.clone();
        }
    }

    let shows_options = match &node.kind {
        NodeKind::Speech(speech) => !speech.is_virtual_parent,
        NodeKind::SpeechSequence(_) | NodeKind::Custom(_) => true,
        _ => false,
    };
    if !settings.set_default_edge_texts || !shows_options {
        return;
    }

    for (position, edge) in node.children.iter_mut().enumerate() {
        let beyond_first = settings.default_edge_text_on_first_child_only && position > 0;
        if !edge.text.is_empty() || beyond_first {
            continue;
        }
        let leads_to_end = edge.target_index.is_some_and(|t| end_nodes.contains(&t));
        let text = if leads_to_end {
            &settings.default_edge_text_to_end_node
        } else {
            &settings.default_edge_text_to_normal_node
        };
        *edge = edge.clone().with_text(text.clone());
    }
}
