//! Nodes - the steps of a dialogue graph.
//!
//! A node is shared, immutable data. Everything that changes while a
//! conversation runs (constructed texts, the speech sequence cursor, the
//! option lists) lives in the [`DialogueContext`].

use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use dialogue_model::{AssetRef, MemoryScope, NodeGuid, NodeIndex, ParticipantTag};

use super::{Condition, Edge, Event, TextArgument};
use crate::context::DialogueContext;

/// How often a node may be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnterRestriction {
    #[default]
    Unlimited,
    /// Once per conversation, checked against the local history.
    OncePerContext,
    /// Once across every conversation, checked against the global ledger.
    OnceEver,
}

/// Text and presentation data of a line.
#[derive(Debug, Clone, Default)]
pub struct SpeechContent {
    pub text: String,
    pub text_arguments: Vec<TextArgument>,
    pub speaker_state: Option<String>,
    pub voice: Option<AssetRef>,
    pub generic_data: Option<AssetRef>,
    /// Designer payload handed back untouched.
    pub node_data: Option<Value>,
}

impl SpeechContent {
    pub fn new(text: impl Into<String>) -> Self {
        let mut content = Self {
            text: text.into(),
            ..Default::default()
        };
        TextArgument::sync_with_text(&content.text, &mut content.text_arguments);
        content
    }

    fn associated_participants(&self) -> impl Iterator<Item = ParticipantTag> + '_ {
        self.text_arguments
            .iter()
            .map(|a| a.participant.clone())
            .filter(ParticipantTag::is_valid)
    }
}

/// A plain line of dialogue.
#[derive(Debug, Clone, Default)]
pub struct SpeechNode {
    pub content: SpeechContent,

    /// Forward to the first satisfied child instead of showing own options.
    pub is_virtual_parent: bool,

    /// Whether entering a virtual parent also fires the enter events of the
    /// child it resolved to.
    pub virtual_parent_fire_direct_child_enter_events: bool,
}

/// One line of a speech sequence.
#[derive(Debug, Clone, Default)]
pub struct SpeechSequenceEntry {
    /// Who says the line. Empty means the node owner.
    pub speaker: ParticipantTag,
    pub content: SpeechContent,
    /// Text of the continue option shown while this line is active.
    pub edge_text: String,
}

impl SpeechSequenceEntry {
    pub fn new(speaker: ParticipantTag, text: impl Into<String>) -> Self {
        Self {
            speaker,
            content: SpeechContent::new(text),
            edge_text: String::new(),
        }
    }

    pub fn with_edge_text(mut self, text: impl Into<String>) -> Self {
        self.edge_text = text.into();
        self
    }

    pub fn with_speaker_state(mut self, state: impl Into<String>) -> Self {
        self.content.speaker_state = Some(state.into());
        self
    }

    pub fn with_voice(mut self, voice: AssetRef) -> Self {
        self.content.voice = Some(voice);
        self
    }

    pub fn with_text_argument(mut self, argument: TextArgument) -> Self {
        TextArgument::upsert(&mut self.content.text_arguments, argument);
        self
    }
}

/// Lines spoken one after another before the real options show up.
#[derive(Debug, Clone, Default)]
pub struct SpeechSequenceNode {
    pub entries: Vec<SpeechSequenceEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectorMode {
    /// Enter the first satisfied child.
    #[default]
    First,
    /// Enter a random satisfied child.
    Random,
}

/// Picks a child without asking the player.
#[derive(Debug, Clone, Default)]
pub struct SelectorNode {
    pub mode: SelectorMode,
    pub avoid_picking_same_option_twice_in_a_row: bool,
    pub cycle_through_satisfied_options_without_repetition: bool,
}

/// Stands in for another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyNode {
    pub target: NodeIndex,
}

/// Game specific node behaviour.
pub trait CustomNode: Debug + Send + Sync {
    fn text(&self) -> &str {
        ""
    }

    fn speaker_state(&self) -> Option<&str> {
        None
    }

    /// Called on entry, after the enter events fired.
    fn on_enter(&self, _context: &DialogueContext) {}
}

/// The node variants.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Entry point; only valid as a start node.
    Root,
    Speech(SpeechNode),
    SpeechSequence(SpeechSequenceNode),
    Selector(SelectorNode),
    Proxy(ProxyNode),
    End(SpeechContent),
    Custom(Arc<dyn CustomNode>),
}

/// A node of the dialogue graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// Durable identity. Nil GUIDs are replaced when the dialogue is built.
    pub guid: NodeGuid,

    /// Participant speaking this node.
    pub owner: ParticipantTag,

    /// Outgoing edges, in priority order.
    pub children: Vec<Edge>,

    pub enter_conditions: Vec<Condition>,
    pub enter_restriction: EnterRestriction,

    /// Fired on every entry, never during reevaluation.
    pub enter_events: Vec<Event>,

    /// Whether the node needs a satisfied child to be enterable.
    pub check_children_on_evaluation: bool,

    pub kind: NodeKind,
}

impl Node {
    fn with_kind(owner: ParticipantTag, kind: NodeKind) -> Self {
        Self {
            guid: NodeGuid::nil(),
            owner,
            children: Vec::new(),
            enter_conditions: Vec::new(),
            enter_restriction: EnterRestriction::Unlimited,
            enter_events: Vec::new(),
            check_children_on_evaluation: false,
            kind,
        }
    }

    /// A start node.
    pub fn root() -> Self {
        Self::with_kind(ParticipantTag::none(), NodeKind::Root)
    }

    pub fn speech(owner: ParticipantTag, text: impl Into<String>) -> Self {
        Self::with_kind(
            owner,
            NodeKind::Speech(SpeechNode {
                content: SpeechContent::new(text),
                ..Default::default()
            }),
        )
    }

    /// A speech node that forwards to its first satisfied child.
    pub fn virtual_parent(owner: ParticipantTag, text: impl Into<String>) -> Self {
        Self::with_kind(
            owner,
            NodeKind::Speech(SpeechNode {
                content: SpeechContent::new(text),
                is_virtual_parent: true,
                virtual_parent_fire_direct_child_enter_events: false,
            }),
        )
    }

    pub fn speech_sequence(owner: ParticipantTag, entries: Vec<SpeechSequenceEntry>) -> Self {
        Self::with_kind(owner, NodeKind::SpeechSequence(SpeechSequenceNode { entries }))
    }

    /// Selectors only make sense with a satisfied child, so they check
    /// children on evaluation.
    pub fn selector(owner: ParticipantTag, mode: SelectorMode) -> Self {
        let mut node = Self::with_kind(
            owner,
            NodeKind::Selector(SelectorNode {
                mode,
                ..Default::default()
            }),
        );
        node.check_children_on_evaluation = true;
        node
    }

    pub fn proxy(owner: ParticipantTag, target: NodeIndex) -> Self {
        Self::with_kind(owner, NodeKind::Proxy(ProxyNode { target }))
    }

    pub fn end(owner: ParticipantTag, text: impl Into<String>) -> Self {
        Self::with_kind(owner, NodeKind::End(SpeechContent::new(text)))
    }

    pub fn custom(owner: ParticipantTag, behaviour: Arc<dyn CustomNode>) -> Self {
        Self::with_kind(owner, NodeKind::Custom(behaviour))
    }

    pub fn with_guid(mut self, guid: NodeGuid) -> Self {
        self.guid = guid;
        self
    }

    pub fn with_child(mut self, edge: Edge) -> Self {
        self.children.push(edge);
        self
    }

    pub fn with_children(mut self, edges: impl IntoIterator<Item = Edge>) -> Self {
        self.children.extend(edges);
        self
    }

    pub fn with_enter_condition(mut self, condition: Condition) -> Self {
        self.enter_conditions.push(condition);
        self
    }

    pub fn with_enter_event(mut self, event: Event) -> Self {
        self.enter_events.push(event);
        self
    }

    pub fn with_enter_restriction(mut self, restriction: EnterRestriction) -> Self {
        self.enter_restriction = restriction;
        self
    }

    pub fn with_check_children_on_evaluation(mut self, check: bool) -> Self {
        self.check_children_on_evaluation = check;
        self
    }

    /// Fire the enter events of the resolved child when entering a virtual parent.
    pub fn with_direct_child_enter_events(mut self) -> Self {
        if let NodeKind::Speech(speech) = &mut self.kind {
            speech.virtual_parent_fire_direct_child_enter_events = true;
        }
        self
    }

    pub fn with_selector_options(
        mut self,
        avoid_repeat: bool,
        cycle_without_repetition: bool,
    ) -> Self {
        if let NodeKind::Selector(selector) = &mut self.kind {
            selector.avoid_picking_same_option_twice_in_a_row = avoid_repeat;
            selector.cycle_through_satisfied_options_without_repetition = cycle_without_repetition;
        }
        self
    }

    pub fn with_speaker_state(mut self, state: impl Into<String>) -> Self {
        if let Some(content) = self.content_mut() {
            content.speaker_state = Some(state.into());
        }
        self
    }

    pub fn with_voice(mut self, voice: AssetRef) -> Self {
        if let Some(content) = self.content_mut() {
            content.voice = Some(voice);
        }
        self
    }

    pub fn with_generic_data(mut self, data: AssetRef) -> Self {
        if let Some(content) = self.content_mut() {
            content.generic_data = Some(data);
        }
        self
    }

    pub fn with_node_data(mut self, data: Value) -> Self {
        if let Some(content) = self.content_mut() {
            content.node_data = Some(data);
        }
        self
    }

    pub fn with_text_argument(mut self, argument: TextArgument) -> Self {
        if let Some(content) = self.content_mut() {
            TextArgument::upsert(&mut content.text_arguments, argument);
        }
        self
    }

    /// Speech content of speech and end nodes.
    pub fn content(&self) -> Option<&SpeechContent> {
        match &self.kind {
            NodeKind::Speech(speech) => Some(&speech.content),
            NodeKind::End(content) => Some(content),
            _ => None,
        }
    }

    fn content_mut(&mut self) -> Option<&mut SpeechContent> {
        match &mut self.kind {
            NodeKind::Speech(speech) => Some(&mut speech.content),
            NodeKind::End(content) => Some(content),
            _ => None,
        }
    }

    /// Entries of a speech sequence, empty for other kinds.
    pub fn sequence_entries(&self) -> &[SpeechSequenceEntry] {
        match &self.kind {
            NodeKind::SpeechSequence(sequence) => &sequence.entries,
            _ => &[],
        }
    }

    /// Raw authored text.
    pub fn text(&self) -> &str {
        match &self.kind {
            NodeKind::Custom(custom) => custom.text(),
            _ => self.content().map(|c| c.text.as_str()).unwrap_or(""),
        }
    }

    pub fn is_virtual_parent(&self) -> bool {
        matches!(&self.kind, NodeKind::Speech(speech) if speech.is_virtual_parent)
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, NodeKind::End(_))
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, NodeKind::Root)
    }

    pub fn is_speech_sequence(&self) -> bool {
        matches!(self.kind, NodeKind::SpeechSequence(_))
    }

    /// Whether the node at `index` may be entered right now.
    ///
    /// `already_visited` holds the nodes resolved so far on this branch. It is
    /// taken by value: every branch works on its own copy.
    pub fn check_enter_conditions(
        &self,
        context: &DialogueContext,
        index: NodeIndex,
        mut already_visited: HashSet<NodeIndex>,
    ) -> bool {
        let cyclic = !already_visited.insert(index);

        if !Condition::all_satisfied(&self.enter_conditions, context, &already_visited) {
            return false;
        }

        let restricted = match self.enter_restriction {
            EnterRestriction::Unlimited => false,
            EnterRestriction::OncePerContext => {
                context.is_node_visited(index, self.guid, MemoryScope::Local)
            }
            EnterRestriction::OnceEver => {
                context.is_node_visited(index, self.guid, MemoryScope::Global)
            }
        };
        if restricted {
            return false;
        }

        if let NodeKind::Proxy(proxy) = &self.kind {
            return !cyclic && context.is_node_enterable(proxy.target, &already_visited);
        }

        if self.check_children_on_evaluation {
            // Still being resolved further up this branch
            if cyclic {
                return false;
            }
            return self.has_any_satisfied_child(context, &already_visited);
        }

        true
    }

    /// Whether at least one child edge is satisfied.
    pub fn has_any_satisfied_child(
        &self,
        context: &DialogueContext,
        already_visited: &HashSet<NodeIndex>,
    ) -> bool {
        if let NodeKind::Proxy(proxy) = &self.kind {
            let mut branch = already_visited.clone();
            return branch.insert(proxy.target)
                && context
                    .dialogue()
                    .node(proxy.target)
                    .is_some_and(|target| target.has_any_satisfied_child(context, &branch));
        }

        self.children
            .iter()
            .any(|edge| edge.evaluate(context, already_visited))
    }

    /// Participants this node refers to: owner, speakers, conditions, events
    /// and text arguments.
    pub(crate) fn associated_participants(&self) -> Vec<ParticipantTag> {
        let mut tags = Vec::new();
        if self.owner.is_valid() {
            tags.push(self.owner.clone());
        }
        tags.extend(self.enter_conditions.iter().flat_map(Condition::associated_participants));
        tags.extend(
            self.enter_events
                .iter()
                .map(|e| e.participant.clone())
                .filter(ParticipantTag::is_valid),
        );
        tags.extend(self.children.iter().flat_map(Edge::associated_participants));
        if let Some(content) = self.content() {
            tags.extend(content.associated_participants());
        }
        for entry in self.sequence_entries() {
            if entry.speaker.is_valid() {
                tags.push(entry.speaker.clone());
            }
            tags.extend(entry.content.associated_participants());
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_content_syncs_arguments() {
        let node = Node::speech(ParticipantTag::new("Dlg.Guard"), "Halt, {Name}!");
        let content = node.content().unwrap();
        assert_eq!(content.text_arguments.len(), 1);
        assert_eq!(content.text_arguments[0].display_string, "Name");
        assert_eq!(node.text(), "Halt, {Name}!");
    }

    #[test]
    fn test_builders_apply_to_matching_kind_only() {
        let owner = ParticipantTag::new("Dlg.Guard");
        let selector = Node::selector(owner.clone(), SelectorMode::Random)
            .with_selector_options(true, false)
            .with_speaker_state("angry");

        match &selector.kind {
            NodeKind::Selector(s) => assert!(s.avoid_picking_same_option_twice_in_a_row),
            other => panic!("unexpected kind {:?}", other),
        }
        assert!(selector.check_children_on_evaluation);
        assert!(selector.content().is_none());

        let end = Node::end(owner, "Farewell.").with_speaker_state("calm");
        assert_eq!(end.content().unwrap().speaker_state.as_deref(), Some("calm"));
        assert!(end.is_end());
    }

    #[test]
    fn test_associated_participants() {
        let guard = ParticipantTag::new("Dlg.Guard");
        let hero = ParticipantTag::new("Dlg.Hero");
        let merchant = ParticipantTag::new("Dlg.Merchant");

        let node = Node::speech_sequence(
            guard.clone(),
            vec![
                SpeechSequenceEntry::new(hero.clone(), "Hello."),
                SpeechSequenceEntry::new(ParticipantTag::none(), "Move along."),
            ],
        )
        .with_enter_event(Event::notify(merchant.clone(), "seen"));

        let tags = node.associated_participants();
        assert!(tags.contains(&guard));
        assert!(tags.contains(&hero));
        assert!(tags.contains(&merchant));
        assert!(!tags.contains(&ParticipantTag::none()));
    }
}
