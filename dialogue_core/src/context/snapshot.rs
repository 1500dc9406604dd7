//! Replication and save-game surface of a context.
//!
//! The context never transports anything itself. It can describe its
//! visible state as a serializable [`ContextSnapshot`] and be restarted from
//! a [`ResumePoint`] on the other side.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use dialogue_model::{DialogueId, DialogueParticipant, History, NodeGuid, NodeIndex, ParticipantTag};

use super::{participants_from_list, validate_participants, DialogueContext, ParticipantMap};
use crate::error::DialogueError;

/// Where and how to resume a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePoint {
    pub node_index: Option<NodeIndex>,
    /// Takes priority over `node_index` when set.
    pub node_guid: Option<NodeGuid>,
    /// Local history to continue with.
    pub history: History,
    /// Enter the node, or only make it active and list its options.
    pub enter_node: bool,
    /// Fire enter events when entering. Replicas skip them since the
    /// authority already fired them.
    pub fire_enter_events: bool,
}

impl ResumePoint {
    pub fn at_index(node_index: NodeIndex) -> Self {
        Self {
            node_index: Some(node_index),
            node_guid: None,
            history: History::new(),
            enter_node: true,
            fire_enter_events: true,
        }
    }

    pub fn at_guid(node_guid: NodeGuid) -> Self {
        Self {
            node_index: None,
            node_guid: Some(node_guid),
            history: History::new(),
            enter_node: true,
            fire_enter_events: true,
        }
    }

    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    pub fn without_enter_events(mut self) -> Self {
        self.fire_enter_events = false;
        self
    }

    pub fn without_entering(mut self) -> Self {
        self.enter_node = false;
        self
    }
}

/// Serializable view of a running conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub dialogue_id: DialogueId,
    pub dialogue_name: String,
    pub active_node_index: Option<NodeIndex>,
    pub active_node_guid: Option<NodeGuid>,
    /// Current line when the active node is a speech sequence.
    pub speech_sequence_index: Option<usize>,
    pub history: History,
    pub participants: Vec<ParticipantTag>,
    pub dialogue_ended: bool,
}

impl ContextSnapshot {
    /// Resume at the snapshot's node without firing enter events again.
    pub fn resume_point(&self) -> Option<ResumePoint> {
        if self.active_node_index.is_none() && self.active_node_guid.is_none() {
            return None;
        }
        Some(ResumePoint {
            node_index: self.active_node_index,
            node_guid: self.active_node_guid,
            history: self.history.clone(),
            enter_node: true,
            fire_enter_events: false,
        })
    }
}

impl DialogueContext {
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            dialogue_id: self.dialogue.id(),
            dialogue_name: self.dialogue.name().to_string(),
            active_node_index: self.active_node_index,
            active_node_guid: self
                .active_node_index
                .and_then(|index| self.dialogue.node_guid_for_index(index)),
            speech_sequence_index: self.active_speech_sequence_index(),
            history: self.history.clone(),
            participants: self.participant_tags(),
            dialogue_ended: self.dialogue_ended,
        }
    }

    /// The live participants as a flat list, for replication.
    pub fn flattened_participants(&self) -> Vec<Arc<dyn DialogueParticipant>> {
        let mut participants: Vec<_> =
            self.participants.values().filter_map(|p| p.upgrade()).collect();
        participants.sort_by_key(|p| p.participant_tag());
        participants
    }

    /// Rebind from a replicated flat list. Each object is keyed by its own tag.
    ///
    /// The list must cover every participant the dialogue requires; on
    /// failure the current bindings stay as they are.
    pub fn rebind_participants(
        &mut self,
        list: &[Arc<dyn DialogueParticipant>],
    ) -> Result<(), DialogueError> {
        let map: ParticipantMap = participants_from_list(&self.dialogue, list)?;
        validate_participants(&self.context_string(), &self.dialogue, &map, true)?;
        self.bind_participants(&map);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Dialogue, Edge, Event, Node};
    use crate::test_support::{bind, guard_tag, hero_tag, simple_dialogue, TestParticipant};

    #[test]
    fn test_snapshot_describes_visible_state() {
        let (dialogue, hero_tag, guard_tag) = simple_dialogue();
        let participants = bind(&[
            TestParticipant::new(hero_tag.clone(), "Ayla"),
            TestParticipant::new(guard_tag.clone(), "Brom"),
        ]);
        let mut context = DialogueContext::with_memory(dialogue.clone(), Default::default());
        context.start(&participants).unwrap();

        let snapshot = context.snapshot();
        assert_eq!(snapshot.dialogue_id, dialogue.id());
        assert_eq!(snapshot.active_node_index, Some(0));
        assert_eq!(snapshot.active_node_guid, dialogue.node_guid_for_index(0));
        assert_eq!(snapshot.speech_sequence_index, None);
        assert_eq!(snapshot.participants, vec![guard_tag, hero_tag]);
        assert!(!snapshot.dialogue_ended);

        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: ContextSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_replica_resumes_from_snapshot() {
        let (dialogue, hero_tag, guard_tag) = simple_dialogue();
        let hero = TestParticipant::new(hero_tag, "Ayla");
        let guard = TestParticipant::new(guard_tag, "Brom");
        let participants = bind(&[hero.clone(), guard.clone()]);

        let mut authority = DialogueContext::with_memory(dialogue.clone(), Default::default());
        authority.start(&participants).unwrap();

        let mut replica = DialogueContext::with_memory(dialogue, Default::default());
        replica.rebind_participants(&authority.flattened_participants()).unwrap();
        let resume = authority.snapshot().resume_point().unwrap();
        replica.start_from_node(&participants, resume).unwrap();

        assert_eq!(replica.active_node_index(), Some(0));
        assert_eq!(replica.active_node_text(), "Halt, Brom!");
        assert_eq!(replica.history(), authority.history());
        assert_eq!(replica.flattened_participants().len(), 2);
    }

    #[test]
    fn test_replica_resume_skips_enter_events() {
        let hero_tag = hero_tag();
        let guard_tag = guard_tag();
        let mut builder = Dialogue::builder("Gate");
        builder.add_node(
            Node::speech(guard_tag.clone(), "Halt!")
                .with_enter_event(Event::notify(guard_tag.clone(), "challenge"))
                .with_child(Edge::to(1).with_text("Leave")),
        );
        builder.add_node(Node::end(hero_tag.clone(), "Fine."));
        builder.add_start_node(Node::root().with_child(Edge::to(0)));
        let dialogue = builder.build().unwrap();

        let hero = TestParticipant::new(hero_tag, "Ayla");
        let guard = TestParticipant::new(guard_tag, "Brom");
        let participants = bind(&[hero, guard.clone()]);

        let mut authority = DialogueContext::with_memory(dialogue.clone(), Default::default());
        authority.start(&participants).unwrap();
        assert_eq!(guard.events(), vec!["challenge".to_string()]);

        let mut replica = DialogueContext::with_memory(dialogue, Default::default());
        let resume = authority.snapshot().resume_point().unwrap();
        assert!(resume.enter_node);
        replica.start_from_node(&participants, resume).unwrap();

        assert_eq!(replica.active_node_index(), Some(0));
        assert_eq!(replica.option_text(0), "Leave");
        assert_eq!(guard.events(), vec!["challenge".to_string()]);
    }

    #[test]
    fn test_rebind_requires_every_participant() {
        let (dialogue, hero_tag, guard_tag) = simple_dialogue();
        let hero = TestParticipant::new(hero_tag.clone(), "Ayla");
        let guard = TestParticipant::new(guard_tag.clone(), "Brom");

        let full: Vec<Arc<dyn DialogueParticipant>> = vec![hero.clone(), guard];
        let mut context = DialogueContext::with_memory(dialogue, Default::default());
        context.rebind_participants(&full).unwrap();
        assert_eq!(context.participant_tags(), vec![guard_tag.clone(), hero_tag]);

        let partial: Vec<Arc<dyn DialogueParticipant>> = vec![hero];
        assert_eq!(
            context.rebind_participants(&partial),
            Err(DialogueError::MissingParticipants(vec![guard_tag.clone()]))
        );
        assert!(context.participant(&guard_tag).is_some());
    }

    #[test]
    fn test_resume_point_builders() {
        let guid = NodeGuid::new();
        let point = ResumePoint::at_guid(guid).without_enter_events().without_entering();
        assert_eq!(point.node_guid, Some(guid));
        assert!(!point.enter_node);
        assert!(!point.fire_enter_events);

        let idle = ContextSnapshot {
            dialogue_id: DialogueId::new(),
            dialogue_name: "Gate".into(),
            active_node_index: None,
            active_node_guid: None,
            speech_sequence_index: None,
            history: History::new(),
            participants: Vec::new(),
            dialogue_ended: false,
        };
        assert!(idle.resume_point().is_none());
    }
}
