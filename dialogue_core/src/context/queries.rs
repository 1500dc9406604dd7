//! Read accessors over the option lists and the active node.
//!
//! None of these fail. Bad indices and missing participants are logged with
//! the context string and answered with an empty value.

use serde_json::Value;
use std::sync::Arc;

use dialogue_model::{
    AssetRef, DialogueParticipant, MemoryScope, NodeGuid, NodeIndex, ParticipantTag,
};

use super::DialogueContext;
use crate::graph::{Condition, Edge, EdgeData, Node, NodeKind, SpeechContent};

/// The line currently shown: the node, and for speech sequences the entry.
struct ActiveLine<'a> {
    node: &'a Node,
    content: Option<&'a SpeechContent>,
    speaker: &'a ParticipantTag,
    constructed_text: Option<&'a str>,
}

impl DialogueContext {
    /// Satisfied options.
    pub fn options(&self) -> &[Edge] {
        &self.available_children
    }

    /// Every listed option with its satisfaction.
    pub fn all_options(&self) -> &[EdgeData] {
        &self.all_children
    }

    pub fn option_count(&self) -> usize {
        self.available_children.len()
    }

    pub fn all_option_count(&self) -> usize {
        self.all_children.len()
    }

    pub fn option(&self, index: usize) -> Option<&Edge> {
        let option = self.available_children.get(index);
        if option.is_none() {
            self.log_error(&format!("option - invalid option index {}", index));
        }
        option
    }

    pub fn option_text(&self, index: usize) -> String {
        self.option(index)
            .map(|edge| edge.display_text().to_string())
            .unwrap_or_default()
    }

    pub fn option_speaker_state(&self, index: usize) -> Option<String> {
        self.option(index).and_then(|edge| edge.speaker_state.clone())
    }

    pub fn option_enter_conditions(&self, index: usize) -> &[Condition] {
        self.option(index)
            .map(|edge| edge.conditions.as_slice())
            .unwrap_or_default()
    }

    pub fn option_from_all(&self, index: usize) -> Option<&EdgeData> {
        let option = self.all_children.get(index);
        if option.is_none() {
            self.log_error(&format!("option_from_all - invalid option index {}", index));
        }
        option
    }

    pub fn option_text_from_all(&self, index: usize) -> String {
        self.option_from_all(index)
            .map(|data| data.edge.display_text().to_string())
            .unwrap_or_default()
    }

    pub fn option_speaker_state_from_all(&self, index: usize) -> Option<String> {
        self.option_from_all(index)
            .and_then(|data| data.edge.speaker_state.clone())
    }

    /// Whether the option of the full list is satisfied.
    pub fn is_option_satisfied(&self, index: usize) -> bool {
        self.option_from_all(index).is_some_and(EdgeData::is_satisfied)
    }

    fn option_target(&self, index: usize, skips_unsatisfied: bool) -> Option<NodeIndex> {
        let edge = if skips_unsatisfied {
            self.option(index)
        } else {
            self.option_from_all(index).map(EdgeData::edge)
        };
        edge.and_then(|edge| edge.target_index)
    }

    /// Whether the option leads to a node visited before.
    ///
    /// With `skips_unsatisfied` the index refers to the satisfied list,
    /// otherwise to the full list.
    pub fn is_option_connected_to_visited_node(
        &self,
        index: usize,
        scope: MemoryScope,
        skips_unsatisfied: bool,
    ) -> bool {
        let Some(target) = self.option_target(index, skips_unsatisfied) else {
            return false;
        };
        let guid = self.dialogue.node_guid_for_index(target).unwrap_or_else(NodeGuid::nil);
        self.is_node_visited(target, guid, scope)
    }

    /// Whether the option leads to an end node.
    pub fn is_option_connected_to_end_node(&self, index: usize, skips_unsatisfied: bool) -> bool {
        let Some(target) = self.option_target(index, skips_unsatisfied) else {
            return false;
        };
        match self.dialogue.node(target) {
            Some(node) => node.is_end(),
            None => {
                self.log_error(&format!(
                    "is_option_connected_to_end_node - option {} points to missing node {}",
                    index, target
                ));
                false
            }
        }
    }

    pub fn active_node(&self) -> Option<&Node> {
        self.active_node_index.and_then(|index| self.dialogue.node(index))
    }

    /// Current line of the active speech sequence.
    pub fn active_speech_sequence_index(&self) -> Option<usize> {
        let index = self.active_node_index?;
        if !self.dialogue.node(index)?.is_speech_sequence() {
            return None;
        }
        Some(self.runtime(index).map_or(0, |runtime| runtime.sequence_index))
    }

    fn active_line(&self, accessor: &str) -> Option<ActiveLine<'_>> {
        let Some(node) = self.active_node() else {
            self.log_error(&format!("{} - no active node", accessor));
            return None;
        };
        let runtime = self.active_node_index.and_then(|index| self.runtime(index));

        if let NodeKind::SpeechSequence(sequence) = &node.kind {
            let line = runtime.map_or(0, |runtime| runtime.sequence_index);
            let entry = sequence.entries.get(line);
            return Some(ActiveLine {
                node,
                content: entry.map(|entry| &entry.content),
                speaker: entry
                    .map(|entry| &entry.speaker)
                    .filter(|speaker| speaker.is_valid())
                    .unwrap_or(&node.owner),
                constructed_text: runtime
                    .and_then(|runtime| runtime.constructed_entries.get(line))
                    .and_then(|text| text.as_deref()),
            });
        }

        Some(ActiveLine {
            node,
            content: node.content(),
            speaker: &node.owner,
            constructed_text: runtime.and_then(|runtime| runtime.constructed_text.as_deref()),
        })
    }

    /// Text of the active line with its arguments filled in.
    pub fn active_node_text(&self) -> String {
        let Some(line) = self.active_line("active_node_text") else {
            return String::new();
        };
        if let Some(text) = line.constructed_text {
            return text.to_string();
        }
        match line.content {
            Some(content) => content.text.clone(),
            None => line.node.text().to_string(),
        }
    }

    pub fn active_node_speaker_state(&self) -> Option<String> {
        let line = self.active_line("active_node_speaker_state")?;
        if let NodeKind::Custom(custom) = &line.node.kind {
            return custom.speaker_state().map(str::to_string);
        }
        line.content.and_then(|content| content.speaker_state.clone())
    }

    pub fn active_node_voice(&self) -> Option<AssetRef> {
        self.active_line("active_node_voice")?.content?.voice.clone()
    }

    pub fn active_node_generic_data(&self) -> Option<AssetRef> {
        self.active_line("active_node_generic_data")?.content?.generic_data.clone()
    }

    pub fn active_node_data(&self) -> Option<Value> {
        self.active_line("active_node_data")?.content?.node_data.clone()
    }

    /// Tag of whoever speaks the active line.
    pub fn active_node_participant_tag(&self) -> ParticipantTag {
        self.active_line("active_node_participant_tag")
            .map(|line| line.speaker.clone())
            .unwrap_or_default()
    }

    pub fn active_node_participant(&self) -> Option<Arc<dyn DialogueParticipant>> {
        let line = self.active_line("active_node_participant")?;
        let participant = self.participant(line.speaker);
        if participant.is_none() {
            self.log_error(&format!(
                "active_node_participant - speaker `{}` is not a bound participant",
                line.speaker
            ));
        }
        participant
    }

    pub fn active_node_participant_display_name(&self) -> String {
        let tag = self.active_node_participant_tag();
        self.active_node_participant()
            .map(|participant| participant.display_name(&tag))
            .unwrap_or_default()
    }

    pub fn active_node_participant_icon(&self) -> Option<AssetRef> {
        let tag = self.active_node_participant_tag();
        let state = self.active_node_speaker_state();
        self.active_node_participant()?.icon(&tag, state.as_deref())
    }
}
