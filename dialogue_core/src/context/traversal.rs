//! The node state machine: starting, entering nodes, reevaluating options
//! and reacting to a selected option.
//!
//! Every node kind goes through the same three steps. Entering fires the
//! enter events (unless suppressed) and builds the runtime texts.
//! Reevaluation rebuilds the option lists from the node's edges.
//! Selection enters the chosen target.
//!
//! Two kinds deviate:
//!
//! - A **virtual parent** never shows its own options. It resolves to its
//!   first satisfied child and exposes that child's options instead.
//! - A **speech sequence** exposes a single continue option while lines are
//!   left; choosing it moves to the next line without leaving the node. On
//!   the last line the real children show up.
//!
//! Recursive evaluation carries the set of nodes already resolved on the
//! current branch. Sets are copied per branch, never shared, so siblings
//! don't see each other's visits.

use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;

use dialogue_model::{NodeGuid, NodeIndex, ParticipantTag};

use super::{validate_participants, DialogueContext, ParticipantMap, ResumePoint};
use crate::error::DialogueError;
use crate::graph::{
    Dialogue, Edge, EdgeData, Event, Node, NodeKind, SelectorMode, SelectorNode,
    SpeechSequenceEntry,
    TextArgument,
};
use crate::memory::DialogueMemory;

impl DialogueContext {
    /// Whether the dialogue could start with these participants right now.
    ///
    /// Runs on a throwaway context: nothing is recorded and no event fires.
    pub fn can_be_started(dialogue: &Arc<Dialogue>, participants: &ParticipantMap) -> bool {
        Self::can_be_started_with_memory(dialogue, participants, DialogueMemory::global())
    }

    pub fn can_be_started_with_memory(
        dialogue: &Arc<Dialogue>,
        participants: &ParticipantMap,
        memory: Arc<DialogueMemory>,
    ) -> bool {
        if validate_participants("can_be_started", dialogue, participants, false).is_err() {
            return false;
        }

        let mut context = Self::with_memory(Arc::clone(dialogue), memory);
        context.bind_participants(participants);

        let nothing_visited = HashSet::new();
        dialogue
            .start_nodes()
            .iter()
            .flat_map(|start| start.children.iter())
            .filter(|edge| edge.evaluate(&context, &nothing_visited))
            .filter_map(|edge| edge.target_index.and_then(|target| dialogue.node(target)))
            .any(|node| node.has_any_satisfied_child(&context, &nothing_visited))
    }

    /// Bind the participants and enter the first satisfied start target.
    ///
    /// Participants are validated before anything changes: a failed
    /// validation leaves the history and the ledger untouched.
    pub fn start(&mut self, participants: &ParticipantMap) -> Result<(), DialogueError> {
        self.dialogue_ended = false;
        let description = self.context_string();
        if let Err(error) = validate_participants(&description, &self.dialogue, participants, true) {
            self.dialogue_ended = true;
            return Err(error);
        }

        self.bind_participants(participants);
        self.reset_cursor();

        let dialogue = Arc::clone(&self.dialogue);
        let nothing_visited = HashSet::new();
        for start in dialogue.start_nodes() {
            for edge in &start.children {
                let Some(target) = edge.target_index else {
                    continue;
                };
                if !edge.evaluate(self, &nothing_visited) {
                    continue;
                }
                match self.enter_node_internal(target, true, &mut HashSet::new()) {
                    Ok(()) => return Ok(()),
                    Err(error) => {
                        tracing::debug!(
                            target_index = target,
                            %error,
                            "Start target could not be entered"
                        );
                    }
                }
            }
        }

        self.log_error("start - every start edge or its target failed");
        self.dialogue_ended = true;
        Err(DialogueError::NoSatisfiableStart)
    }

    /// Start at an explicit node, e.g. to load a save game or resync a replica.
    pub fn start_from_node(
        &mut self,
        participants: &ParticipantMap,
        resume: ResumePoint,
    ) -> Result<(), DialogueError> {
        self.dialogue_ended = false;
        let description = self.context_string();
        if let Err(error) = validate_participants(&description, &self.dialogue, participants, true) {
            self.dialogue_ended = true;
            return Err(error);
        }

        self.bind_participants(participants);
        self.reset_cursor();
        self.history = resume.history;

        let node_index = match (resume.node_guid, resume.node_index) {
            (Some(guid), _) => self
                .dialogue
                .node_index_for_guid(guid)
                .ok_or(DialogueError::UnknownNodeGuid(guid)),
            (None, Some(index)) if self.dialogue.is_valid_node_index(index) => Ok(index),
            (None, Some(index)) => Err(DialogueError::InvalidNodeIndex(index)),
            (None, None) => Err(DialogueError::NoActiveNode),
        };
        let node_index = match node_index {
            Ok(index) => index,
            Err(error) => return self.finish("start_from_node", Err(error)),
        };

        let result = if resume.enter_node {
            self.enter_node_internal(node_index, resume.fire_enter_events, &mut HashSet::new())
        } else {
            self.active_node_index = Some(node_index);
            let guid = self
                .dialogue
                .node_guid_for_index(node_index)
                .unwrap_or_else(NodeGuid::nil);
            self.set_node_visited(node_index, guid);
            self.rebuild_texts(node_index);
            self.reevaluate_node(node_index, HashSet::new())
        };
        self.finish("start_from_node", result)
    }

    /// Take an option of the satisfied list.
    pub fn choose_option(&mut self, option_index: usize) -> Result<(), DialogueError> {
        let result = self.option_selected(option_index, false);
        self.finish("choose_option", result)
    }

    /// Take an option of the full list. Unsatisfied options are refused.
    pub fn choose_option_from_all(&mut self, option_index: usize) -> Result<(), DialogueError> {
        let result = self.option_selected(option_index, true);
        self.finish("choose_option_from_all", result)
    }

    /// Jump the active speech sequence to `entry_index`, as reported by the
    /// authority. An index past the entries leaves the sequence through
    /// the real option at that index.
    pub fn choose_speech_sequence_option_from_replicated(
        &mut self,
        entry_index: usize,
    ) -> Result<(), DialogueError> {
        let result = self.sequence_selected_from_replicated(entry_index);
        self.finish("choose_speech_sequence_option_from_replicated", result)
    }

    /// Recompute the options of the active node, e.g. after game state changed.
    pub fn reevaluate_options(&mut self) -> Result<(), DialogueError> {
        let result = match self.active_node_index {
            Some(index) => self.reevaluate_node(index, HashSet::new()),
            None => Err(DialogueError::NoActiveNode),
        };
        self.finish("reevaluate_options", result)
    }

    /// Enter a node directly.
    pub fn enter_node(
        &mut self,
        node_index: NodeIndex,
        fire_enter_events: bool,
    ) -> Result<(), DialogueError> {
        let result = self.enter_node_internal(node_index, fire_enter_events, &mut HashSet::new());
        self.finish("enter_node", result)
    }

    fn reset_cursor(&mut self) {
        self.active_node_index = None;
        self.available_children.clear();
        self.all_children.clear();
        self.history.clear();
        self.node_runtime.clear();
    }

    /// Make the node active, record the visit and run its enter logic.
    ///
    /// `entered` collects the nodes entered within this step.
    pub(crate) fn enter_node_internal(
        &mut self,
        node_index: NodeIndex,
        fire_events: bool,
        entered: &mut HashSet<NodeIndex>,
    ) -> Result<(), DialogueError> {
        let Some(guid) = self.dialogue.node_guid_for_index(node_index) else {
            self.log_error(&format!("enter_node - invalid node index {}", node_index));
            return Err(DialogueError::InvalidNodeIndex(node_index));
        };

        self.active_node_index = Some(node_index);
        self.set_node_visited(node_index, guid);
        self.handle_node_enter(node_index, fire_events, entered)
    }

    fn handle_node_enter(
        &mut self,
        node_index: NodeIndex,
        fire_events: bool,
        entered: &mut HashSet<NodeIndex>,
    ) -> Result<(), DialogueError> {
        if !entered.insert(node_index) {
            self.log_error(&format!(
                "handle_node_enter - node {} was already entered in this step, endless loop",
                node_index
            ));
            return Err(DialogueError::EndlessLoop(node_index));
        }

        let dialogue = Arc::clone(&self.dialogue);
        let node = dialogue
            .node(node_index)
            .ok_or(DialogueError::InvalidNodeIndex(node_index))?;

        match &node.kind {
            NodeKind::Speech(speech) => {
                self.rebuild_node_text(node_index, node);
                if fire_events {
                    Event::fire_all(&node.enter_events, self);
                }
                self.reevaluate_node(node_index, HashSet::new())?;

                if speech.is_virtual_parent {
                    let fire_child_events =
                        fire_events && speech.virtual_parent_fire_direct_child_enter_events;
                    self.replay_virtual_child_enter(node_index, fire_child_events);
                }
                Ok(())
            }

            NodeKind::SpeechSequence(sequence) => {
                self.rebuild_sequence_texts(node_index, &node.owner, &sequence.entries);
                self.runtime_mut(node_index).sequence_index = 0;
                if fire_events {
                    Event::fire_all(&node.enter_events, self);
                }
                self.reevaluate_node(node_index, HashSet::new())
            }

            NodeKind::End(_) => {
                self.rebuild_node_text(node_index, node);
                if fire_events {
                    Event::fire_all(&node.enter_events, self);
                }
                self.available_children.clear();
                self.all_children.clear();
                self.dialogue_ended = true;
                Ok(())
            }

            NodeKind::Selector(selector) => {
                if fire_events {
                    Event::fire_all(&node.enter_events, self);
                }
                self.base_reevaluate(node_index, node)?;
                let target = self.pick_selector_target(node_index, node, selector)?;
                self.enter_node_internal(target, fire_events, entered)
            }

            NodeKind::Proxy(proxy) => {
                if fire_events {
                    Event::fire_all(&node.enter_events, self);
                }
                self.enter_node_internal(proxy.target, fire_events, entered)
            }

            NodeKind::Custom(custom) => {
                if fire_events {
                    Event::fire_all(&node.enter_events, self);
                }
                custom.on_enter(self);
                self.reevaluate_node(node_index, HashSet::new())
            }

            NodeKind::Root => {
                if fire_events {
                    Event::fire_all(&node.enter_events, self);
                }
                self.reevaluate_node(node_index, HashSet::new())
            }
        }
    }

    /// The child a virtual parent resolved to is never entered on its own,
    /// so its visit (and optionally its events) are replayed here.
    fn replay_virtual_child_enter(&mut self, parent_index: NodeIndex, fire_child_events: bool) {
        let resolved = self.runtime(parent_index).and_then(|runtime| runtime.virtual_child);
        let Some(child_index) = resolved else {
            return;
        };
        let dialogue = Arc::clone(&self.dialogue);
        let Some(child) = dialogue.node(child_index) else {
            return;
        };

        self.set_node_visited(child_index, child.guid);
        if fire_child_events {
            Event::fire_all(&child.enter_events, self);
        }
    }

    /// Rebuild the option lists of a node.
    pub(crate) fn reevaluate_node(
        &mut self,
        node_index: NodeIndex,
        already_evaluated: HashSet<NodeIndex>,
    ) -> Result<(), DialogueError> {
        let dialogue = Arc::clone(&self.dialogue);
        let node = dialogue
            .node(node_index)
            .ok_or(DialogueError::InvalidNodeIndex(node_index))?;

        match &node.kind {
            NodeKind::Speech(speech) if speech.is_virtual_parent => {
                self.reevaluate_virtual_parent(node_index, node, already_evaluated)
            }
            NodeKind::SpeechSequence(sequence) => {
                self.reevaluate_sequence(node_index, node, &sequence.entries)
            }
            _ => self.base_reevaluate(node_index, node),
        }
    }

    /// Evaluate every edge of the node. Fails when none is satisfied.
    fn base_reevaluate(&mut self, node_index: NodeIndex, node: &Node) -> Result<(), DialogueError> {
        self.available_children.clear();
        self.all_children.clear();

        let visited = HashSet::from([node_index]);
        for edge in &node.children {
            let satisfied = edge.evaluate(self, &visited);
            if !satisfied && !edge.include_in_all_options_if_unsatisfied {
                continue;
            }

            let edge = edge.constructed(self, &node.owner);
            if satisfied {
                self.available_children.push(edge.clone());
            }
            self.all_children.push(EdgeData { satisfied, edge });
        }

        if self.available_children.is_empty() {
            return Err(DialogueError::NoSatisfiedChildren(node_index));
        }
        Ok(())
    }

    fn reevaluate_virtual_parent(
        &mut self,
        node_index: NodeIndex,
        node: &Node,
        mut already_evaluated: HashSet<NodeIndex>,
    ) -> Result<(), DialogueError> {
        self.runtime_mut(node_index).virtual_child = None;
        self.available_children.clear();
        self.all_children.clear();

        if !already_evaluated.insert(node_index) {
            self.log_error(&format!(
                "reevaluate - virtual parent {} is its own ancestor, endless loop",
                node_index
            ));
            return Err(DialogueError::EndlessLoop(node_index));
        }

        let own = HashSet::from([node_index]);
        let context: &DialogueContext = self;
        let first_satisfied = node
            .children
            .iter()
            .filter(|edge| edge.evaluate(context, &own))
            .find_map(|edge| edge.target_index);

        let Some(child_index) = first_satisfied else {
            return Err(DialogueError::NoSatisfiedChildren(node_index));
        };

        self.reevaluate_node(child_index, already_evaluated)?;
        self.runtime_mut(node_index).virtual_child = Some(child_index);
        Ok(())
    }

    fn reevaluate_sequence(
        &mut self,
        node_index: NodeIndex,
        node: &Node,
        entries: &[SpeechSequenceEntry],
    ) -> Result<(), DialogueError> {
        let line = self.runtime(node_index).map_or(0, |runtime| runtime.sequence_index);
        if line + 1 >= entries.len() {
            return self.base_reevaluate(node_index, node);
        }

        let next = Edge::untargeted(entries[line].edge_text.clone());
        self.available_children = vec![next.clone()];
        self.all_children = vec![EdgeData {
            satisfied: true,
            edge: next,
        }];
        Ok(())
    }

    fn option_selected(
        &mut self,
        option_index: usize,
        from_all: bool,
    ) -> Result<(), DialogueError> {
        let node_index = self.active_node_index.ok_or(DialogueError::NoActiveNode)?;
        let dialogue = Arc::clone(&self.dialogue);
        let node = dialogue
            .node(node_index)
            .ok_or(DialogueError::InvalidNodeIndex(node_index))?;

        let NodeKind::SpeechSequence(sequence) = &node.kind else {
            return self.base_option_selected(option_index, from_all);
        };

        let line = self.runtime(node_index).map_or(0, |runtime| runtime.sequence_index);
        if line + 1 < sequence.entries.len() {
            let count = self.option_list_len(from_all);
            if option_index >= count {
                return Err(DialogueError::InvalidOptionIndex {
                    index: option_index,
                    count,
                });
            }
            self.runtime_mut(node_index).sequence_index = line + 1;
            return self.reevaluate_node(node_index, HashSet::from([node_index]));
        }

        self.leave_sequence(node_index, node, option_index, from_all)
    }

    fn sequence_selected_from_replicated(
        &mut self,
        entry_index: usize,
    ) -> Result<(), DialogueError> {
        let node_index = self.active_node_index.ok_or(DialogueError::NoActiveNode)?;
        let dialogue = Arc::clone(&self.dialogue);
        let node = dialogue
            .node(node_index)
            .ok_or(DialogueError::InvalidNodeIndex(node_index))?;

        let NodeKind::SpeechSequence(sequence) = &node.kind else {
            return Err(DialogueError::NotASpeechSequence(node_index));
        };

        if entry_index < sequence.entries.len() {
            self.runtime_mut(node_index).sequence_index = entry_index;
            return self.reevaluate_node(node_index, HashSet::from([node_index]));
        }

        self.leave_sequence(node_index, node, entry_index, false)
    }

    /// Reset the sequence and take one of its real options.
    fn leave_sequence(
        &mut self,
        node_index: NodeIndex,
        node: &Node,
        option_index: usize,
        from_all: bool,
    ) -> Result<(), DialogueError> {
        self.runtime_mut(node_index).sequence_index = 0;
        if let Err(error) = self.base_reevaluate(node_index, node) {
            tracing::debug!(node_index, %error, "Speech sequence has no satisfied real options");
        }
        self.base_option_selected(option_index, from_all)
    }

    fn option_list_len(&self, from_all: bool) -> usize {
        if from_all {
            self.all_children.len()
        } else {
            self.available_children.len()
        }
    }

    fn base_option_selected(
        &mut self,
        option_index: usize,
        from_all: bool,
    ) -> Result<(), DialogueError> {
        let count = self.option_list_len(from_all);
        let out_of_range = DialogueError::InvalidOptionIndex {
            index: option_index,
            count,
        };

        let target = if from_all {
            let option = self.all_children.get(option_index).ok_or(out_of_range)?;
            if !option.satisfied {
                return Err(DialogueError::UnsatisfiedOption(option_index));
            }
            option.edge.target_index
        } else {
            self.available_children
                .get(option_index)
                .ok_or(out_of_range)?
                .target_index
        };

        let target = target.ok_or(DialogueError::OptionWithoutTarget(option_index))?;
        self.enter_node_internal(target, true, &mut HashSet::new())
    }

    fn pick_selector_target(
        &mut self,
        node_index: NodeIndex,
        node: &Node,
        selector: &SelectorNode,
    ) -> Result<NodeIndex, DialogueError> {
        let candidates: Vec<NodeIndex> = self
            .available_children
            .iter()
            .filter_map(|edge| edge.target_index)
            .collect();
        let Some(&first) = candidates.first() else {
            return Err(DialogueError::NoSatisfiedChildren(node_index));
        };

        match selector.mode {
            SelectorMode::First => Ok(first),
            SelectorMode::Random => Ok(self
                .pick_random_target(node, selector, &candidates)
                .unwrap_or(first)),
        }
    }

    /// Random pick honouring the "cycle without repetition" and "not twice
    /// in a row" options. Their bookkeeping lives in the ledger so it
    /// carries over between conversations.
    fn pick_random_target(
        &mut self,
        node: &Node,
        selector: &SelectorNode,
        candidates: &[NodeIndex],
    ) -> Option<NodeIndex> {
        let dialogue_id = self.dialogue.id();
        let saved = self.memory.node_saved_data(dialogue_id, node.guid);
        let guid_of = |index: NodeIndex| {
            self.dialogue
                .node_guid_for_index(index)
                .unwrap_or_else(NodeGuid::nil)
        };

        let mut pool = candidates.to_vec();
        let mut restart_cycle = false;
        if selector.cycle_through_satisfied_options_without_repetition {
            let fresh: Vec<NodeIndex> = pool
                .iter()
                .copied()
                .filter(|index| !saved.picked_targets.contains(&guid_of(*index)))
                .collect();
            if fresh.is_empty() {
                restart_cycle = true;
            } else {
                pool = fresh;
            }
        }

        if selector.avoid_picking_same_option_twice_in_a_row && pool.len() > 1 {
            if let Some(last) = saved.last_pick {
                let without_last: Vec<NodeIndex> =
                    pool.iter().copied().filter(|index| guid_of(*index) != last).collect();
                if !without_last.is_empty() {
                    pool = without_last;
                }
            }
        }

        let pick = *pool.choose(&mut self.rng)?;
        let pick_guid = guid_of(pick);
        let cycle = selector.cycle_through_satisfied_options_without_repetition;
        self.memory.update_node_saved_data(dialogue_id, node.guid, |data| {
            if cycle {
                if restart_cycle {
                    data.picked_targets.clear();
                }
                data.picked_targets.insert(pick_guid);
            }
            data.last_pick = Some(pick_guid);
        });
        Some(pick)
    }

    /// Construct the runtime texts of a node made active without entering it.
    fn rebuild_texts(&mut self, node_index: NodeIndex) {
        let dialogue = Arc::clone(&self.dialogue);
        let Some(node) = dialogue.node(node_index) else {
            return;
        };
        match &node.kind {
            NodeKind::SpeechSequence(sequence) => {
                self.rebuild_sequence_texts(node_index, &node.owner, &sequence.entries)
            }
            _ => self.rebuild_node_text(node_index, node),
        }
    }

    fn rebuild_node_text(&mut self, node_index: NodeIndex, node: &Node) {
        let context: &DialogueContext = self;
        let constructed = node
            .content()
            .and_then(|content| {
                TextArgument::construct_text(
                    &content.text,
                    &content.text_arguments,
                    context,
                    &node.owner,
                )
            });
        self.runtime_mut(node_index).constructed_text = constructed;
    }

    fn rebuild_sequence_texts(
        &mut self,
        node_index: NodeIndex,
        owner: &ParticipantTag,
        entries: &[SpeechSequenceEntry],
    ) {
        let context: &DialogueContext = self;
        let constructed = entries
            .iter()
            .map(|entry| {
                let speaker = if entry.speaker.is_valid() { &entry.speaker } else { owner };
                let content = &entry.content;
                let arguments = &content.text_arguments;
                TextArgument::construct_text(&content.text, arguments, context, speaker)
            })
            .collect();
        self.runtime_mut(node_index).constructed_entries = constructed;
    }
}
