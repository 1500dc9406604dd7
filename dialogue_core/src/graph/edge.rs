//! Edges - directed, conditioned links between nodes.

use std::collections::HashSet;

use dialogue_model::{NodeIndex, ParticipantTag};

use super::{Condition, TextArgument};
use crate::context::DialogueContext;

/// A link from one node to another, shown to the player as an option.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Node entered when the option is taken. `None` marks an edge that only
    /// exists for display, such as the continue option of a speech sequence.
    pub target_index: Option<NodeIndex>,

    /// Every condition must hold for the edge to be satisfied.
    pub conditions: Vec<Condition>,

    pub text: String,
    pub text_arguments: Vec<TextArgument>,
    pub speaker_state: Option<String>,

    /// Whether the edge is listed in the "all options" view while unsatisfied.
    pub include_in_all_options_if_unsatisfied: bool,

    constructed_text: Option<String>,
}

impl Default for Edge {
    fn default() -> Self {
        Self {
            target_index: None,
            conditions: Vec::new(),
            text: String::new(),
            text_arguments: Vec::new(),
            speaker_state: None,
            include_in_all_options_if_unsatisfied: true,
            constructed_text: None,
        }
    }
}

impl Edge {
    /// Create an edge to `target`.
    pub fn to(target: NodeIndex) -> Self {
        Self {
            target_index: Some(target),
            ..Default::default()
        }
    }

    /// Edge without a target, used for synthetic options.
    pub(crate) fn untargeted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Set the option text. Arguments are synced to its placeholders.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        TextArgument::sync_with_text(&self.text, &mut self.text_arguments);
        self
    }

    /// Configure how a placeholder is filled.
    pub fn with_text_argument(mut self, argument: TextArgument) -> Self {
        TextArgument::upsert(&mut self.text_arguments, argument);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_conditions(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    pub fn with_speaker_state(mut self, state: impl Into<String>) -> Self {
        self.speaker_state = Some(state.into());
        self
    }

    /// Leave the edge out of the "all options" view while unsatisfied.
    pub fn hidden_when_unsatisfied(mut self) -> Self {
        self.include_in_all_options_if_unsatisfied = false;
        self
    }

    /// Whether the edge points at a node.
    pub fn is_valid(&self) -> bool {
        self.target_index.is_some()
    }

    /// The text with placeholders replaced, if it was constructed, else the raw text.
    pub fn display_text(&self) -> &str {
        self.constructed_text.as_deref().unwrap_or(&self.text)
    }

    /// The edge is satisfied when it has a target, all its conditions hold,
    /// and the target node can be entered.
    pub fn evaluate(
        &self,
        context: &DialogueContext,
        already_visited: &HashSet<NodeIndex>,
    ) -> bool {
        let Some(target) = self.target_index else {
            return false;
        };
        Condition::all_satisfied(&self.conditions, context, already_visited)
            && context.is_node_enterable(target, already_visited)
    }

    /// A copy of this edge carrying the text constructed for the current participants.
    pub(crate) fn constructed(&self, context: &DialogueContext, owner: &ParticipantTag) -> Edge {
        let mut edge = self.clone();
        edge.constructed_text =
            TextArgument::construct_text(&self.text, &self.text_arguments, context, owner);
        edge
    }

    /// Participants needed by the edge conditions and text arguments.
    pub(crate) fn associated_participants(&self) -> Vec<ParticipantTag> {
        self.conditions
            .iter()
            .flat_map(Condition::associated_participants)
            .chain(
                self.text_arguments
                    .iter()
                    .map(|a| a.participant.clone())
                    .filter(ParticipantTag::is_valid),
            )
            .collect()
    }
}

/// An edge as presented by the context, with its satisfaction at evaluation time.
#[derive(Debug, Clone)]
pub struct EdgeData {
    pub satisfied: bool,
    pub edge: Edge,
}

impl EdgeData {
    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    pub fn edge(&self) -> &Edge {
        &self.edge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bind, simple_dialogue, TestParticipant};
    use crate::CompareOp;

    #[test]
    fn test_with_text_syncs_arguments() {
        let edge = Edge::to(3).with_text("Pay {Toll} coins to {Guard}");
        let names: Vec<_> = edge.text_arguments.iter().map(|a| a.display_string.as_str()).collect();
        assert_eq!(names, vec!["Toll", "Guard"]);
        assert_eq!(edge.display_text(), "Pay {Toll} coins to {Guard}");
        assert!(edge.include_in_all_options_if_unsatisfied);
    }

    #[test]
    fn test_edge_without_target_is_never_satisfied() {
        let (dialogue, _, _) = simple_dialogue();
        let context = DialogueContext::with_memory(dialogue, Default::default());
        let edge = Edge::untargeted("Next");
        assert!(!edge.is_valid());
        assert!(!edge.evaluate(&context, &HashSet::new()));
    }

    #[test]
    fn test_edge_conditions() {
        let (dialogue, hero_tag, guard_tag) = simple_dialogue();
        let hero = TestParticipant::new(hero_tag.clone(), "Ayla");
        let guard = TestParticipant::new(guard_tag, "Brom");
        let mut context = DialogueContext::with_memory(dialogue, Default::default());
        context.start(&bind(&[hero.clone(), guard])).unwrap();

        let edge =
            Edge::to(1).with_condition(Condition::int(hero_tag, "gold", CompareOp::Greater, 0_i64));
        assert!(!edge.evaluate(&context, &HashSet::new()));
        hero.set_int("gold", 1);
        assert!(edge.evaluate(&context, &HashSet::new()));
    }
}
