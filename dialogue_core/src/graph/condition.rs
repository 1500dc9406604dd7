//! Conditions - predicates gating edges and node entry.
//!
//! Conditions are evaluated against a [`DialogueContext`] and never mutate
//! it. Evaluation that recurses into the graph (`HasSatisfiedChild`,
//! custom conditions) carries the set of nodes already being resolved on
//! the current branch so cyclic graphs terminate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use dialogue_model::{DialogueParticipant, MemoryScope, NodeGuid, NodeIndex, ParticipantTag};

use crate::context::DialogueContext;

/// Tolerance used when comparing floats for (in)equality.
pub const FLOAT_TOLERANCE: f64 = 1e-6;

/// User supplied predicate.
pub trait CustomCondition: Debug + Send + Sync {
    /// Whether the condition holds.
    ///
    /// `already_visited` holds the nodes being resolved on this branch; pass
    /// it along if the implementation evaluates graph nodes itself.
    fn is_satisfied(
        &self,
        context: &DialogueContext,
        participant: Option<&dyn DialogueParticipant>,
        already_visited: &HashSet<NodeIndex>,
    ) -> bool;
}

/// Comparison operators for variable conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl CompareOp {
    /// Compare two ordered values.
    pub fn compare<T: PartialOrd + ?Sized>(&self, lhs: &T, rhs: &T) -> bool {
        match self {
            CompareOp::Equal => lhs == rhs,
            CompareOp::NotEqual => lhs != rhs,
            CompareOp::Less => lhs < rhs,
            CompareOp::LessOrEqual => lhs <= rhs,
            CompareOp::Greater => lhs > rhs,
            CompareOp::GreaterOrEqual => lhs >= rhs,
        }
    }

    /// Compare floats, treating values within [`FLOAT_TOLERANCE`] as equal.
    pub fn compare_float(&self, lhs: f64, rhs: f64) -> bool {
        let nearly_equal = (lhs - rhs).abs() <= FLOAT_TOLERANCE;
        match self {
            CompareOp::Equal => nearly_equal,
            CompareOp::NotEqual => !nearly_equal,
            CompareOp::Less => lhs < rhs && !nearly_equal,
            CompareOp::LessOrEqual => lhs < rhs || nearly_equal,
            CompareOp::Greater => lhs > rhs && !nearly_equal,
            CompareOp::GreaterOrEqual => lhs > rhs || nearly_equal,
        }
    }

    /// The operator accepting exactly the values this one rejects.
    pub fn inverse(&self) -> Self {
        match self {
            CompareOp::Equal => CompareOp::NotEqual,
            CompareOp::NotEqual => CompareOp::Equal,
            CompareOp::Less => CompareOp::GreaterOrEqual,
            CompareOp::LessOrEqual => CompareOp::Greater,
            CompareOp::Greater => CompareOp::LessOrEqual,
            CompareOp::GreaterOrEqual => CompareOp::Less,
        }
    }
}

/// Right hand side of a variable comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand<T> {
    /// A literal value.
    Value(T),
    /// A variable of another participant.
    Participant { tag: ParticipantTag, variable: String },
}

impl<T> From<T> for Operand<T> {
    fn from(value: T) -> Self {
        Operand::Value(value)
    }
}

/// The different kinds of conditions.
#[derive(Debug, Clone)]
pub enum ConditionKind {
    /// Whether a node was entered before, in this conversation or ever.
    WasNodeVisited {
        node_index: NodeIndex,
        /// Nil means "look up by index only".
        node_guid: NodeGuid,
        scope: MemoryScope,
        expected: bool,
    },

    /// Whether a node currently has at least one satisfied child edge.
    HasSatisfiedChild { node_index: NodeIndex, expected: bool },

    /// The participant's named check.
    ParticipantCheck { name: String, expected: bool },

    IntVariable {
        name: String,
        op: CompareOp,
        operand: Operand<i64>,
    },

    FloatVariable {
        name: String,
        op: CompareOp,
        operand: Operand<f64>,
    },

    BoolVariable { name: String, expected: bool },

    TextVariable {
        name: String,
        op: CompareOp,
        operand: Operand<String>,
    },

    Custom(Arc<dyn CustomCondition>),
}

/// A single predicate with the participant it is evaluated against.
#[derive(Debug, Clone)]
pub struct Condition {
    /// Participant queried by variable and check conditions. Ignored by the
    /// graph conditions, optional for custom ones.
    pub participant: ParticipantTag,
    pub kind: ConditionKind,
}

impl Condition {
    /// Holds if the node at `node_index` was visited in `scope`.
    pub fn node_visited(node_index: NodeIndex, scope: MemoryScope) -> Self {
        Self::node_visited_with_guid(node_index, NodeGuid::nil(), scope)
    }

    /// Like [`node_visited`](Self::node_visited) but keyed by the durable GUID.
    pub fn node_visited_with_guid(
        node_index: NodeIndex,
        node_guid: NodeGuid,
        scope: MemoryScope,
    ) -> Self {
        Self {
            participant: ParticipantTag::none(),
            kind: ConditionKind::WasNodeVisited {
                node_index,
                node_guid,
                scope,
                expected: true,
            },
        }
    }

    /// Holds if the node at `node_index` has a satisfied child.
    pub fn has_satisfied_child(node_index: NodeIndex) -> Self {
        Self {
            participant: ParticipantTag::none(),
            kind: ConditionKind::HasSatisfiedChild {
                node_index,
                expected: true,
            },
        }
    }

    /// Holds if the participant's named check passes.
    pub fn check(participant: ParticipantTag, name: impl Into<String>) -> Self {
        Self {
            participant,
            kind: ConditionKind::ParticipantCheck {
                name: name.into(),
                expected: true,
            },
        }
    }

    /// Compare an integer variable.
    pub fn int(
        participant: ParticipantTag,
        name: impl Into<String>,
        op: CompareOp,
        operand: impl Into<Operand<i64>>,
    ) -> Self {
        Self {
            participant,
            kind: ConditionKind::IntVariable {
                name: name.into(),
                op,
                operand: operand.into(),
            },
        }
    }

    /// Compare a float variable.
    pub fn float(
        participant: ParticipantTag,
        name: impl Into<String>,
        op: CompareOp,
        operand: impl Into<Operand<f64>>,
    ) -> Self {
        Self {
            participant,
            kind: ConditionKind::FloatVariable {
                name: name.into(),
                op,
                operand: operand.into(),
            },
        }
    }

    /// Holds if a boolean variable is set.
    pub fn flag(participant: ParticipantTag, name: impl Into<String>) -> Self {
        Self {
            participant,
            kind: ConditionKind::BoolVariable {
                name: name.into(),
                expected: true,
            },
        }
    }

    /// Compare a text variable.
    pub fn text(
        participant: ParticipantTag,
        name: impl Into<String>,
        op: CompareOp,
        operand: impl Into<Operand<String>>,
    ) -> Self {
        Self {
            participant,
            kind: ConditionKind::TextVariable {
                name: name.into(),
                op,
                operand: operand.into(),
            },
        }
    }

    /// Delegate to a custom predicate.
    pub fn custom(participant: ParticipantTag, condition: Arc<dyn CustomCondition>) -> Self {
        Self {
            participant,
            kind: ConditionKind::Custom(condition),
        }
    }

    /// The condition accepting exactly what this one rejects.
    ///
    /// Custom conditions cannot be inverted and are returned unchanged.
    pub fn negated(mut self) -> Self {
        match &mut self.kind {
            ConditionKind::WasNodeVisited { expected, .. }
            | ConditionKind::HasSatisfiedChild { expected, .. }
            | ConditionKind::ParticipantCheck { expected, .. }
            | ConditionKind::BoolVariable { expected, .. } => *expected = !*expected,
            ConditionKind::IntVariable { op, .. }
            | ConditionKind::FloatVariable { op, .. }
            | ConditionKind::TextVariable { op, .. } => *op = op.inverse(),
            ConditionKind::Custom(_) => {}
        }
        self
    }

    /// Every condition holds. An empty list is satisfied.
    pub fn all_satisfied(
        conditions: &[Condition],
        context: &DialogueContext,
        already_visited: &HashSet<NodeIndex>,
    ) -> bool {
        conditions
            .iter()
            .all(|condition| condition.evaluate(context, already_visited))
    }

    /// Evaluate against the context.
    pub fn evaluate(
        &self,
        context: &DialogueContext,
        already_visited: &HashSet<NodeIndex>,
    ) -> bool {
        match &self.kind {
            ConditionKind::WasNodeVisited {
                node_index,
                node_guid,
                scope,
                expected,
            } => context.is_node_visited(*node_index, *node_guid, *scope) == *expected,

            ConditionKind::HasSatisfiedChild {
                node_index,
                expected,
            } => {
                let mut branch = already_visited.clone();
                // A node already being resolved on this branch cannot vouch for itself
                let satisfied = branch.insert(*node_index)
                    && context
                        .dialogue()
                        .node(*node_index)
                        .is_some_and(|node| node.has_any_satisfied_child(context, &branch));
                satisfied == *expected
            }

            ConditionKind::Custom(custom) => {
                let participant = context.participant(&self.participant);
                custom.is_satisfied(context, participant.as_deref(), already_visited)
            }

            _ => self.evaluate_participant_condition(context),
        }
    }

    fn evaluate_participant_condition(&self, context: &DialogueContext) -> bool {
        let Some(participant) = context.participant(&self.participant) else {
            context.log_error(&format!(
                "Condition - participant `{}` is not bound, condition fails",
                self.participant
            ));
            return false;
        };

        match &self.kind {
            ConditionKind::ParticipantCheck { name, expected } => {
                participant.check_condition(name) == *expected
            }
            ConditionKind::IntVariable { name, op, operand } => {
                let lhs = participant.int_value(name);
                resolve_operand(context, operand, |p, v| p.int_value(v))
                    .is_some_and(|rhs| op.compare(&lhs, &rhs))
            }
            ConditionKind::FloatVariable { name, op, operand } => {
                let lhs = participant.float_value(name);
                resolve_operand(context, operand, |p, v| p.float_value(v))
                    .is_some_and(|rhs| op.compare_float(lhs, rhs))
            }
            ConditionKind::BoolVariable { name, expected } => {
                participant.bool_value(name) == *expected
            }
            ConditionKind::TextVariable { name, op, operand } => {
                let lhs = participant.text_value(name);
                resolve_operand(context, operand, |p, v| p.text_value(v))
                    .is_some_and(|rhs| op.compare(lhs.as_str(), rhs.as_str()))
            }
            ConditionKind::WasNodeVisited { .. }
            | ConditionKind::HasSatisfiedChild { .. }
            | ConditionKind::Custom(_) => false,
        }
    }

    /// Participants this condition needs bound.
    pub(crate) fn associated_participants(&self) -> Vec<ParticipantTag> {
        let mut tags = Vec::new();
        if self.participant.is_valid() {
            tags.push(self.participant.clone());
        }
        let other = match &self.kind {
            ConditionKind::IntVariable {
                operand: Operand::Participant { tag, .. },
                ..
            }
            | ConditionKind::FloatVariable {
                operand: Operand::Participant { tag, .. },
                ..
            }
            | ConditionKind::TextVariable {
                operand: Operand::Participant { tag, .. },
                ..
            } => Some(tag),
            _ => None,
        };
        if let Some(tag) = other.filter(|t| t.is_valid()) {
            tags.push(tag.clone());
        }
        tags
    }
}

fn resolve_operand<T: Clone, F>(
    context: &DialogueContext,
    operand: &Operand<T>,
    read: F,
) -> Option<T>
where
    F: Fn(&dyn DialogueParticipant, &str) -> T,
{
    match operand {
        Operand::Value(value) => Some(value.clone()),
        Operand::Participant { tag, variable } => match context.participant(tag) {
            Some(other) => Some(read(other.as_ref(), variable)),
            None => {
                context.log_error(&format!(
                    "Condition - compared participant `{}` is not bound, condition fails",
                    tag
                ));
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bind, simple_dialogue, TestParticipant};

    #[derive(Debug)]
    struct AlwaysTrueWhenFresh;

    impl CustomCondition for AlwaysTrueWhenFresh {
        fn is_satisfied(
            &self,
            _context: &DialogueContext,
            participant: Option<&dyn DialogueParticipant>,
            already_visited: &HashSet<NodeIndex>,
        ) -> bool {
            participant.is_some() && already_visited.is_empty()
        }
    }

    fn started_context() -> (DialogueContext, Arc<TestParticipant>, Arc<TestParticipant>) {
        let (dialogue, hero_tag, guard_tag) = simple_dialogue();
        let hero = TestParticipant::new(hero_tag, "Ayla");
        let guard = TestParticipant::new(guard_tag, "Brom");
        let mut context = DialogueContext::with_memory(dialogue, Default::default());
        context.start(&bind(&[hero.clone(), guard.clone()])).unwrap();
        (context, hero, guard)
    }

    #[test]
    fn test_compare_ops() {
        assert!(CompareOp::Less.compare(&1, &2));
        assert!(CompareOp::GreaterOrEqual.compare(&2, &2));
        assert!(!CompareOp::NotEqual.compare("a", "a"));
        assert!(CompareOp::Equal.compare_float(0.1 + 0.2, 0.3));
        assert!(!CompareOp::Less.compare_float(0.3, 0.1 + 0.2));
    }

    #[test]
    fn test_inverse_is_complement() {
        for op in [
            CompareOp::Equal,
            CompareOp::NotEqual,
            CompareOp::Less,
            CompareOp::LessOrEqual,
            CompareOp::Greater,
            CompareOp::GreaterOrEqual,
        ] {
            for (a, b) in [(1, 2), (2, 2), (3, 2)] {
                assert_ne!(op.compare(&a, &b), op.inverse().compare(&a, &b));
            }
        }
    }

    #[test]
    fn test_int_condition_against_value_and_participant() {
        let (context, hero, guard) = started_context();
        hero.set_int("gold", 10);
        guard.set_int("toll", 15);
        let visited = HashSet::new();

        let rich = Condition::int(hero.tag(), "gold", CompareOp::GreaterOrEqual, 10_i64);
        assert!(rich.evaluate(&context, &visited));
        assert!(!rich.clone().negated().evaluate(&context, &visited));

        let can_pay = Condition::int(
            hero.tag(),
            "gold",
            CompareOp::GreaterOrEqual,
            Operand::Participant {
                tag: guard.tag(),
                variable: "toll".into(),
            },
        );
        assert!(!can_pay.evaluate(&context, &visited));
    }

    #[test]
    fn test_check_flag_and_text_conditions() {
        let (context, hero, _) = started_context();
        hero.set_check("is_knight", true);
        hero.set_bool("met_king", true);
        hero.set_text("faction", "North");
        let visited = HashSet::new();

        assert!(Condition::check(hero.tag(), "is_knight").evaluate(&context, &visited));
        assert!(!Condition::check(hero.tag(), "is_thief").evaluate(&context, &visited));
        assert!(Condition::flag(hero.tag(), "met_king").evaluate(&context, &visited));
        assert!(
            Condition::text(hero.tag(), "faction", CompareOp::Equal, "North".to_string())
                .evaluate(&context, &visited)
        );
    }

    #[test]
    fn test_unbound_participant_fails_even_when_negated() {
        let (context, _, _) = started_context();
        let stranger = ParticipantTag::new("Dlg.Stranger");
        let visited = HashSet::new();

        let condition = Condition::check(stranger, "anything");
        assert!(!condition.evaluate(&context, &visited));
        assert!(!condition.negated().evaluate(&context, &visited));
    }

    #[test]
    fn test_node_visited_condition_scopes() {
        let (context, _, _) = started_context();
        let visited = HashSet::new();

        // Start enters node 0
        assert!(Condition::node_visited(0, MemoryScope::Local).evaluate(&context, &visited));
        assert!(Condition::node_visited(0, MemoryScope::Global).evaluate(&context, &visited));
        assert!(!Condition::node_visited(1, MemoryScope::Local).evaluate(&context, &visited));
        assert!(Condition::node_visited(1, MemoryScope::Local)
            .negated()
            .evaluate(&context, &visited));
    }

    #[test]
    fn test_has_satisfied_child_respects_visited_set() {
        let (context, _, _) = started_context();

        assert!(Condition::has_satisfied_child(0).evaluate(&context, &HashSet::new()));
        // Node 0 already being resolved on this branch
        assert!(!Condition::has_satisfied_child(0).evaluate(&context, &HashSet::from([0])));
    }

    #[test]
    fn test_custom_condition_receives_participant_and_visited_set() {
        let (context, hero, _) = started_context();
        let condition = Condition::custom(hero.tag(), Arc::new(AlwaysTrueWhenFresh));

        assert!(condition.evaluate(&context, &HashSet::new()));
        assert!(!condition.evaluate(&context, &HashSet::from([1])));
    }
}
