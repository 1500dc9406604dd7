//! Error types for dialogue building and traversal.

use thiserror::Error;

use dialogue_model::{NodeGuid, NodeIndex, ParticipantTag};

/// Errors produced while building or running a dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialogueError {
    #[error("node index {0} is out of range")]
    InvalidNodeIndex(NodeIndex),

    #[error("no node has GUID {0}")]
    UnknownNodeGuid(NodeGuid),

    #[error("option index {index} is out of range ({count} options)")]
    InvalidOptionIndex { index: usize, count: usize },

    #[error("option {0} is not satisfied")]
    UnsatisfiedOption(usize),

    #[error("option {0} does not lead anywhere")]
    OptionWithoutTarget(usize),

    #[error("the dialogue has no active node")]
    NoActiveNode,

    #[error("node {0} has no satisfied children")]
    NoSatisfiedChildren(NodeIndex),

    #[error("endless loop detected at node {0}")]
    EndlessLoop(NodeIndex),

    #[error("participants {0:?} are required but not bound")]
    MissingParticipants(Vec<ParticipantTag>),

    #[error("participant bound as `{key}` reports tag `{actual}`")]
    ParticipantTagMismatch { key: ParticipantTag, actual: ParticipantTag },

    #[error("the dialogue declares no participants")]
    NoParticipantsDeclared,

    #[error("the participant list is empty")]
    EmptyParticipantList,

    #[error("no start node leads to a satisfied node")]
    NoSatisfiableStart,

    #[error("node {0} is not a speech sequence")]
    NotASpeechSequence(NodeIndex),

    #[error("node {node} links to missing node {target}")]
    InvalidEdgeTarget { node: NodeGuid, target: NodeIndex },

    #[error("GUID {0} is used by more than one node")]
    DuplicateNodeGuid(NodeGuid),

    #[error("root node at index {0} can only be used as a start node")]
    MisplacedRootNode(NodeIndex),

    #[error("start node {0} is not a root node")]
    InvalidStartNode(usize),
}
