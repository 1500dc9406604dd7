//! Identifiers for dialogues and their nodes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Position of a node inside a dialogue's node list.
///
/// Fast to look up but not stable across edits of the graph; use
/// [`NodeGuid`] when the identity has to survive.
pub type NodeIndex = usize;

/// Unique identifier for a dialogue asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DialogueId(pub Uuid);

impl DialogueId {
    /// Create a new random dialogue ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a dialogue ID from a specific UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for DialogueId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DialogueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable identity of a node, stable across graph edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeGuid(pub Uuid);

impl NodeGuid {
    /// Create a new random node GUID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a node GUID from a specific UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The "unknown" GUID. History lookups with it fall back to the index.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Whether this GUID identifies something (is not nil).
    pub fn is_valid(&self) -> bool {
        !self.0.is_nil()
    }
}

impl Default for NodeGuid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeGuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_guid_validity() {
        assert!(NodeGuid::new().is_valid());
        assert!(!NodeGuid::nil().is_valid());
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(DialogueId::new(), DialogueId::new());
        assert_ne!(NodeGuid::new(), NodeGuid::new());
    }

    #[test]
    fn test_guid_serde() {
        let guid = NodeGuid::new();
        let json = serde_json::to_string(&guid).unwrap();
        let back: NodeGuid = serde_json::from_str(&json).unwrap();
        assert_eq!(guid, back);
    }
}
