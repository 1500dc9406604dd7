//! Participant tags - hierarchical, dot separated identifiers such as `Dlg.Hero`.

use serde::{Deserialize, Serialize};

/// Identifies a participant slot in a dialogue.
///
/// Tags are hierarchical (`Dlg.Human.Guard`); only exact matches bind a
/// participant, hierarchical matching is available for queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantTag(String);

impl ParticipantTag {
    /// Separator between hierarchy levels.
    pub const SEPARATOR: char = '.';

    /// Create a tag from its full dotted name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The empty tag. Used where "no participant" is meant.
    pub fn none() -> Self {
        Self(String::new())
    }

    /// A tag is valid when it names something.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }

    /// The full dotted name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last segment (`Guard` for `Dlg.Human.Guard`).
    pub fn leaf(&self) -> &str {
        self.0.rsplit(Self::SEPARATOR).next().unwrap_or("")
    }

    /// Iterate over the hierarchy segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(Self::SEPARATOR).filter(|s| !s.is_empty())
    }

    /// The direct parent tag, if any.
    pub fn parent(&self) -> Option<ParticipantTag> {
        self.0
            .rsplit_once(Self::SEPARATOR)
            .map(|(parent, _)| ParticipantTag::new(parent))
    }

    /// Exact comparison, the only kind used for binding.
    pub fn matches_exact(&self, other: &ParticipantTag) -> bool {
        self.is_valid() && self.0 == other.0
    }

    /// Hierarchical comparison: `Dlg.Human.Guard` matches `Dlg.Human` and `Dlg`.
    pub fn matches(&self, other: &ParticipantTag) -> bool {
        if !self.is_valid() || !other.is_valid() {
            return false;
        }
        self.0 == other.0
            || (self.0.starts_with(&other.0)
                && self.0[other.0.len()..].starts_with(Self::SEPARATOR))
    }
}

impl std::fmt::Display for ParticipantTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ParticipantTag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ParticipantTag {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_leaf_and_parent() {
        let tag = ParticipantTag::new("Dlg.Human.Guard");
        assert_eq!(tag.leaf(), "Guard");
        assert_eq!(tag.parent(), Some(ParticipantTag::new("Dlg.Human")));
        assert_eq!(tag.segments().count(), 3);
        assert_eq!(ParticipantTag::new("Dlg").parent(), None);
    }

    #[test]
    fn test_tag_exact_match() {
        let hero = ParticipantTag::new("Dlg.Hero");
        assert!(hero.matches_exact(&ParticipantTag::new("Dlg.Hero")));
        assert!(!hero.matches_exact(&ParticipantTag::new("Dlg")));
        assert!(!ParticipantTag::none().matches_exact(&ParticipantTag::none()));
    }

    #[test]
    fn test_tag_hierarchical_match() {
        let guard = ParticipantTag::new("Dlg.Human.Guard");
        assert!(guard.matches(&ParticipantTag::new("Dlg.Human")));
        assert!(guard.matches(&ParticipantTag::new("Dlg")));
        assert!(!guard.matches(&ParticipantTag::new("Dlg.Hum")));
        assert!(!ParticipantTag::new("Dlg").matches(&guard));
    }

    #[test]
    fn test_tag_validity() {
        assert!(!ParticipantTag::none().is_valid());
        assert!(ParticipantTag::from("Dlg.Cat").is_valid());
    }
}
