//! The capability contract a game object implements to take part in dialogues.

use serde::{Deserialize, Serialize};

use super::ParticipantTag;

/// Opaque reference to an engine asset (icon, voice line, generic object).
///
/// The dialogue engine never resolves these; it only hands them back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef(pub String);

impl AssetRef {
    /// Create a new asset reference from its path or key.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The path or key of the referenced asset.
    pub fn path(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A game object bound to a dialogue under a [`ParticipantTag`].
///
/// Participants are owned by the game. Dialogue contexts only keep weak
/// references, so every method takes `&self`; implementations that expose
/// mutable variables use interior mutability.
///
/// Everything except [`participant_tag`](Self::participant_tag) has a
/// neutral default so simple participants only implement what they use.
pub trait DialogueParticipant: Send + Sync {
    /// The tag this object answers to. Must equal the key it is bound under.
    fn participant_tag(&self) -> ParticipantTag;

    /// Name shown in the dialogue UI while `active_tag` is speaking.
    fn display_name(&self, active_tag: &ParticipantTag) -> String {
        active_tag.leaf().to_string()
    }

    /// Icon for the given speaker state.
    fn icon(&self, _active_tag: &ParticipantTag, _speaker_state: Option<&str>) -> Option<AssetRef> {
        None
    }

    /// Named boolean check answered by game code.
    fn check_condition(&self, _name: &str) -> bool {
        false
    }

    /// Named event raised by the dialogue. Returns whether it was handled.
    fn on_dialogue_event(&self, _name: &str) -> bool {
        false
    }

    /// Integer variable lookup.
    fn int_value(&self, _name: &str) -> i64 {
        0
    }

    /// Float variable lookup.
    fn float_value(&self, _name: &str) -> f64 {
        0.0
    }

    /// Boolean variable lookup.
    fn bool_value(&self, _name: &str) -> bool {
        false
    }

    /// Text variable lookup.
    fn text_value(&self, _name: &str) -> String {
        String::new()
    }

    /// Set (or add to, when `delta`) an integer variable.
    fn modify_int_value(&self, _name: &str, _delta: bool, _value: i64) -> bool {
        false
    }

    /// Set (or add to, when `delta`) a float variable.
    fn modify_float_value(&self, _name: &str, _delta: bool, _value: f64) -> bool {
        false
    }

    /// Set a boolean variable.
    fn modify_bool_value(&self, _name: &str, _value: bool) -> bool {
        false
    }

    /// Set a text variable.
    fn modify_text_value(&self, _name: &str, _value: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mute;

    impl DialogueParticipant for Mute {
        fn participant_tag(&self) -> ParticipantTag {
            ParticipantTag::new("Dlg.Object.Statue")
        }
    }

    #[test]
    fn test_participant_defaults() {
        let statue = Mute;
        let tag = statue.participant_tag();
        assert_eq!(statue.display_name(&tag), "Statue");
        assert!(statue.icon(&tag, None).is_none());
        assert_eq!(statue.int_value("gold"), 0);
        assert!(!statue.modify_int_value("gold", true, 3));
    }

    #[test]
    fn test_asset_ref() {
        let voice = AssetRef::new("audio/vo/guard_01");
        assert_eq!(voice.path(), "audio/vo/guard_01");
        assert_eq!(voice.to_string(), "audio/vo/guard_01");
    }
}
