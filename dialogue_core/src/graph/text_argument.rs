//! Text arguments - runtime values substituted into `{placeholders}`.

use std::fmt::Debug;
use std::sync::Arc;

use dialogue_model::{format_named, placeholder_names, DialogueParticipant, ParticipantTag};

use crate::context::DialogueContext;

/// User supplied text argument.
pub trait CustomTextArgument: Debug + Send + Sync {
    /// Produce the value. `participant` is the argument's resolved participant.
    fn text(
        &self,
        context: &DialogueContext,
        participant: Option<&dyn DialogueParticipant>,
    ) -> String;
}

/// Where the value of an argument comes from.
#[derive(Debug, Clone)]
pub enum TextArgumentKind {
    /// The participant's display name.
    DisplayName,
    /// An integer variable of the participant.
    IntVariable(String),
    /// A float variable of the participant.
    FloatVariable(String),
    /// A text variable of the participant.
    TextVariable(String),
    /// Game specific value.
    Custom(Arc<dyn CustomTextArgument>),
}

/// Binds a `{display_string}` placeholder to a runtime value.
#[derive(Debug, Clone)]
pub struct TextArgument {
    /// Placeholder name without braces.
    pub display_string: String,

    /// Participant the value is read from. Empty means the node owner.
    pub participant: ParticipantTag,

    pub kind: TextArgumentKind,
}

impl TextArgument {
    /// Create an argument reading the owner's display name.
    pub fn new(display_string: impl Into<String>) -> Self {
        Self {
            display_string: display_string.into(),
            participant: ParticipantTag::none(),
            kind: TextArgumentKind::DisplayName,
        }
    }

    /// Read the value from a specific participant.
    pub fn with_participant(mut self, participant: ParticipantTag) -> Self {
        self.participant = participant;
        self
    }

    /// Set where the value comes from.
    pub fn with_kind(mut self, kind: TextArgumentKind) -> Self {
        self.kind = kind;
        self
    }

    /// Compute the value of this argument for the current participants.
    ///
    /// A missing participant yields an empty string and an error log.
    pub fn construct_value(
        &self,
        context: &DialogueContext,
        node_owner: &ParticipantTag,
    ) -> String {
        let target = if self.participant.is_valid() {
            &self.participant
        } else {
            node_owner
        };
        let participant = context.participant(target);

        if let TextArgumentKind::Custom(custom) = &self.kind {
            return custom.text(context, participant.as_deref());
        }

        let Some(participant) = participant else {
            context.log_error(&format!(
                "TextArgument `{}` - participant `{}` is not bound",
                self.display_string, target
            ));
            return String::new();
        };

        match &self.kind {
            TextArgumentKind::DisplayName => participant.display_name(target),
            TextArgumentKind::IntVariable(name) => participant.int_value(name).to_string(),
            TextArgumentKind::FloatVariable(name) => participant.float_value(name).to_string(),
            TextArgumentKind::TextVariable(name) => participant.text_value(name),
            TextArgumentKind::Custom(_) => String::new(),
        }
    }

    /// Build the final text, or `None` when the text has no arguments.
    pub fn construct_text(
        text: &str,
        arguments: &[TextArgument],
        context: &DialogueContext,
        node_owner: &ParticipantTag,
    ) -> Option<String> {
        if arguments.is_empty() {
            return None;
        }

        Some(format_named(text, |name| {
            arguments
                .iter()
                .find(|argument| argument.display_string == name)
                .map(|argument| argument.construct_value(context, node_owner))
        }))
    }

    /// Rebuild `arguments` so it holds exactly one entry per placeholder of
    /// `text`, keeping already configured entries.
    pub fn sync_with_text(text: &str, arguments: &mut Vec<TextArgument>) {
        let mut synced = Vec::new();
        for name in placeholder_names(text) {
            match arguments.iter().position(|a| a.display_string == name) {
                Some(position) => synced.push(arguments.swap_remove(position)),
                None => synced.push(TextArgument::new(name)),
            }
        }
        *arguments = synced;
    }

    /// Insert or replace the argument with the same display string.
    pub(crate) fn upsert(arguments: &mut Vec<TextArgument>, argument: TextArgument) {
        match arguments
            .iter_mut()
            .find(|a| a.display_string == argument.display_string)
        {
            Some(existing) => *existing = argument,
            None => arguments.push(argument),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bind, simple_dialogue, TestParticipant};

    #[test]
    fn test_sync_keeps_configured_arguments() {
        let mut arguments = vec![
            TextArgument::new("Gold")
                .with_kind(TextArgumentKind::IntVariable("gold".into())),
            TextArgument::new("Stale"),
        ];

        TextArgument::sync_with_text("{Name} has {Gold} gold", &mut arguments);

        assert_eq!(arguments.len(), 2);
        assert_eq!(arguments[0].display_string, "Name");
        assert!(matches!(arguments[0].kind, TextArgumentKind::DisplayName));
        assert!(matches!(arguments[1].kind, TextArgumentKind::IntVariable(ref v) if v == "gold"));
    }

    #[test]
    fn test_construct_text_from_participants() {
        let (dialogue, hero_tag, guard_tag) = simple_dialogue();
        let hero = TestParticipant::new(hero_tag.clone(), "Ayla");
        let guard = TestParticipant::new(guard_tag.clone(), "Brom");
        hero.set_int("gold", 42);
        let participants = bind(&[hero.clone(), guard.clone()]);

        let mut context = DialogueContext::with_memory(dialogue, Default::default());
        context.start(&participants).unwrap();

        let arguments = vec![
            TextArgument::new("Name"),
            TextArgument::new("Gold")
                .with_participant(hero_tag.clone())
                .with_kind(TextArgumentKind::IntVariable("gold".into())),
        ];
        let text = TextArgument::construct_text(
            "{Name}: that's {Gold} gold",
            &arguments,
            &context,
            &guard_tag,
        );

        assert_eq!(text.as_deref(), Some("Brom: that's 42 gold"));
        assert!(TextArgument::construct_text("plain", &[], &context, &guard_tag).is_none());
    }

    #[test]
    fn test_missing_participant_yields_empty_value() {
        let (dialogue, _, guard_tag) = simple_dialogue();
        let context = DialogueContext::with_memory(dialogue, Default::default());

        let value = TextArgument::new("Name").construct_value(&context, &guard_tag);
        assert_eq!(value, "");
    }
}
