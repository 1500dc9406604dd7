//! Events - side effects fired when a node is entered.

use std::fmt::Debug;
use std::sync::Arc;

use dialogue_model::{DialogueParticipant, ParticipantTag};

use crate::context::DialogueContext;

/// User supplied side effect.
pub trait CustomEvent: Debug + Send + Sync {
    fn enter(&self, context: &DialogueContext, participant: Option<&dyn DialogueParticipant>);
}

/// The different kinds of events.
#[derive(Debug, Clone)]
pub enum EventKind {
    /// Forward a named event to the participant.
    Notify { name: String },
    ModifyInt { name: String, value: i64, delta: bool },
    ModifyFloat { name: String, value: f64, delta: bool },
    ModifyBool { name: String, value: bool },
    ModifyText { name: String, value: String },
    Custom(Arc<dyn CustomEvent>),
}

/// A side effect targeting one participant.
#[derive(Debug, Clone)]
pub struct Event {
    pub participant: ParticipantTag,
    pub kind: EventKind,
}

impl Event {
    pub fn notify(participant: ParticipantTag, name: impl Into<String>) -> Self {
        Self {
            participant,
            kind: EventKind::Notify { name: name.into() },
        }
    }

    /// Set an integer variable.
    pub fn set_int(participant: ParticipantTag, name: impl Into<String>, value: i64) -> Self {
        Self {
            participant,
            kind: EventKind::ModifyInt {
                name: name.into(),
                value,
                delta: false,
            },
        }
    }

    /// Add `delta` to an integer variable.
    pub fn add_int(participant: ParticipantTag, name: impl Into<String>, delta: i64) -> Self {
        Self {
            participant,
            kind: EventKind::ModifyInt {
                name: name.into(),
                value: delta,
                delta: true,
            },
        }
    }

    pub fn set_float(participant: ParticipantTag, name: impl Into<String>, value: f64) -> Self {
        Self {
            participant,
            kind: EventKind::ModifyFloat {
                name: name.into(),
                value,
                delta: false,
            },
        }
    }

    pub fn add_float(participant: ParticipantTag, name: impl Into<String>, delta: f64) -> Self {
        Self {
            participant,
            kind: EventKind::ModifyFloat {
                name: name.into(),
                value: delta,
                delta: true,
            },
        }
    }

    pub fn set_bool(participant: ParticipantTag, name: impl Into<String>, value: bool) -> Self {
        Self {
            participant,
            kind: EventKind::ModifyBool {
                name: name.into(),
                value,
            },
        }
    }

    pub fn set_text(
        participant: ParticipantTag,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            participant,
            kind: EventKind::ModifyText {
                name: name.into(),
                value: value.into(),
            },
        }
    }

    pub fn custom(participant: ParticipantTag, event: Arc<dyn CustomEvent>) -> Self {
        Self {
            participant,
            kind: EventKind::Custom(event),
        }
    }

    /// Apply the event. A missing participant is logged and the event skipped,
    /// except for custom events which receive `None`.
    pub fn fire(&self, context: &DialogueContext) {
        let participant = context.participant(&self.participant);

        if let EventKind::Custom(custom) = &self.kind {
            custom.enter(context, participant.as_deref());
            return;
        }

        let Some(participant) = participant else {
            context.log_error(&format!(
                "Event - participant `{}` is not bound, event skipped",
                self.participant
            ));
            return;
        };

        let handled = match &self.kind {
            EventKind::Notify { name } => participant.on_dialogue_event(name),
            EventKind::ModifyInt { name, value, delta } => {
                participant.modify_int_value(name, *delta, *value)
            }
            EventKind::ModifyFloat { name, value, delta } => {
                participant.modify_float_value(name, *delta, *value)
            }
            EventKind::ModifyBool { name, value } => participant.modify_bool_value(name, *value),
            EventKind::ModifyText { name, value } => participant.modify_text_value(name, value),
            EventKind::Custom(_) => true,
        };

        if !handled {
            tracing::debug!(
                participant = %self.participant,
                event = ?self.kind,
                "Event not handled by participant"
            );
        }
    }

    /// Fire every event in order.
    pub fn fire_all(events: &[Event], context: &DialogueContext) {
        for event in events {
            event.fire(context);
        }
    }
}
