//! Participant binding validation.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use dialogue_model::{DialogueParticipant, ParticipantTag};

use crate::error::DialogueError;
use crate::graph::Dialogue;

/// Participants keyed by the tag they are bound under.
pub type ParticipantMap = HashMap<ParticipantTag, Arc<dyn DialogueParticipant>>;

/// Check a participant map against the participants a dialogue declares.
///
/// Every declared tag must be bound to an object reporting exactly that tag.
/// Bindings the dialogue does not know about are ignored with a warning.
/// With `log` unset the check runs silently.
pub fn validate_participants(
    context: &str,
    dialogue: &Dialogue,
    participants: &ParticipantMap,
    log: bool,
) -> Result<(), DialogueError> {
    if dialogue.participants().is_empty() {
        if log {
            tracing::error!(
                context,
                dialogue = %dialogue.name(),
                "Dialogue does not declare any participants"
            );
        }
        return Err(DialogueError::NoParticipantsDeclared);
    }

    let mut required: BTreeSet<&ParticipantTag> = dialogue.participants().iter().collect();

    for (key, participant) in participants {
        let actual = participant.participant_tag();
        if !key.matches_exact(&actual) {
            if log {
                tracing::error!(
                    context,
                    key = %key,
                    actual = %actual,
                    "Participant map key differs from the participant's own tag"
                );
            }
            return Err(DialogueError::ParticipantTagMismatch {
                key: key.clone(),
                actual,
            });
        }

        if !required.remove(key) && log {
            tracing::warn!(
                context,
                participant = %key,
                dialogue = %dialogue.name(),
                "Participant is not referenced by the dialogue, ignoring it"
            );
        }
    }

    if !required.is_empty() {
        let missing: Vec<ParticipantTag> = required.into_iter().cloned().collect();
        if log {
            tracing::error!(
                context,
                dialogue = %dialogue.name(),
                missing = ?missing,
                "Required participants are missing"
            );
        }
        return Err(DialogueError::MissingParticipants(missing));
    }

    Ok(())
}

/// Key a flat list of participants by their own tags.
///
/// Later duplicates of a tag are ignored with a warning.
pub fn participants_from_list(
    dialogue: &Dialogue,
    list: &[Arc<dyn DialogueParticipant>],
) -> Result<ParticipantMap, DialogueError> {
    if list.is_empty() {
        tracing::error!(
            dialogue = %dialogue.name(),
            "Participant list is empty, nothing to convert"
        );
        return Err(DialogueError::EmptyParticipantList);
    }

    let mut map = ParticipantMap::new();
    for (position, participant) in list.iter().enumerate() {
        let tag = participant.participant_tag();
        if map.contains_key(&tag) {
            tracing::warn!(
                dialogue = %dialogue.name(),
                position,
                participant = %tag,
                "Participant already in the list, ignoring it"
            );
            continue;
        }
        map.insert(tag, Arc::clone(participant));
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bind, simple_dialogue, TestParticipant};

    #[test]
    fn test_validate_complete_map() {
        let (dialogue, hero_tag, guard_tag) = simple_dialogue();
        let participants = bind(&[
            TestParticipant::new(hero_tag, "Ayla"),
            TestParticipant::new(guard_tag, "Brom"),
        ]);
        assert_eq!(validate_participants("test", &dialogue, &participants, true), Ok(()));
    }

    #[test]
    fn test_extra_participants_only_warn() {
        let (dialogue, hero_tag, guard_tag) = simple_dialogue();
        let participants = bind(&[
            TestParticipant::new(hero_tag, "Ayla"),
            TestParticipant::new(guard_tag, "Brom"),
            TestParticipant::new(ParticipantTag::new("Dlg.Crow"), "Crow"),
        ]);
        assert!(validate_participants("test", &dialogue, &participants, true).is_ok());
    }

    #[test]
    fn test_missing_participant_fails() {
        let (dialogue, hero_tag, guard_tag) = simple_dialogue();
        let participants = bind(&[TestParticipant::new(hero_tag, "Ayla")]);
        assert_eq!(
            validate_participants("test", &dialogue, &participants, false),
            Err(DialogueError::MissingParticipants(vec![guard_tag]))
        );
    }

    #[test]
    fn test_key_must_match_participant_tag() {
        let (dialogue, hero_tag, guard_tag) = simple_dialogue();
        let mut participants = bind(&[TestParticipant::new(hero_tag.clone(), "Ayla")]);
        let impostor: Arc<dyn DialogueParticipant> = TestParticipant::new(hero_tag.clone(), "Fake");
        participants.insert(guard_tag.clone(), impostor);

        assert_eq!(
            validate_participants("test", &dialogue, &participants, false),
            Err(DialogueError::ParticipantTagMismatch {
                key: guard_tag,
                actual: hero_tag,
            })
        );
    }

    #[test]
    fn test_participants_from_list() {
        let (dialogue, hero_tag, guard_tag) = simple_dialogue();
        let hero = TestParticipant::new(hero_tag.clone(), "Ayla");
        let list: Vec<Arc<dyn DialogueParticipant>> = vec![
            hero.clone(),
            TestParticipant::new(guard_tag.clone(), "Brom"),
            TestParticipant::new(hero_tag.clone(), "Second Ayla"),
        ];

        let map = participants_from_list(&dialogue, &list).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&hero_tag].display_name(&hero_tag), "Ayla");

        assert!(matches!(
            participants_from_list(&dialogue, &[]),
            Err(DialogueError::EmptyParticipantList)
        ));
    }
}
