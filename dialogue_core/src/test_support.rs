//! Fixtures shared by the unit tests.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dialogue_model::{AssetRef, DialogueParticipant, ParticipantTag};

use crate::context::ParticipantMap;
use crate::graph::{Dialogue, Edge, Node};

/// Participant keeping its variables in memory and recording the events it receives.
#[derive(Debug)]
pub(crate) struct TestParticipant {
    tag: ParticipantTag,
    name: String,
    ints: Mutex<HashMap<String, i64>>,
    floats: Mutex<HashMap<String, f64>>,
    bools: Mutex<HashMap<String, bool>>,
    texts: Mutex<HashMap<String, String>>,
    checks: Mutex<HashSet<String>>,
    events: Mutex<Vec<String>>,
}

impl TestParticipant {
    pub(crate) fn new(tag: ParticipantTag, name: &str) -> Arc<Self> {
        Arc::new(Self {
            tag,
            name: name.to_string(),
            ints: Mutex::default(),
            floats: Mutex::default(),
            bools: Mutex::default(),
            texts: Mutex::default(),
            checks: Mutex::default(),
            events: Mutex::default(),
        })
    }

    pub(crate) fn tag(&self) -> ParticipantTag {
        self.tag.clone()
    }

    pub(crate) fn set_int(&self, name: &str, value: i64) {
        self.ints.lock().insert(name.to_string(), value);
    }

    pub(crate) fn set_bool(&self, name: &str, value: bool) {
        self.bools.lock().insert(name.to_string(), value);
    }

    pub(crate) fn set_text(&self, name: &str, value: &str) {
        self.texts.lock().insert(name.to_string(), value.to_string());
    }

    pub(crate) fn set_check(&self, name: &str, passes: bool) {
        let mut checks = self.checks.lock();
        if passes {
            checks.insert(name.to_string());
        } else {
            checks.remove(name);
        }
    }

    /// Named events received so far, in order.
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl DialogueParticipant for TestParticipant {
    fn participant_tag(&self) -> ParticipantTag {
        self.tag.clone()
    }

    fn display_name(&self, _active_tag: &ParticipantTag) -> String {
        self.name.clone()
    }

    fn icon(&self, _active_tag: &ParticipantTag, speaker_state: Option<&str>) -> Option<AssetRef> {
        Some(AssetRef::new(format!(
            "icons/{}/{}",
            self.tag.leaf(),
            speaker_state.unwrap_or("neutral")
        )))
    }

    fn check_condition(&self, name: &str) -> bool {
        self.checks.lock().contains(name)
    }

    fn on_dialogue_event(&self, name: &str) -> bool {
        self.events.lock().push(name.to_string());
        true
    }

    fn int_value(&self, name: &str) -> i64 {
        self.ints.lock().get(name).copied().unwrap_or_default()
    }

    fn float_value(&self, name: &str) -> f64 {
        self.floats.lock().get(name).copied().unwrap_or_default()
    }

    fn bool_value(&self, name: &str) -> bool {
        self.bools.lock().get(name).copied().unwrap_or_default()
    }

    fn text_value(&self, name: &str) -> String {
        self.texts.lock().get(name).cloned().unwrap_or_default()
    }

    fn modify_int_value(&self, name: &str, delta: bool, value: i64) -> bool {
        let mut ints = self.ints.lock();
        let slot = ints.entry(name.to_string()).or_default();
        *slot = if delta { *slot + value } else { value };
        true
    }

    fn modify_float_value(&self, name: &str, delta: bool, value: f64) -> bool {
        let mut floats = self.floats.lock();
        let slot = floats.entry(name.to_string()).or_default();
        *slot = if delta { *slot + value } else { value };
        true
    }

    fn modify_bool_value(&self, name: &str, value: bool) -> bool {
        self.set_bool(name, value);
        true
    }

    fn modify_text_value(&self, name: &str, value: &str) -> bool {
        self.set_text(name, value);
        true
    }
}

/// Bind participants under their own tags.
pub(crate) fn bind(participants: &[Arc<TestParticipant>]) -> ParticipantMap {
    participants
        .iter()
        .map(|p| (p.tag(), Arc::clone(p) as Arc<dyn DialogueParticipant>))
        .collect()
}

pub(crate) fn hero_tag() -> ParticipantTag {
    ParticipantTag::new("Dlg.Hero")
}

pub(crate) fn guard_tag() -> ParticipantTag {
    ParticipantTag::new("Dlg.Guard")
}

/// Start -> 0: guard "Halt, {Name}!" -> 1: hero end "Fine, I'll go."
pub(crate) fn simple_dialogue() -> (Arc<Dialogue>, ParticipantTag, ParticipantTag) {
    let mut builder = Dialogue::builder("Gate");
    let halt = builder.add_node(
        Node::speech(guard_tag(), "Halt, {Name}!").with_child(Edge::to(1).with_text("Leave")),
    );
    builder.add_node(Node::end(hero_tag(), "Fine, I'll go."));
    builder.add_start_node(Node::root().with_child(Edge::to(halt)));

    let dialogue = builder.build().expect("fixture dialogue is valid");
    (dialogue, hero_tag(), guard_tag())
}

/// Route traversal logs to the test output. Honours `RUST_LOG`.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
