//! Engine settings, loaded from TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings applied when a dialogue graph is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueSettings {
    /// Fill empty edge texts with the defaults below.
    pub set_default_edge_texts: bool,

    /// Only the first child edge of a node receives a default text.
    pub default_edge_text_on_first_child_only: bool,

    /// Default text of an edge leading to a regular node.
    pub default_edge_text_to_normal_node: String,

    /// Default text of an edge leading to an end node.
    pub default_edge_text_to_end_node: String,

    /// Default "continue" text inside a speech sequence.
    pub default_speech_sequence_edge_text: String,
}

impl Default for DialogueSettings {
    fn default() -> Self {
        Self {
            set_default_edge_texts: true,
            default_edge_text_on_first_child_only: true,
            default_edge_text_to_normal_node: "Next".to_string(),
            default_edge_text_to_end_node: "Finish".to_string(),
            default_speech_sequence_edge_text: "Next".to_string(),
        }
    }
}

impl DialogueSettings {
    /// Parse settings from a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(source)?)
    }

    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = DialogueSettings::default();
        assert!(settings.set_default_edge_texts);
        assert_eq!(settings.default_edge_text_to_normal_node, "Next");
        assert_eq!(settings.default_edge_text_to_end_node, "Finish");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = DialogueSettings::from_toml_str(
            r#"
            default_edge_text_to_end_node = "Goodbye"
            default_edge_text_on_first_child_only = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.default_edge_text_to_end_node, "Goodbye");
        assert!(!settings.default_edge_text_on_first_child_only);
        assert_eq!(settings.default_edge_text_to_normal_node, "Next");
    }

    #[test]
    fn test_invalid_toml() {
        let result = DialogueSettings::from_toml_str("set_default_edge_texts = \"maybe\"");
        assert!(matches!(result, Err(SettingsError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = DialogueSettings::load("/definitely/not/here/parley.toml");
        assert!(matches!(result, Err(SettingsError::Io(_))));
    }
}
