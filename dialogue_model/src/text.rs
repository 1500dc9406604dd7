//! Named placeholder formatting for dialogue texts.
//!
//! Texts reference runtime values with `{identifier}` placeholders, e.g.
//! `"Welcome back, {PlayerName}."`. Unknown placeholders are left as written.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([\w.\-]+)\}").expect("placeholder pattern must compile"));

/// Placeholder names in order of first appearance, without duplicates.
pub fn placeholder_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for captures in PLACEHOLDER.captures_iter(text) {
        let name = &captures[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Replace every `{name}` for which `lookup` returns a value.
pub fn format_named<F>(text: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    PLACEHOLDER
        .replace_all(text, |captures: &Captures| {
            lookup(&captures[1]).unwrap_or_else(|| captures[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_names() {
        let names = placeholder_names("{Name} owes {Gold} gold. Pay up, {Name}!");
        assert_eq!(names, vec!["Name".to_string(), "Gold".to_string()]);
    }

    #[test]
    fn test_format_named() {
        let text = format_named("Hello {Name}, you have {Gold} gold.", |name| match name {
            "Name" => Some("Ayla".to_string()),
            "Gold" => Some("12".to_string()),
            _ => None,
        });
        assert_eq!(text, "Hello Ayla, you have 12 gold.");
    }

    #[test]
    fn test_unknown_placeholder_kept() {
        let text = format_named("{Known} and {Unknown}", |name| {
            (name == "Known").then(|| "yes".to_string())
        });
        assert_eq!(text, "yes and {Unknown}");
    }

    #[test]
    fn test_malformed_braces_are_literal() {
        assert!(placeholder_names("a { b } {} {open").is_empty());
        assert_eq!(format_named("{} {x", |_| Some("v".into())), "{} {x");
    }

    #[test]
    fn test_nested_braces_resolve_inner_placeholder() {
        assert_eq!(placeholder_names("{{Name}}"), vec!["Name".to_string()]);
        assert_eq!(format_named("{{Name}}", |_| Some("Ayla".into())), "{Ayla}");
    }

    #[test]
    fn test_replacement_is_not_rescanned() {
        let text = format_named("{A} {B}", |name| match name {
            "A" => Some("{B}".to_string()),
            _ => Some("b".to_string()),
        });
        assert_eq!(text, "{B} b");
    }

    #[test]
    fn test_unicode_text() {
        let text = format_named("Grüß dich, {Name}…", |_| Some("Jörg".to_string()));
        assert_eq!(text, "Grüß dich, Jörg…");
    }
}
