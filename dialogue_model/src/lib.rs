//! # Dialogue Model
//!
//! The vocabulary shared by everything that touches a Parley dialogue:
//! identifiers, participant tags, the participant capability contract,
//! visit history records, text placeholder formatting and settings.
//! This crate holds data only and does not contain any traversal logic.

pub mod history;
pub mod ids;
pub mod participant;
pub mod settings;
pub mod text;

pub use history::*;
pub use ids::*;
pub use participant::*;
pub use settings::*;
pub use text::*;
