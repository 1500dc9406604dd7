//! Participants - the external game objects a dialogue talks about.
//!
//! - **ParticipantTag**: hierarchical identifier a participant is bound under
//! - **DialogueParticipant**: capability contract every bound object implements
//! - **AssetRef**: opaque handle for icons, voices and other assets

mod capability;
mod tag;

pub use capability::*;
pub use tag::*;
