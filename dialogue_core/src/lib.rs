//! # Dialogue Core
//!
//! Runs branching dialogues authored as graphs. This crate holds the graph
//! types, the condition and event evaluator, the process-wide ledger of
//! visited nodes and the [`DialogueContext`] that walks a graph for one
//! conversation.
//!
//! ## Core Components
//!
//! - **graph**: Nodes, edges, conditions, events and text arguments
//! - **memory**: The visited-node ledger shared across conversations
//! - **context**: Participant binding, the node state machine and read accessors
//!
//! ## Design Philosophy
//!
//! - **Shared graphs**: A built [`Dialogue`] is immutable; any number of contexts run it at once
//! - **Borrowed participants**: The game owns its participants, contexts only hold weak references
//! - **Fail soft**: Broken content ends the conversation with an error instead of panicking

pub mod context;
pub mod error;
pub mod graph;
pub mod memory;

#[cfg(test)]
mod test_support;

pub use context::*;
pub use error::DialogueError;
pub use graph::*;
pub use memory::*;
