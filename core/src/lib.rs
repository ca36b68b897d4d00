//! Core library for the dual-provider chat client.
//!
//! The modules are kept small so the boundaries between responsibilities
//! stay obvious when exploring the codebase:
//! - [`agents`] talks to the two backends and normalises what they return.
//! - [`conversation`] owns the message log and the `send` orchestration.
//! - [`models`] defines the records shared with the rendering layer.
//! - [`api`] exposes the command surface front ends invoke.
//! - [`db`] initialises the SQLite database and applies migrations.
//! - [`errors`] keeps the error catalogue with human friendly metadata.
//! - [`logging`] writes structured diagnostics to the event log table.

pub mod agents;
pub mod api;
pub mod conversation;
pub mod db;
pub mod errors;
pub mod logging;
pub mod models;

pub use conversation::{ConversationStore, Exchange};
pub use errors::{SendError, TransportError};
pub use models::{AssistantReply, Confidence, ConversationSnapshot, Message, Mode, Role};
