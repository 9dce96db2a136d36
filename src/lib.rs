//! Issuebot: a single-user Telegram bot over an issue tracker, a source
//! host and a task runner, with an agent runtime behind it.

pub mod agent;
pub mod bot;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod delivery;
pub mod error;
pub mod forge;
pub mod markup;
pub mod pending;
pub mod progress;
pub mod runner;
pub mod stt;
pub mod tracker;
pub mod transport;

pub use error::{Error, Result};

/// Identifies a chat on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatRef(pub i64);

/// Identifies a message within a chat, as needed for later edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub i32);
