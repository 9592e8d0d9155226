/// Queued administrative actions submitted by the dashboard
pub mod action;
/// checks for permission to execute a specific command
pub mod checks;
/// All available discord commands
pub mod commands;
/// The persisted guild document
pub mod data;
/// discord setup
pub mod discord;
/// Gateway event handling (xp, reaction roles, welcome)
pub mod events;
/// Remote state store client (GitHub Contents API)
pub mod github;
/// Self-ping task to keep the host awake
pub mod keepalive;
pub mod logger;
/// Executes queued actions against the live session
pub mod executor;
/// Background drain loop for the action queue
pub mod processor;
/// The shared action queue
pub mod queue;
/// Bot Settings
pub mod settings;
/// Document ownership and persistence policy
pub mod store;
mod task;

pub use anyhow::Result;
