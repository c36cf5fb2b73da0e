//! # Configuration Modules
//!
//! Runtime settings consumed by the transport, the dispatcher and the stores.
//! Loading them from files, environment and CLI is the binary's job.

/// The bot's runtime configuration and its validation rules.
pub mod bot_config;

pub use bot_config::{BotConfig, TransportSettings};
