//! # Transport Module
//!
//! The OneBot WebSocket client and its response correlation table.

/// Reconnecting WebSocket client implementing [`crate::api::BotApi`].
pub mod onebot_ws;

/// Outstanding calls keyed by their `echo` id.
pub mod pending;

// --- Re-exports ---
pub use onebot_ws::OneBotClient;
pub use pending::PendingCalls;
