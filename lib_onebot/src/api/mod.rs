//! # API Module
//!
//! The call interface handed to handlers and its message building blocks.

/// [`Bot`] facade over [`BotApi::call`].
pub mod bot;

/// Array-form message segments.
pub mod segment;

// --- Re-exports ---
pub use bot::{call_failed, Bot, BotApi, LoginInfo};
pub use segment::{IntoMessage, MessageSegment};
