//! # lib_onebot
//!
//! Client-side gateway for OneBot v11 implementations (NapCat and friends).
//!
//! The crate is split the same way the data flows:
//!
//! - **`transport`**: owns the WebSocket, reconnects on failure and correlates
//!   outbound `call`s with their responses through the `echo` field.
//! - **`events`**: turns a raw JSON push frame into a typed [`events::Event`].
//! - **`core`**: the [`crate::core::Dispatcher`] with its handler registry, the
//!   permission resolver and the blocking worker pool.
//! - **`api`**: the [`api::Bot`] handle handed to every handler.
//! - **`connections`**: file backed stores and the optional Redis cache.
//! - **`configs`**: the runtime configuration consumed by all of the above.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod api;
pub mod configs;
pub mod connections;
pub mod core;
pub mod error;
pub mod events;
pub mod transport;

// --- Public API Re-exports ---
pub use api::{Bot, BotApi, MessageSegment};
pub use configs::BotConfig;
pub use crate::core::{
    CommandSpec, Dispatcher, Handler, HandlerContext, HandlerResult, Param, PermissionLevel,
    PermissionResolver, PluginMeta, PluginUnit,
};
pub use events::{classify, Event};
pub use transport::OneBotClient;
