//! # Events Module
//!
//! Typed OneBot v11 push events and the pure classification function that
//! builds them from raw frames.
//!
//! Every event carries `time` and `self_id`; the category specific payload
//! lives in [`EventKind`]. Unknown subtypes degrade to an `Unknown` variant of
//! their category so protocol additions never break routing. Only an unknown
//! top-level `post_type` is an error.

/// Typed event variants.
pub mod model;
/// Raw frame to typed event conversion.
pub mod classify;

pub use classify::classify;
pub use model::{
    Anonymous, ClientStatus, Event, EventKind, GroupFile, HeartbeatStatus, MessageBody,
    MessageEvent, MetaEvent, NoticeEvent, NotifyEvent, OfflineFile, PostType, RequestEvent, Sender,
};
