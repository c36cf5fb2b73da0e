//! # Core Module
//!
//! Dispatch machinery: handler registration, permission gating and the
//! worker pool for blocking handlers.

/// Routes classified events to handlers.
pub mod dispatcher;

/// Bounded pool for blocking handlers.
pub mod executor;

/// Permission levels, store traits and the resolver.
pub mod permission;

/// Handler types and plugin units.
pub mod registry;

// --- Re-exports ---
pub use dispatcher::{denial_message, parse_command, Dispatcher, HELP_PLUGIN_ID};
pub use executor::WorkerPool;
pub use permission::{AdminStore, LevelStore, PermissionLevel, PermissionResolver};
pub use registry::{
    CommandSpec, Handler, HandlerContext, HandlerResult, Param, PluginMeta, PluginUnit,
};
