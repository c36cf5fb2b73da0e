//! Error types shared across the crate.
//!
//! Call failures are not here: `call` reports them as a structured JSON
//! value instead of an `Err` (see `transport::onebot_ws`).

use thiserror::Error;

/// Raised by [`crate::events::classify`] when a frame cannot become an event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("Unknown event type: {0}")]
    UnknownPostType(String),

    #[error("Event frame is missing the post_type field")]
    MissingPostType,

    #[error("Event frame is not a JSON object")]
    NotAnObject,
}

/// Raised while building a plugin unit, never during dispatch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Handler for {0} must be asynchronous")]
    BlockingHandler(String),

    #[error("Invalid command name {0:?}: must be non-empty and contain no whitespace")]
    InvalidCommandName(String),

    #[error("Handler for {kind} cannot request the {param} parameter")]
    UnsupportedParam { kind: String, param: &'static str },
}

/// Failures of the persistent stores and the Redis cache.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error occurred: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Redis error occurred: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Failures of the permission mutation operations.
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("User {0} is an admin; remove them from the admin list first")]
    PrincipalIsAdmin(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Raised by [`crate::configs::BotConfig::validate`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("The WebSocket endpoint URI is not configured")]
    MissingEndpoint,

    #[error("At least one command prefix is required")]
    NoPrefixes,

    #[error("Command prefixes must be non-empty strings")]
    EmptyPrefix,

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
}

/// Failures while opening or running one WebSocket session. These never
/// escape the reconnect loop; they are logged and retried.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid bearer token header")]
    InvalidToken,

    #[error("Connection closed by remote host")]
    Closed,
}

/// Raised when a blocking handler could not be run on the worker pool.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Worker pool is shut down")]
    Closed,

    #[error("Blocking handler panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),
}
