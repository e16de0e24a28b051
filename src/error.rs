//! Error types for the intake engine.
//!
//! Per-boundary failure kinds: nothing here is fatal to the process. Fetch
//! failures skip the source for one cycle, side-effect failures surface as
//! qualifiers in the decision report, resolution misses downgrade to a
//! generic failure. The only fatal condition is missing required
//! configuration at startup.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sheet error: {0}")]
    Sheet(#[from] SheetError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Decision error: {0}")]
    Decision(#[from] DecisionError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}

/// Configuration-related errors. Missing required config is the only
/// process-ending condition.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Tabular-source errors — reading or writing a sheet range.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("Fetch failed for {source}: {reason}")]
    FetchFailed { r#source: String, reason: String },

    #[error("Update failed for {source}: {reason}")]
    UpdateFailed { r#source: String, reason: String },

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Call to {source} timed out")]
    Timeout { r#source: String },
}

/// Messaging/directory transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to send to channel {channel}: {reason}")]
    SendFailed { channel: String, reason: String },

    #[error("Direct message to {handle} failed: {reason}")]
    DirectFailed { handle: String, reason: String },

    #[error("Role grant failed for {handle}: {reason}")]
    RoleGrantFailed { handle: String, reason: String },

    #[error("Member lookup failed for {handle}: {reason}")]
    LookupFailed { handle: String, reason: String },

    #[error("Transport call timed out: {0}")]
    Timeout(String),
}

/// Decision-path errors.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("Malformed action tag: {0}")]
    BadActionTag(String),

    #[error("No source has a row at reference {row}")]
    RowNotFound { row: u32 },

    #[error("Row {row} in {source} already decided: {status}")]
    AlreadyDecided {
        r#source: String,
        row: u32,
        status: String,
    },
}

/// Durable-state errors. A corrupt state file is *not* one of these —
/// that loads as empty state by design.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to persist state to {path}: {reason}")]
    PersistFailed { path: String, reason: String },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
