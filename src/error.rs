//! Error types for the trade bot

use thiserror::Error;

/// Main error type for the trade bot
#[derive(Error, Debug)]
pub enum TradeBotError {
    // Protocol errors
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Trade session gone: {0}")]
    SessionGone(String),

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    // Settings errors
    #[error("Settings persistence failed: {0}")]
    Persistence(#[from] PersistenceFailure),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfig(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure to write or read the settings file.
///
/// Returned from the settings store so callers can log it; trade logic never
/// depends on it.
#[derive(Error, Debug)]
pub enum PersistenceFailure {
    #[error("settings file I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("settings file is not UTF-8")]
    Encoding,

    #[error("unexpected settings root element <{0}>")]
    UnexpectedRoot(String),
}

/// Result type alias for trade bot operations
pub type Result<T> = std::result::Result<T, TradeBotError>;
