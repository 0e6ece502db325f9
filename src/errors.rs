//! Error types shared across the worker.

use std::fmt::{Display, Formatter};

/// Shared worker result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Worker error enumeration covering all failure modes.
///
/// Only [`AppError::Control`] and the domain variants ever reach the
/// coordinator, and then only as the `error` text of an `api_response` or a
/// `{type:error}` message. A forced kickout is not an error value: it is a
/// lifecycle event handled by the worker.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Game connection lost or could not be opened.
    Transport(String),
    /// Malformed or unexpected reply from the game service.
    Protocol(String),
    /// The game service rejected an action.
    Domain(String),
    /// Malformed or unknown control-channel command.
    Control(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// File-system or stream I/O failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Domain(msg) => write!(f, "domain: {msg}"),
            Self::Control(msg) => write!(f, "control: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Message text without the category prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Config(msg)
            | Self::Transport(msg)
            | Self::Protocol(msg)
            | Self::Domain(msg)
            | Self::Control(msg)
            | Self::NotFound(msg)
            | Self::Io(msg) => msg,
        }
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("invalid json: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
