//! Error types for the searcher SDK.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid hex value: {message}")]
    InvalidHex { message: String },

    #[error("Failed to decode JSON-RPC frame: {message}")]
    Decode { message: String },

    #[error("Got JSON-RPC response for unknown id {id}")]
    UnknownCorrelation { id: String },

    #[error("Request `{method}` timed out after {timeout:?}")]
    RequestTimeout { method: String, timeout: Duration },

    #[error("Broken connection: {message}")]
    Liveness { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Not connected: listen() must be running before sending requests")]
    NotConnected,

    #[error("Notification handler error: {message}")]
    Handler { message: String },

    #[error("Signing error: {message}")]
    Signing { message: String },

    #[error("Bid userCallHash {actual} does not match lot transaction hash {expected}")]
    UserCallHashMismatch { expected: String, actual: String },

    #[error("Gave up after {attempts} connection attempts")]
    ReconnectsExhausted { attempts: u32 },
}

impl Error {
    /// Whether this error ends the auction session it occurred in.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::WebSocket(_)
                | Error::Liveness { .. }
                | Error::Transport { .. }
                | Error::NotConnected
        )
    }

    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Error::Transport {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
