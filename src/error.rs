//! Error types for the dispatcher.

use thiserror::Error;

/// Result type alias using the dispatcher's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the dispatcher and its node adapters.
///
/// No-op guards (no player bound, index out of range, empty queue) are not
/// errors and never produce one of these.
#[derive(Error, Debug)]
pub enum Error {
    /// A track record was built from an absent or unusable source.
    #[error("Track is not provided")]
    InvalidTrack,

    #[error("Invalid loop mode: {0} (expected off, repeat or queue)")]
    InvalidLoopMode(String),

    /// The audio node answered with a non-success status.
    #[error("Lavalink node returned {status}: {message}")]
    Node { status: u16, message: String },

    /// Player calls need the session id handed out by the node's `ready` frame.
    #[error("Lavalink session not established yet")]
    NoSession,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid node URL: {0}")]
    Url(#[from] url::ParseError),

    /// Leaving the voice channel failed.
    #[error("Voice error: {0}")]
    Voice(String),
}
