//! Error types shared by the store, codec and session.

use thiserror::Error;

/// Errors produced while encoding or decoding request data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The request type is JSON but the payload text does not parse.
    #[error("Invalid JSON payload: {0}")]
    InvalidJsonPayload(String),
}

/// Errors surfaced to the caller of `Store::dispatch`.
///
/// Unknown action names never produce one of these; they are ignored.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The request method is not one the executor understands.
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// A known action arrived with a payload of the wrong shape.
    #[error("Invalid payload for {action}: {reason}")]
    InvalidPayload { action: String, reason: String },

    /// The synthesized or supplied request cannot be sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A send was attempted outside an async runtime.
    #[error("No async runtime to run the request on: {0}")]
    NoRuntime(String),
}
