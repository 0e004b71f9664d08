//! Error types for the TETHER protocol.

use thiserror::Error;

/// Errors in the crypto layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// No cryptographically secure byte source is available.
    ///
    /// This is fatal at startup: falling back to a non-secure source
    /// is never acceptable.
    #[error("no secure randomness source available: {0}")]
    InsecureEntropySource(String),

    /// Invalid bounds passed to a bounded random integer.
    #[error("invalid random range: min {min} must be below max {max}")]
    InvalidRange {
        /// Inclusive lower bound.
        min: i64,
        /// Exclusive upper bound.
        max: i64,
    },

    /// Requested range exceeds the 31-bit span limit.
    #[error("random range spans {span} values, limit is 2^31")]
    RangeTooWide {
        /// Requested span (`max - min`).
        span: u64,
    },

    /// A stream nonce was requested after the final chunk was produced.
    ///
    /// Continuing would repeat a nonce or silently extend a stream that
    /// was already marked complete.
    #[error("stream nonce sequence exhausted: final chunk already produced")]
    StreamExhausted,

    /// Key material has the wrong size or encoding.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// The signing backend failed.
    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// Errors in the transport layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport is not currently connected.
    #[error("transport disconnected")]
    Disconnected,

    /// The method requires authentication and the auth gate is not passed.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Application-level rejection from the server. Never retried
    /// automatically.
    #[error("server error {code}: {message}")]
    Server {
        /// Application error code.
        code: i32,
        /// Human-readable message.
        message: String,
    },

    /// No reply arrived within the fixed call timeout.
    #[error("call timed out")]
    Timeout,

    /// Invalid transport configuration (e.g. missing endpoint URL).
    #[error("configuration error: {0}")]
    Config(String),

    /// Subscription to an event name outside the known sets.
    #[error("unknown event name: {0}")]
    UnknownEvent(String),
}

/// Top-level TETHER errors.
#[derive(Debug, Error)]
pub enum TetherError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Crypto error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
