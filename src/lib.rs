//! # TETHER Protocol
//!
//! **T**rusted **E**nd-to-end **T**ransport for **H**ardened
//! **E**ncrypted **R**PC
//!
//! TETHER is the secure transport and cryptographic session layer of an
//! end-to-end-encrypted collaboration client. It provides:
//!
//! - **Reliability**: One logical connection with automatic reconnection
//!   and capped exponential backoff
//! - **Multiplexing**: Concurrent calls correlated by id, paced per
//!   method, with a fixed per-call timeout
//! - **Auth gating**: Authenticated-namespace calls rejected locally
//!   until the server accepts credentials
//! - **Crypto plumbing**: Probed secure randomness, nonce and identifier
//!   derivation, stream nonce sequencing, detached Ed25519 signatures
//!
//! ## Feature Flags
//!
//! - `transport` (default): RPC client, pacing, reconnection, events
//! - `crypto` (default): Randomness, nonces, signatures, stream sequencing
//!
//! ## Modules
//!
//! - [`core`]: Constants and error types (always included)
//! - [`transport`]: Transport layer (requires `transport` feature)
//! - [`crypto`]: Cryptographic session layer (requires `crypto` feature)
//!
//! ## Example Usage
//!
//! Sequencing nonces for a three-chunk encrypted stream:
//!
//! ```rust
//! use tether_protocol::prelude::*;
//!
//! # fn main() -> Result<(), tether_protocol::TetherError> {
//! let rng = SecureRandom::new()?;
//! let mut sequencer = StreamNonceSequencer::new(0, 2, None, &rng);
//! while !sequencer.eof() {
//!     let nonce = sequencer.next_nonce()?;
//!     assert_eq!(nonce.len(), 24);
//! }
//! assert!(sequencer.next_nonce().is_err());
//! # Ok(())
//! # }
//! ```
//!
//! Talking to a server (requires a [`Connector`](transport::Connector)
//! implementation for the actual wire):
//!
//! ```rust,ignore
//! let client = RpcClient::new(connector, RpcConfig::default());
//! client.start("wss://tether.example").await?;
//! let digest = client.send("digest.get", serde_json::json!({})).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;

#[cfg(feature = "crypto")]
#[cfg_attr(docsrs, doc(cfg(feature = "crypto")))]
pub mod crypto;

#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

pub use crate::core::{CryptoError, TetherError, TransportError};

/// Commonly used items, importable in one line.
pub mod prelude {
    pub use crate::core::{CryptoError, TetherError, TransportError};

    #[cfg(feature = "crypto")]
    pub use crate::crypto::{
        NonceFactory, SecureRandom, SignatureFacade, StreamNonceSequencer, UserSpecificId,
    };

    #[cfg(feature = "transport")]
    pub use crate::transport::{
        Connector, RpcClient, RpcConfig, Subscription, TransportState, WireConnection,
    };
}
