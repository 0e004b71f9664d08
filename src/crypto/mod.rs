//! Cryptographic primitives for the TETHER session layer.
//!
//! Everything here sits below the encryption layer proper: secure
//! randomness, nonce/id generation, per-stream nonce sequencing, and the
//! detached-signature facade. The cipher constructions themselves are
//! consumed as black boxes by higher layers.

pub mod nonce;
pub mod random;
pub mod sign;
pub mod stream;

pub use nonce::{NonceFactory, UserSpecificId};
pub use random::SecureRandom;
pub use sign::{SignFn, SignFuture, SignatureFacade, VerifyFn, VerifyFuture};
pub use stream::StreamNonceSequencer;
