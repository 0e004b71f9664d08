//! Protocol constants for the TETHER transport and crypto layers.
//!
//! These values are fixed by the protocol and MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// CRYPTOGRAPHIC CONSTANTS
// =============================================================================

/// XChaCha20 nonce size (also the stream-nonce size).
pub const NONCE_SIZE: usize = 24;

/// Bytes of the nonce taken from the millisecond timestamp.
pub const NONCE_TIMESTAMP_PREFIX: usize = 4;

/// Ed25519 detached signature size.
pub const SIGNATURE_SIZE: usize = 64;

/// Ed25519 signing (secret) key size.
pub const SIGNING_KEY_SIZE: usize = 32;

/// Ed25519 verifying (public) key size.
pub const VERIFYING_KEY_SIZE: usize = 32;

/// User-specific id size: 16-byte keyed hash + 26 random bytes.
pub const USER_ID_SIZE: usize = 42;

/// Keyed-hash prefix of a user-specific id.
pub const USER_ID_HASH_PREFIX: usize = 16;

/// Digest size used for device ids.
pub const DEVICE_ID_HASH_SIZE: usize = 32;

/// Largest span accepted by bounded random integers (2^31).
pub const MAX_RANDOM_SPAN: u64 = 1 << 31;

// =============================================================================
// STREAM NONCE LAYOUT
// =============================================================================

/// Offset of the last-chunk flag byte.
pub const STREAM_FLAG_OFFSET: usize = 0;

/// Offset of the big-endian chunk counter.
pub const STREAM_COUNTER_OFFSET: usize = 1;

/// Size of the chunk counter field.
pub const STREAM_COUNTER_SIZE: usize = 4;

/// Offset of the per-stream random tail.
pub const STREAM_TAIL_OFFSET: usize = 5;

/// Flag value marking the final chunk of a stream.
pub const STREAM_LAST_CHUNK: u8 = 1;

// =============================================================================
// TRANSPORT TIMING
// =============================================================================

/// Fixed per-call timeout.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Base delay of the reconnect backoff.
pub const RECONNECT_BASE: Duration = Duration::from_millis(500);

/// Upper bound of the reconnect backoff.
pub const RECONNECT_CAP: Duration = Duration::from_millis(9000);

/// Concurrent in-flight calls allowed per method name.
pub const PACER_LIMIT: usize = 20;

// =============================================================================
// METHOD NAMESPACES
// =============================================================================

/// Methods under this prefix require a preauthenticated connection.
pub const AUTH_NAMESPACE: &str = "/auth/";

// =============================================================================
// SERVER ERROR CODES
// =============================================================================

/// Account was permanently closed; flips the current user's `deleted` flag.
pub const ERR_ACCOUNT_CLOSED: i32 = 4010;

/// Account was blacklisted; flips the current user's `blacklisted` flag.
pub const ERR_ACCOUNT_BLACKLISTED: i32 = 4011;

/// Server is throttling this connection.
pub const ERR_THROTTLED: i32 = 425;
