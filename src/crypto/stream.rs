//! Sequential nonce generation for chunked authenticated encryption.
//!
//! One `StreamNonceSequencer` covers one symmetrically-encrypted stream
//! (e.g. a large file upload). Every chunk gets a distinct 24-byte nonce:
//!
//! ```text
//! [ flag (1) | chunk counter (4, big-endian) | random tail (19) ]
//! ```
//!
//! The tail is fixed for the sequencer's lifetime, so two sequencers with
//! different seeds can never collide; within one sequencer the counter
//! strictly increases and the flag byte flips exactly once, on the final
//! chunk, letting the decrypting side detect truncation.

use crate::core::{
    CryptoError, NONCE_SIZE, STREAM_COUNTER_OFFSET, STREAM_COUNTER_SIZE, STREAM_FLAG_OFFSET,
    STREAM_LAST_CHUNK, STREAM_TAIL_OFFSET,
};

use super::random::SecureRandom;

/// Per-stream sequential nonce generator.
#[derive(Debug)]
pub struct StreamNonceSequencer {
    /// Working nonce buffer; bytes past [`STREAM_TAIL_OFFSET`] never change.
    nonce: [u8; NONCE_SIZE],
    /// Counter written into the next nonce.
    chunk_id: u32,
    /// Counter of the final chunk.
    max_chunk_id: u32,
    /// Set once the final nonce has been produced.
    eof: bool,
}

impl StreamNonceSequencer {
    /// Create a sequencer covering chunks `start_chunk..=max_chunk`.
    ///
    /// `start_chunk > 0` resumes a partially-transferred stream at an
    /// arbitrary offset; in that case the original `seed` must be supplied
    /// so the random tail matches the earlier chunks. Without a seed a
    /// fresh one is drawn from `rng`.
    ///
    /// A `start_chunk` beyond `max_chunk` yields an already-exhausted
    /// sequencer: the first [`Self::next_nonce`] fails instead of emitting
    /// an out-of-range counter.
    pub fn new(
        start_chunk: u32,
        max_chunk: u32,
        seed: Option<[u8; NONCE_SIZE]>,
        rng: &SecureRandom,
    ) -> Self {
        let mut nonce = match seed {
            Some(seed) => seed,
            None => {
                let mut fresh = [0u8; NONCE_SIZE];
                rng.fill(&mut fresh);
                fresh
            }
        };
        // Flag and counter fields are rewritten per call; only the tail of
        // the seed carries state.
        nonce[STREAM_FLAG_OFFSET] = 0;
        nonce[STREAM_COUNTER_OFFSET..STREAM_TAIL_OFFSET].fill(0);

        Self {
            nonce,
            chunk_id: start_chunk,
            max_chunk_id: max_chunk,
            eof: start_chunk > max_chunk,
        }
    }

    /// Counter that the next nonce will carry.
    pub fn chunk_id(&self) -> u32 {
        self.chunk_id
    }

    /// Whether the final nonce has been produced.
    pub fn eof(&self) -> bool {
        self.eof
    }

    /// The seed of this sequencer (flag/counter fields zeroed).
    ///
    /// Persist this alongside upload state to resume the stream later.
    pub fn seed(&self) -> [u8; NONCE_SIZE] {
        let mut seed = self.nonce;
        seed[STREAM_FLAG_OFFSET] = 0;
        seed[STREAM_COUNTER_OFFSET..STREAM_TAIL_OFFSET].fill(0);
        seed
    }

    /// Produce the nonce for the next chunk.
    ///
    /// The final chunk's nonce carries the last-chunk flag and marks the
    /// sequencer exhausted.
    ///
    /// # Errors
    /// [`CryptoError::StreamExhausted`] if the final nonce was already
    /// produced. This is a hard protocol-violation guard: another nonce
    /// would either repeat a previous one or silently continue a stream
    /// already marked complete.
    pub fn next_nonce(&mut self) -> Result<[u8; NONCE_SIZE], CryptoError> {
        if self.eof {
            return Err(CryptoError::StreamExhausted);
        }

        self.nonce[STREAM_COUNTER_OFFSET..STREAM_COUNTER_OFFSET + STREAM_COUNTER_SIZE]
            .copy_from_slice(&self.chunk_id.to_be_bytes());

        if self.chunk_id == self.max_chunk_id {
            self.nonce[STREAM_FLAG_OFFSET] = STREAM_LAST_CHUNK;
            self.eof = true;
        } else {
            self.chunk_id += 1;
        }

        Ok(self.nonce)
    }
}
