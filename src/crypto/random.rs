//! Cryptographically secure randomness.
//!
//! `SecureRandom` is the single source of secure random bytes for the
//! process. It wraps the operating system's entropy source and refuses to
//! construct when that source is unavailable; there is deliberately no
//! fallback to a non-secure generator.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::core::{CryptoError, MAX_RANDOM_SPAN};

/// Facade over the platform's cryptographically secure byte source.
///
/// Construction probes the source once so that a missing or broken entropy
/// device fails fast at startup instead of at first use.
#[derive(Debug, Clone, Copy)]
pub struct SecureRandom {
    _probed: (),
}

impl SecureRandom {
    /// Create a new handle, verifying the OS entropy source is usable.
    ///
    /// # Errors
    /// Returns [`CryptoError::InsecureEntropySource`] if the platform
    /// cannot supply secure random bytes.
    pub fn new() -> Result<Self, CryptoError> {
        let mut probe = [0u8; 1];
        OsRng
            .try_fill_bytes(&mut probe)
            .map_err(|e| CryptoError::InsecureEntropySource(e.to_string()))?;
        Ok(Self { _probed: () })
    }

    /// Fill `buf` with secure random bytes.
    pub fn fill(&self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }

    /// Return `n` secure random bytes.
    pub fn bytes(&self, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        self.fill(&mut buf);
        buf
    }

    /// Return a uniform integer in `[min, max)`.
    ///
    /// Uses rejection sampling: draw the minimal number of bytes covering
    /// the span, mask to the span's bit width, and redraw any value that
    /// falls outside. This removes modulo bias exactly rather than
    /// approximately.
    ///
    /// # Errors
    /// - [`CryptoError::InvalidRange`] if `max <= min`.
    /// - [`CryptoError::RangeTooWide`] if the span exceeds 2^31 values.
    pub fn int_range(&self, min: i64, max: i64) -> Result<i64, CryptoError> {
        if max <= min {
            return Err(CryptoError::InvalidRange { min, max });
        }
        let span = max.wrapping_sub(min) as u64;
        if span > MAX_RANDOM_SPAN {
            return Err(CryptoError::RangeTooWide { span });
        }
        if span == 1 {
            return Ok(min);
        }

        // Minimal bit width covering span-1, and the byte count to draw.
        let bits = 64 - (span - 1).leading_zeros();
        let nbytes = ((bits + 7) / 8) as usize;
        let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };

        let mut buf = [0u8; 8];
        loop {
            self.fill(&mut buf[..nbytes]);
            let mut value: u64 = 0;
            for byte in &buf[..nbytes] {
                value = (value << 8) | u64::from(*byte);
            }
            value &= mask;
            if value < span {
                return Ok(min + value as i64);
            }
            // Out of range: discard and redraw.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_produces_nonzero_output() {
        let rng = SecureRandom::new().unwrap();
        let mut buf = [0u8; 64];
        rng.fill(&mut buf);
        // 64 zero bytes from a working CSPRNG is a 2^-512 event.
        assert!(buf.iter().any(|b| *b != 0));
    }

    #[test]
    fn test_bytes_length() {
        let rng = SecureRandom::new().unwrap();
        assert_eq!(rng.bytes(0).len(), 0);
        assert_eq!(rng.bytes(17).len(), 17);
        assert_eq!(rng.bytes(1024).len(), 1024);
    }

    #[test]
    fn test_int_range_bounds() {
        let rng = SecureRandom::new().unwrap();
        for _ in 0..1000 {
            let v = rng.int_range(0, 10).unwrap();
            assert!((0..10).contains(&v));
        }
        for _ in 0..1000 {
            let v = rng.int_range(-50, -40).unwrap();
            assert!((-50..-40).contains(&v));
        }
    }

    #[test]
    fn test_int_range_covers_every_value() {
        let rng = SecureRandom::new().unwrap();
        let mut seen = [false; 10];
        // 10,000 draws miss a given value with probability ~(0.9)^10000.
        for _ in 0..10_000 {
            let v = rng.int_range(0, 10).unwrap();
            seen[v as usize] = true;
        }
        assert!(seen.iter().all(|s| *s), "biased exclusion: {seen:?}");
    }

    #[test]
    fn test_int_range_single_value() {
        let rng = SecureRandom::new().unwrap();
        assert_eq!(rng.int_range(7, 8).unwrap(), 7);
    }

    #[test]
    fn test_int_range_rejects_inverted() {
        let rng = SecureRandom::new().unwrap();
        assert!(matches!(
            rng.int_range(10, 10),
            Err(CryptoError::InvalidRange { .. })
        ));
        assert!(matches!(
            rng.int_range(10, 0),
            Err(CryptoError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_int_range_rejects_wide_span() {
        let rng = SecureRandom::new().unwrap();
        assert!(matches!(
            rng.int_range(0, (1i64 << 31) + 1),
            Err(CryptoError::RangeTooWide { .. })
        ));
        // Exactly 2^31 is the last accepted span.
        assert!(rng.int_range(0, 1i64 << 31).is_ok());
    }

    #[test]
    fn test_int_range_power_of_two_span() {
        let rng = SecureRandom::new().unwrap();
        for _ in 0..100 {
            let v = rng.int_range(0, 256).unwrap();
            assert!((0..256).contains(&v));
        }
    }
}
