//! Core constants, and error types shared by every TETHER layer.

pub mod constants;
pub mod error;

pub use constants::*;
pub use error::{CryptoError, TetherError, TransportError};
