//! Optimistic-lock hashing for cfgdoc node trees.
//!
//! - [`OlockEngine`]: deterministic, order-independent digests; stamps
//!   fresh hashes into every object that carries the `#olockhash` key
//! - [`OlockHash`]: 32-byte BLAKE3 digest, stored as base64
//! - [`DigestHasher`]: domain-separated hasher the engine is built on
//!
//! Storage backends use [`take_expected_hash`] and [`strip_side_fields`] to
//! implement compare-and-set on persist.

pub mod hasher;
pub mod olock;

pub use hasher::{DigestHasher, HashDecodeError, OlockHash};
pub use olock::{stored_hash, strip_side_fields, take_expected_hash, OlockEngine};
