//! Foundation types for cfgdoc.
//!
//! This crate provides the document model shared by every other cfgdoc
//! crate: the [`Node`] tree that typed configuration objects are bound to,
//! the reserved keys that carry identity and optimistic-lock hashes, and the
//! single [`ConfigError`] taxonomy used across binding, hashing, reference
//! resolution and storage.
//!
//! # Key Types
//!
//! - [`Node`]: Universal document value (null, bool, number, string, list, object)
//! - [`NodeMap`]: Insertion-ordered object map with unique keys
//! - [`ConfigError`]: Error taxonomy for all engine operations

pub mod error;
pub mod keys;
pub mod node;

pub use error::{ConfigError, Result};
pub use keys::{is_reserved_key, OLD_OLOCK_HASH_KEY, OLOCK_HASH_KEY, UUID_KEY};
pub use node::{format_number, Node, NodeMap};
