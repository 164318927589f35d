//! Storage for cfgdoc documents.
//!
//! Every backend and decorator implements the [`Storage`] contract: CRUD
//! and search over one hierarchical [`Node`](cfgdoc_types::Node) document,
//! with optimistic-lock checking on writes.
//!
//! # Backends
//!
//! - [`InMemoryStorage`]: `RwLock` around a copy-on-write document
//! - [`JsonFileStorage`]: single JSON file, replaced atomically on write
//!
//! # Decorators
//!
//! - [`CachingStorage`]: read cache with one in-flight load per key
//! - [`DefaultingStorage`]: normalizes hinted reads against their class
//!
//! # Write Rules
//!
//! 1. A node carrying `#old_olockhash` replaces the stored node only if the
//!    stored node's digest equals it; otherwise the write is a creation.
//! 2. Side fields are stripped before anything is stored.
//! 3. A failed write leaves the document and the file on disk unchanged.

pub mod caching;
pub mod defaulting;
mod document;
pub mod json_file;
pub mod memory;
pub mod traits;

pub use caching::CachingStorage;
pub use defaulting::DefaultingStorage;
pub use json_file::JsonFileStorage;
pub use memory::InMemoryStorage;
pub use traits::{Storage, StorageLoader};
