//! High-level API for cfgdoc.
//!
//! [`Configuration`] ties a [`Registry`] to a storage stack and offers
//! typed load and persist with optimistic locking, reference following and
//! identity lookup. This is the main entry point for applications.

pub mod config;
pub mod configuration;
pub mod error;

pub use config::EngineConfig;
pub use configuration::Configuration;
pub use error::{SdkError, SdkResult};

// Re-export key types
pub use cfgdoc_binding::{
    ClassDescriptor, ConfigObject, Configurable, PropertyDescriptor, Reference, Registry,
    ResolverConfig, Value, ValueKind,
};
pub use cfgdoc_olock::OlockHash;
pub use cfgdoc_path::{Path, SearchResults};
pub use cfgdoc_refs::Bound;
pub use cfgdoc_store::{InMemoryStorage, JsonFileStorage, Storage};
pub use cfgdoc_types::{ConfigError, Node};
