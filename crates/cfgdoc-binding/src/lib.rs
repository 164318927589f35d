//! Type binding for cfgdoc.
//!
//! Typed configuration objects are described once as [`ClassDescriptor`]s
//! and registered in a [`Registry`]. The registry picks a [`TypeAdapter`]
//! per [`ValueKind`]; the [`Binder`] uses them to turn a [`ConfigObject`]
//! into a [`Node`](cfgdoc_types::Node) tree and back, after the
//! [`Normalizer`] has filled in defaults.
//!
//! # Key Types
//!
//! - [`Registry`]: Class descriptors, extension registrations, opaque adapters
//! - [`Binder`]: Object ⇄ node conversion, including [`Configurable`] types
//! - [`BindContext`]: Reference resolution settings and collected diagnostics
//! - [`Normalizer`]: Idempotent default filling and scalar coercion
//! - [`walk`]: Visits nested objects and references at their storage paths

pub mod adapter;
pub mod adapters;
pub mod binder;
pub mod context;
pub mod descriptor;
pub mod normalize;
pub mod registry;
pub mod schema;
pub mod value;
pub mod walk;

#[cfg(test)]
mod testing;

pub use adapter::TypeAdapter;
pub use adapters::{
    ArrayAdapter, Base64Adapter, CollectionAdapter, EnumAdapter, ExtensionMapAdapter,
    MapAdapter, PrimitiveAdapter, ReferenceAdapter, ReflectiveAdapter, X509Adapter,
};
pub use binder::{Binder, Configurable};
pub use context::{
    BindContext, Diagnostic, DiagnosticKind, ReferenceLoader, ReferencePolicy, ResolveMode,
    ResolverConfig,
};
pub use descriptor::{
    ClassDescriptor, CollectionKind, EnumRepresentation, EnumType, PrimitiveKind,
    PropertyDescriptor, SetterGroup, ValueKind,
};
pub use normalize::Normalizer;
pub use registry::Registry;
pub use schema::SchemaContext;
pub use value::{ConfigObject, ParentHandle, Reference, Value};
pub use walk::{walk, Visitor};
