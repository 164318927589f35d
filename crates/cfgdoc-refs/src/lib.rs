//! References between objects in a cfgdoc document.
//!
//! A reference is stored as the canonical path of its target. Callers may
//! name a target by identity instead; the [`ReferenceEncoder`] turns those
//! into paths before a write, using the object being written and the
//! [`IdentityIndex`] kept by [`IndexingStorage`]. On the way back the
//! [`Resolver`] binds stored nodes and follows references one hop at a time.

pub mod encoder;
pub mod index;
pub mod indexing;
pub mod resolver;

pub use encoder::{IdentityLookup, ReferenceEncoder};
pub use index::{collect_identities, IdentityIndex};
pub use indexing::IndexingStorage;
pub use resolver::{Bound, Resolver};
