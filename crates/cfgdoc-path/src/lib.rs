//! Addressing and query language over cfgdoc node trees.
//!
//! - [`Path`]: absolute location made of key, index and predicate segments,
//!   with a slash-delimited text form that round-trips keys containing
//!   spaces, brackets and other reserved characters
//! - [`SearchExpr`]: path syntax plus `*`, `**` and bracketed
//!   [`Predicate`]s, evaluated lazily in document order
//! - [`SearchResults`]: restartable results over an owned document snapshot

mod lexer;
pub mod path;
pub mod predicate;
mod resolve;
pub mod search;

pub use path::{Path, PathSegment};
pub use predicate::Predicate;
pub use search::{Matches, SearchExpr, SearchMatch, SearchResults, Selector, Step};
