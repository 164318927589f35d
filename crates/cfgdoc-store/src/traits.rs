//! The [`Storage`] trait every backend and decorator implements.

use std::sync::Arc;

use cfgdoc_binding::ReferenceLoader;
use cfgdoc_path::{Path, SearchExpr, SearchResults};
use cfgdoc_types::{ConfigError, Node, Result};

/// CRUD and search over one hierarchical document.
///
/// Implementations must be thread-safe and must never partially apply a
/// write: a failed `persist_node` or `remove_node` leaves the document as it
/// was. Decorators keep the exact error semantics of the storage they wrap.
pub trait Storage: Send + Sync {
    /// The node at `path`. `class_hint` names the class the caller will bind
    /// it to, for decorators that need it.
    ///
    /// Returns `NotFound` if nothing is stored there.
    fn get_node(&self, path: &Path, class_hint: Option<&str>) -> Result<Node>;

    /// Store `node` at `path`.
    ///
    /// If the root object of `node` carries an `#old_olockhash` side field,
    /// the write only succeeds when the digest of the node currently stored
    /// at `path` equals it (`Conflict` otherwise, including when nothing is
    /// stored). Without it the write is a creation and fails with
    /// `AlreadyExists` if a node is present. Side fields are not stored.
    fn persist_node(&self, path: &Path, node: Node, class_hint: Option<&str>) -> Result<()>;

    /// Delete the node at `path`. Returns `NotFound` if nothing is stored.
    fn remove_node(&self, path: &Path) -> Result<()>;

    fn node_exists(&self, path: &Path) -> Result<bool>;

    /// Evaluate `expr` over a snapshot of the document. The results can be
    /// iterated any number of times and do not see later writes.
    fn search(&self, expr: &SearchExpr) -> Result<SearchResults>;

    /// `path` with predicate segments replaced by the keys and indices they
    /// select. `Ok(None)` if the path does not lead to a node.
    fn canonical_path(&self, path: &Path) -> Result<Option<Path>>;
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn get_node(&self, path: &Path, class_hint: Option<&str>) -> Result<Node> {
        (**self).get_node(path, class_hint)
    }

    fn persist_node(&self, path: &Path, node: Node, class_hint: Option<&str>) -> Result<()> {
        (**self).persist_node(path, node, class_hint)
    }

    fn remove_node(&self, path: &Path) -> Result<()> {
        (**self).remove_node(path)
    }

    fn node_exists(&self, path: &Path) -> Result<bool> {
        (**self).node_exists(path)
    }

    fn search(&self, expr: &SearchExpr) -> Result<SearchResults> {
        (**self).search(expr)
    }

    fn canonical_path(&self, path: &Path) -> Result<Option<Path>> {
        (**self).canonical_path(path)
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn get_node(&self, path: &Path, class_hint: Option<&str>) -> Result<Node> {
        (**self).get_node(path, class_hint)
    }

    fn persist_node(&self, path: &Path, node: Node, class_hint: Option<&str>) -> Result<()> {
        (**self).persist_node(path, node, class_hint)
    }

    fn remove_node(&self, path: &Path) -> Result<()> {
        (**self).remove_node(path)
    }

    fn node_exists(&self, path: &Path) -> Result<bool> {
        (**self).node_exists(path)
    }

    fn search(&self, expr: &SearchExpr) -> Result<SearchResults> {
        (**self).search(expr)
    }

    fn canonical_path(&self, path: &Path) -> Result<Option<Path>> {
        (**self).canonical_path(path)
    }
}

/// Adapts a [`Storage`] for eager reference loading while binding.
///
/// Targets are read without a class hint; the reference adapter normalizes
/// them against the referenced class itself.
pub struct StorageLoader<'a, S: ?Sized>(pub &'a S);

impl<S: Storage + ?Sized> ReferenceLoader for StorageLoader<'_, S> {
    fn load(&self, path: &Path) -> Result<Option<Node>> {
        match self.0.get_node(path, None) {
            Ok(node) => Ok(Some(node)),
            Err(ConfigError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
