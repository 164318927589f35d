use std::fmt;
use std::sync::Arc;

use cfgdoc_binding::{Normalizer, Registry};
use cfgdoc_path::{Path, SearchExpr, SearchResults};
use cfgdoc_types::{Node, Result};
use tracing::trace;

use crate::traits::Storage;

/// Fills defaults into nodes as they are read.
///
/// A read with a class hint naming a registered class returns the node
/// normalized against that class. Reads without a hint, or with a hint the
/// registry does not know, return the stored node unchanged, as do all
/// other operations.
pub struct DefaultingStorage<S> {
    inner: S,
    registry: Arc<Registry>,
}

impl<S: Storage> DefaultingStorage<S> {
    pub fn new(inner: S, registry: Arc<Registry>) -> Self {
        Self { inner, registry }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: Storage> Storage for DefaultingStorage<S> {
    fn get_node(&self, path: &Path, class_hint: Option<&str>) -> Result<Node> {
        let node = self.inner.get_node(path, class_hint)?;
        match class_hint.filter(|class| self.registry.class(class).is_some()) {
            Some(class) => {
                trace!(path = %path, class, "filling defaults");
                Normalizer::new(&self.registry).normalize(class, node)
            }
            None => Ok(node),
        }
    }

    fn persist_node(&self, path: &Path, node: Node, class_hint: Option<&str>) -> Result<()> {
        self.inner.persist_node(path, node, class_hint)
    }

    fn remove_node(&self, path: &Path) -> Result<()> {
        self.inner.remove_node(path)
    }

    fn node_exists(&self, path: &Path) -> Result<bool> {
        self.inner.node_exists(path)
    }

    fn search(&self, expr: &SearchExpr) -> Result<SearchResults> {
        self.inner.search(expr)
    }

    fn canonical_path(&self, path: &Path) -> Result<Option<Path>> {
        self.inner.canonical_path(path)
    }
}

impl<S: fmt::Debug> fmt::Debug for DefaultingStorage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultingStorage")
            .field("inner", &self.inner)
            .finish()
    }
}
