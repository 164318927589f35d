use std::fmt;
use std::sync::{Arc, RwLock};

use cfgdoc_olock::OlockEngine;
use cfgdoc_path::{Path, SearchExpr, SearchResults};
use cfgdoc_types::{Node, Result};

use crate::document;
use crate::traits::Storage;

/// In-memory storage holding the whole document behind a `RwLock`.
///
/// The document is an `Arc` that writers replace rather than mutate, so a
/// search keeps iterating the version it started on.
pub struct InMemoryStorage {
    root: RwLock<Arc<Node>>,
    olock: OlockEngine,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::with_root(Node::Null)
    }

    /// Start from an existing document.
    pub fn with_root(root: Node) -> Self {
        Self {
            root: RwLock::new(Arc::new(root)),
            olock: OlockEngine::new(),
        }
    }

    /// The current version of the document.
    pub fn snapshot(&self) -> Arc<Node> {
        Arc::clone(&self.root.read().expect("lock poisoned"))
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for InMemoryStorage {
    fn get_node(&self, path: &Path, _: Option<&str>) -> Result<Node> {
        document::read(&self.snapshot(), path)
    }

    fn persist_node(&self, path: &Path, node: Node, _: Option<&str>) -> Result<()> {
        let mut root = self.root.write().expect("lock poisoned");
        let next = document::write(&self.olock, &root, path, node)?;
        *root = Arc::new(next);
        Ok(())
    }

    fn remove_node(&self, path: &Path) -> Result<()> {
        let mut root = self.root.write().expect("lock poisoned");
        let next = document::remove(&root, path)?;
        *root = Arc::new(next);
        Ok(())
    }

    fn node_exists(&self, path: &Path) -> Result<bool> {
        Ok(document::lookup(&self.snapshot(), path)?.is_some())
    }

    fn search(&self, expr: &SearchExpr) -> Result<SearchResults> {
        Ok(SearchResults::new(self.snapshot(), expr.clone()))
    }

    fn canonical_path(&self, path: &Path) -> Result<Option<Path>> {
        path.canonicalize(&self.snapshot())
    }
}

impl fmt::Debug for InMemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStorage")
            .field("top_level_keys", &self.snapshot().len())
            .finish()
    }
}
