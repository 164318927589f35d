use std::fmt;
use std::sync::Arc;

use cfgdoc_path::{Path, SearchExpr, SearchResults};
use cfgdoc_store::Storage;
use cfgdoc_types::{ConfigError, Node, Result, UUID_KEY};
use tracing::{debug, warn};

use crate::index::IdentityIndex;

/// Keeps an [`IdentityIndex`] current for every write made through it.
///
/// Persisting a node re-indexes the identities inside it at the node's
/// canonical path; removing one drops the entries beneath it. Reads pass
/// straight through.
pub struct IndexingStorage<S> {
    inner: S,
    index: Arc<IdentityIndex>,
}

impl<S: Storage> IndexingStorage<S> {
    pub fn new(inner: S) -> Self {
        Self::with_index(inner, Arc::new(IdentityIndex::new()))
    }

    pub fn with_index(inner: S, index: Arc<IdentityIndex>) -> Self {
        Self { inner, index }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn index(&self) -> &Arc<IdentityIndex> {
        &self.index
    }

    /// Index everything already stored. Returns the number of identities.
    pub fn rebuild(&self) -> Result<usize> {
        self.index.clear();
        let root = match self.inner.get_node(&Path::root(), None) {
            Ok(root) => root,
            Err(ConfigError::NotFound { .. }) => return Ok(0),
            Err(e) => return Err(e),
        };
        let count = self.index.reindex(&Path::root(), &root);
        debug!(identities = count, "identity index rebuilt");
        Ok(count)
    }

    /// The canonical path of the object with `identity`.
    ///
    /// The indexed path is checked against storage; an entry whose node is
    /// gone or now carries a different identity is dropped and reported as
    /// `UnresolvedReference`.
    pub fn locate(&self, identity: &str) -> Result<Path> {
        let path = self.index.get(identity).ok_or_else(|| {
            ConfigError::unresolved(format!("#{identity}"), "identity is not indexed")
        })?;
        let stored = match self.inner.get_node(&path.child(UUID_KEY), None) {
            Ok(node) => node,
            Err(ConfigError::NotFound { .. }) => Node::Null,
            Err(e) => return Err(e),
        };
        if stored.as_str() != Some(identity) {
            warn!(identity, path = %path, "stale identity index entry");
            self.index.remove(identity);
            return Err(ConfigError::unresolved(
                path.to_string(),
                format!("index entry for {identity} is stale"),
            ));
        }
        Ok(path)
    }
}

impl<S: Storage> Storage for IndexingStorage<S> {
    fn get_node(&self, path: &Path, class_hint: Option<&str>) -> Result<Node> {
        self.inner.get_node(path, class_hint)
    }

    fn persist_node(&self, path: &Path, node: Node, class_hint: Option<&str>) -> Result<()> {
        let pending = node.clone();
        self.inner.persist_node(path, node, class_hint)?;
        let canonical = self
            .inner
            .canonical_path(path)?
            .unwrap_or_else(|| path.clone());
        let count = self.index.reindex(&canonical, &pending);
        debug!(path = %canonical, identities = count, "indexed persisted node");
        Ok(())
    }

    fn remove_node(&self, path: &Path) -> Result<()> {
        let canonical = self
            .inner
            .canonical_path(path)?
            .unwrap_or_else(|| path.clone());
        self.inner.remove_node(path)?;
        let dropped = self.index.remove_under(&canonical);
        debug!(path = %canonical, dropped, "unindexed removed node");
        Ok(())
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

impl<S: fmt::Debug> fmt::Debug for IndexingStorage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexingStorage")
            .field("inner", &self.inner)
            .field("identities", &self.index.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgdoc_store::InMemoryStorage;
    use serde_json::json;

    fn p(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    fn device(uuid: &str, conn_uuid: &str) -> Node {
        Node::from(json!({
            "#uuid": uuid,
            "aet": "DCM4CHEE",
            "connections": [{"#uuid": conn_uuid, "cn": "dicom"}]
        }))
    }

    #[test]
    fn persist_indexes_and_remove_unindexes() {
        let store = IndexingStorage::new(InMemoryStorage::new());
        store
            .persist_node(&p("/devices/arc"), device("dev-1", "conn-1"), None)
            .unwrap();
        assert_eq!(store.locate("conn-1").unwrap(), p("/devices/arc/connections/0"));

        store.remove_node(&p("/devices/arc")).unwrap();
        assert!(store.index().is_empty());
        assert!(matches!(
            store.locate("dev-1"),
            Err(ConfigError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn predicate_paths_are_indexed_canonically() {
        let store = IndexingStorage::new(InMemoryStorage::new());
        store
            .persist_node(&p("/devices/arc"), device("dev-1", "conn-1"), None)
            .unwrap();
        store.remove_node(&p("/devices/aet=DCM4CHEE")).unwrap();
        assert!(store.index().is_empty());
    }

    #[test]
    fn stale_entry_degrades_to_unresolved() {
        let inner = Arc::new(InMemoryStorage::new());
        let store = IndexingStorage::new(Arc::clone(&inner));
        store
            .persist_node(&p("/devices/arc"), device("dev-1", "conn-1"), None)
            .unwrap();

        // Bypass the decorator so the index is not told.
        inner.remove_node(&p("/devices/arc")).unwrap();
        inner
            .persist_node(&p("/devices/arc"), device("dev-2", "conn-2"), None)
            .unwrap();

        assert!(matches!(
            store.locate("dev-1"),
            Err(ConfigError::UnresolvedReference { .. })
        ));
        assert!(store.index().get("dev-1").is_none());
    }

    #[test]
    fn rebuild_reads_existing_document() {
        let inner = InMemoryStorage::new();
        inner
            .persist_node(&p("/devices/arc"), device("dev-1", "conn-1"), None)
            .unwrap();
        let store = IndexingStorage::new(inner);
        assert_eq!(store.rebuild().unwrap(), 2);
        assert_eq!(store.locate("dev-1").unwrap(), p("/devices/arc"));
    }

    #[test]
    fn failed_persist_leaves_index_alone() {
        let store = IndexingStorage::new(InMemoryStorage::new());
        store
            .persist_node(&p("/devices/arc"), device("dev-1", "conn-1"), None)
            .unwrap();
        assert!(store
            .persist_node(&p("/devices/arc"), device("dev-9", "conn-9"), None)
            .is_err());
        assert!(store.index().get("dev-9").is_none());
        assert_eq!(store.index().len(), 2);
    }
}
