//! Identity → canonical path lookup.

use std::collections::HashMap;
use std::sync::RwLock;

use cfgdoc_path::Path;
use cfgdoc_types::{Node, UUID_KEY};

/// Maps object identities (`#uuid` values) to the canonical path of the
/// object carrying them.
///
/// The index is a hint, not a source of truth: callers confirm an entry
/// against storage before trusting it (see
/// [`IndexingStorage::locate`](crate::IndexingStorage::locate)).
#[derive(Debug, Default)]
pub struct IdentityIndex {
    entries: RwLock<HashMap<String, Path>>,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &str) -> Option<Path> {
        self.entries
            .read()
            .expect("lock poisoned")
            .get(identity)
            .cloned()
    }

    pub fn insert(&self, identity: impl Into<String>, path: Path) -> Option<Path> {
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(identity.into(), path)
    }

    pub fn remove(&self, identity: &str) -> Option<Path> {
        self.entries.write().expect("lock poisoned").remove(identity)
    }

    /// Drop every entry at or below `path`. Returns how many were dropped.
    pub fn remove_under(&self, path: &Path) -> usize {
        let mut entries = self.entries.write().expect("lock poisoned");
        let before = entries.len();
        entries.retain(|_, indexed| !indexed.starts_with(path));
        before - entries.len()
    }

    /// Replace the entries at or below `base` with the identities found in
    /// `node`, which is stored at `base`.
    pub fn reindex(&self, base: &Path, node: &Node) -> usize {
        let mut found = Vec::new();
        collect_identities(base, node, &mut found);
        let mut entries = self.entries.write().expect("lock poisoned");
        entries.retain(|_, indexed| !indexed.starts_with(base));
        let count = found.len();
        entries.extend(found);
        count
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().expect("lock poisoned").clear();
    }
}

/// Every `(identity, path)` pair in the tree rooted at `node`.
pub fn collect_identities(base: &Path, node: &Node, out: &mut Vec<(String, Path)>) {
    match node {
        Node::Obj(map) => {
            if let Some(Node::Str(identity)) = map.get(UUID_KEY) {
                out.push((identity.clone(), base.clone()));
            }
            for (key, child) in map {
                if key != UUID_KEY {
                    collect_identities(&base.child(key.as_str()), child, out);
                }
            }
        }
        Node::List(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_identities(&base.index(i), child, out);
            }
        }
        _ => {}
    }
}
