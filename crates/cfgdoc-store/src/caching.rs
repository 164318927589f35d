use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cfgdoc_path::{Path, SearchExpr, SearchResults};
use cfgdoc_types::{ConfigError, Node, Result};
use tracing::debug;

use crate::traits::Storage;

type CacheKey = (Path, Option<String>);
type Slot = Arc<Mutex<Option<Node>>>;

/// Read cache in front of another storage.
///
/// Entries are keyed by canonical path and class hint, so a node read
/// through a predicate path shares its entry with the same node read by key.
/// Each key has its own slot lock, held across the backend read, so
/// concurrent readers of one key wait for a single load instead of issuing
/// their own. Writes through this storage drop every entry at, above or
/// below the written node, and so does a `Conflict`, which means the cached
/// view is behind the backend. Other writes to the inner storage are not
/// seen.
pub struct CachingStorage<S> {
    inner: S,
    slots: Mutex<HashMap<CacheKey, Slot>>,
    generation: AtomicU64,
}

impl<S: Storage> CachingStorage<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            slots: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of cached nodes.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .expect("lock poisoned")
            .values()
            .filter(|slot| slot.lock().expect("lock poisoned").is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached node.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.slots.lock().expect("lock poisoned").clear();
    }

    /// The path `path` is cached under, `None` when it selects nothing.
    fn key_path(&self, path: &Path) -> Result<Option<Path>> {
        if path.has_predicates() {
            self.inner.canonical_path(path)
        } else {
            Ok(Some(path.clone()))
        }
    }

    /// Run a write and drop the entries it may have made stale. A predicate
    /// path is canonicalized before and after the write, since the write can
    /// change which node it selects.
    fn write_through(&self, path: &Path, write: impl FnOnce() -> Result<()>) -> Result<()> {
        let before = self.key_path(path).ok().flatten();
        let result = write();
        if matches!(result, Ok(()) | Err(ConfigError::Conflict { .. })) {
            let mut targets: Vec<Path> = before.into_iter().collect();
            if path.has_predicates() {
                if let Ok(Some(after)) = self.inner.canonical_path(path) {
                    targets.push(after);
                }
            }
            self.invalidate(&targets);
        }
        result
    }

    fn invalidate(&self, targets: &[Path]) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let mut slots = self.slots.lock().expect("lock poisoned");
        let before = slots.len();
        slots.retain(|(cached, _), _| {
            !targets
                .iter()
                .any(|path| cached.starts_with(path) || path.starts_with(cached))
        });
        debug!(targets = targets.len(), dropped = before - slots.len(), "cache invalidated");
    }

    fn slot(&self, key: &CacheKey) -> Slot {
        let mut slots = self.slots.lock().expect("lock poisoned");
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Forget a slot that holds nothing, unless another reader is using it.
    fn release(&self, key: &CacheKey, slot: &Slot) {
        let mut slots = self.slots.lock().expect("lock poisoned");
        let unused = slots
            .get(key)
            .is_some_and(|held| Arc::ptr_eq(held, slot) && Arc::strong_count(held) == 2);
        if unused {
            slots.remove(key);
        }
    }
}

impl<S: Storage> Storage for CachingStorage<S> {
    fn get_node(&self, path: &Path, class_hint: Option<&str>) -> Result<Node> {
        let Some(canonical) = self.key_path(path)? else {
            return self.inner.get_node(path, class_hint);
        };
        let key = (canonical, class_hint.map(String::from));
        let slot = self.slot(&key);
        let mut cached = slot.lock().expect("lock poisoned");
        if let Some(node) = cached.as_ref() {
            debug!(path = %key.0, "cache hit");
            return Ok(node.clone());
        }
        let generation = self.generation.load(Ordering::Acquire);
        debug!(path = %key.0, "cache miss");
        match self.inner.get_node(&key.0, class_hint) {
            Ok(node) => {
                if self.generation.load(Ordering::Acquire) == generation {
                    *cached = Some(node.clone());
                }
                Ok(node)
            }
            Err(e) => {
                drop(cached);
                self.release(&key, &slot);
                Err(e)
            }
        }
    }

    fn persist_node(&self, path: &Path, node: Node, class_hint: Option<&str>) -> Result<()> {
        self.write_through(path, || self.inner.persist_node(path, node, class_hint))
    }

    fn remove_node(&self, path: &Path) -> Result<()> {
        self.write_through(path, || self.inner.remove_node(path))
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

impl<S: fmt::Debug> fmt::Debug for CachingStorage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingStorage")
            .field("inner", &self.inner)
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}
