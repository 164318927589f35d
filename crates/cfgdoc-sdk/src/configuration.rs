use std::path::Path as FsPath;
use std::sync::Arc;

use cfgdoc_binding::{
    Binder, ConfigObject, Configurable, Reference, Registry, ResolveMode, ResolverConfig, Value,
};
use cfgdoc_olock::{OlockEngine, OlockHash};
use cfgdoc_path::{Path, SearchExpr, SearchResults};
use cfgdoc_refs::{Bound, IdentityLookup, IndexingStorage, ReferenceEncoder, Resolver};
use cfgdoc_store::{CachingStorage, DefaultingStorage, InMemoryStorage, JsonFileStorage, Storage};
use cfgdoc_types::{ConfigError, Node, OLD_OLOCK_HASH_KEY};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{SdkError, SdkResult};

/// A registry and a storage stack, used together.
///
/// The stack is the backend wrapped in identity indexing, then optionally a
/// read cache and default filling, as the [`EngineConfig`] asks. Every
/// operation goes through the top of the stack.
pub struct Configuration {
    registry: Arc<Registry>,
    config: EngineConfig,
    indexed: Arc<IndexingStorage<Box<dyn Storage>>>,
    storage: Box<dyn Storage>,
    olock: OlockEngine,
}

impl Configuration {
    /// Assemble the storage stack over `backend` and index what it holds.
    pub fn open(
        backend: impl Storage + 'static,
        registry: Registry,
        config: EngineConfig,
    ) -> SdkResult<Self> {
        config.validate()?;
        let registry = Arc::new(registry);
        let backend: Box<dyn Storage> = Box::new(backend);
        let indexed = Arc::new(IndexingStorage::new(backend));
        let identities = indexed.rebuild()?;

        let mut storage: Box<dyn Storage> = Box::new(Arc::clone(&indexed));
        if config.cache {
            storage = Box::new(CachingStorage::new(storage));
        }
        if config.fill_defaults {
            storage = Box::new(DefaultingStorage::new(storage, Arc::clone(&registry)));
        }
        info!(
            identities,
            cache = config.cache,
            fill_defaults = config.fill_defaults,
            "configuration opened"
        );
        Ok(Self {
            registry,
            config,
            indexed,
            storage,
            olock: OlockEngine::new(),
        })
    }

    pub fn in_memory(registry: Registry, config: EngineConfig) -> SdkResult<Self> {
        Self::open(InMemoryStorage::new(), registry, config)
    }

    pub fn json_file(
        file: impl AsRef<FsPath>,
        registry: Registry,
        config: EngineConfig,
    ) -> SdkResult<Self> {
        Self::open(JsonFileStorage::open(file)?, registry, config)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The top of the storage stack.
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn resolver(&self) -> Resolver<'_> {
        self.resolver_with(self.config.resolver)
    }

    fn resolver_with(&self, config: ResolverConfig) -> Resolver<'_> {
        Resolver::new(&self.registry, self.storage.as_ref(), config)
            .with_identities(self.indexed.as_ref())
    }

    // ---- Reading ----

    /// Bind the node at `path` as `class`.
    pub fn load(&self, class: &str, path: &Path) -> SdkResult<Bound> {
        let bound = self.resolver().load(class, path)?;
        if !bound.diagnostics.is_empty() {
            debug!(
                path = %path,
                class,
                diagnostics = bound.diagnostics.len(),
                "loaded with diagnostics"
            );
        }
        Ok(bound)
    }

    pub fn load_as<T: Configurable>(&self, path: &Path) -> SdkResult<T> {
        let bound = self.load(T::CLASS, path)?;
        Ok(T::from_object(&bound.object)?)
    }

    pub fn exists(&self, path: &Path) -> SdkResult<bool> {
        Ok(self.storage.node_exists(path)?)
    }

    pub fn search(&self, expr: &str) -> SdkResult<SearchResults> {
        let expr = SearchExpr::parse(expr)?;
        Ok(self.storage.search(&expr)?)
    }

    /// Bind every match of `expr` as `class`.
    pub fn find(&self, class: &str, expr: &str) -> SdkResult<Vec<(Path, Bound)>> {
        let results = self.search(expr)?;
        let resolver = self.resolver();
        let mut found = Vec::new();
        for m in &results {
            let bound = resolver.bind(class, m.node)?;
            found.push((m.path, bound));
        }
        Ok(found)
    }

    /// The object carrying `identity`, with its canonical path.
    pub fn find_by_identity(
        &self,
        class: &str,
        identity: &str,
    ) -> SdkResult<Option<(Path, ConfigObject)>> {
        let Some(path) = self.indexed.lookup(identity)? else {
            return Ok(None);
        };
        let bound = self.load(class, &path)?;
        Ok(Some((path, bound.object)))
    }

    pub fn follow(&self, reference: &Reference, class: &str) -> SdkResult<Option<ConfigObject>> {
        Ok(self.resolver().follow(reference, class)?)
    }

    pub fn follow_field(&self, obj: &ConfigObject, field: &str) -> SdkResult<Option<ConfigObject>> {
        Ok(self.resolver().follow_field(obj, field)?)
    }

    pub fn schema_for(&self, class: &str) -> SdkResult<Node> {
        Ok(self.registry.class_schema(class)?)
    }

    // ---- Writing ----

    /// Write `obj` at `path`.
    ///
    /// If `obj` carries the hash it was loaded with, the write replaces the
    /// stored node only while that hash is still current; otherwise it is a
    /// creation. Missing identities are generated and references are
    /// encoded as paths; on success `obj` holds what was written, with the
    /// new hash.
    pub fn persist(&self, path: &Path, obj: &mut ConfigObject) -> SdkResult<OlockHash> {
        self.write(path, obj, None)
    }

    pub fn persist_as<T: Configurable>(&self, path: &Path, value: &T) -> SdkResult<OlockHash> {
        self.persist(path, &mut value.to_object())
    }

    /// Write `obj` at `path` if the stored node's digest is `expected`.
    pub fn replace(
        &self,
        path: &Path,
        obj: &mut ConfigObject,
        expected: &str,
    ) -> SdkResult<OlockHash> {
        self.write(path, obj, Some(expected))
    }

    /// Read the object at `path`, apply `edit`, and write it back, starting
    /// over when another writer got there first.
    pub fn update<F>(&self, class: &str, path: &Path, mut edit: F) -> SdkResult<ConfigObject>
    where
        F: FnMut(&mut ConfigObject) -> SdkResult<()>,
    {
        let attempts = self.config.max_update_attempts;
        let lazy = self.resolver_with(ResolverConfig {
            mode: ResolveMode::Lazy,
            ..self.config.resolver
        });
        for attempt in 1..=attempts {
            let stored = self.storage.get_node(path, None)?;
            let expected = self.olock.digest(&stored).to_base64();
            let mut obj = lazy.bind(class, &stored)?.object;
            edit(&mut obj)?;
            match self.write(path, &mut obj, Some(&expected)) {
                Ok(_) => return Ok(obj),
                Err(e) if e.is_conflict() => {
                    warn!(path = %path, attempt, "update conflicted, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(SdkError::UpdateExhausted {
            path: path.to_string(),
            attempts,
        })
    }

    pub fn remove(&self, path: &Path) -> SdkResult<()> {
        self.storage.remove_node(path)?;
        info!(path = %path, "removed");
        Ok(())
    }

    fn write(
        &self,
        path: &Path,
        obj: &mut ConfigObject,
        expected: Option<&str>,
    ) -> SdkResult<OlockHash> {
        let mut staged = obj.clone();
        assign_identities(&mut staged, &self.registry);
        let base = self
            .storage
            .canonical_path(path)?
            .unwrap_or_else(|| path.clone());
        ReferenceEncoder::new(&self.registry, self.storage.as_ref())
            .with_identities(self.indexed.as_ref())
            .encode(&mut staged, &base)?;

        let mut node = Binder::new(&self.registry).to_node(&staged)?;
        let hash = match expected {
            Some(expected) => {
                let hash = self.olock.stamp(&mut node);
                let root = node.as_obj_mut().ok_or_else(|| {
                    ConfigError::unserializable("", "root of a write is not an object")
                })?;
                root.insert(OLD_OLOCK_HASH_KEY.to_string(), Node::from(expected));
                hash
            }
            None => self.olock.stamp_preserving_old(&mut node),
        };
        self.storage.persist_node(path, node, Some(staged.class()))?;

        if let Some(prop) = self
            .registry
            .class(staged.class())
            .and_then(|c| c.olock_property())
        {
            staged.set(prop.name.clone(), hash.to_base64());
        }
        info!(path = %path, class = staged.class(), hash = %hash.short_hex(), "persisted");
        *obj = staged;
        Ok(hash)
    }
}

/// Give every object whose class has an identity property, and which has no
/// identity yet, a fresh one.
fn assign_identities(obj: &mut ConfigObject, registry: &Registry) {
    if let Some(prop) = registry.class(obj.class()).and_then(|c| c.uuid_property()) {
        if obj.get(&prop.name).map_or(true, Value::is_null) {
            obj.set(prop.name.clone(), Uuid::now_v7().to_string());
        }
    }
    for value in obj.fields_mut().values_mut() {
        assign_in_value(value, registry);
    }
}

fn assign_in_value(value: &mut Value, registry: &Registry) {
    match value {
        Value::Object(obj) => assign_identities(obj, registry),
        Value::Array(items) | Value::List(items) | Value::Set(items) => {
            for item in items {
                assign_in_value(item, registry);
            }
        }
        Value::Map(pairs) => {
            for (_, item) in pairs {
                assign_in_value(item, registry);
            }
        }
        Value::Extensions(extensions) => {
            for extension in extensions.values_mut() {
                assign_identities(extension, registry);
            }
        }
        _ => {}
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("config", &self.config)
            .field("identities", &self.indexed.index().len())
            .finish()
    }
}
