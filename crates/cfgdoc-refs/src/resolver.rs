use cfgdoc_binding::{
    Binder, ConfigObject, Diagnostic, Reference, ReferencePolicy, Registry, ResolveMode,
    ResolverConfig, Value, ValueKind,
};
use cfgdoc_path::Path;
use cfgdoc_store::{Storage, StorageLoader};
use cfgdoc_types::{ConfigError, Node, Result};
use tracing::{debug, warn};

use crate::encoder::IdentityLookup;

/// An object bound from storage, with whatever the bind could not apply.
#[derive(Clone, Debug, PartialEq)]
pub struct Bound {
    pub object: ConfigObject,
    pub diagnostics: Vec<Diagnostic>,
}

/// Binds stored nodes and follows the references in bound objects.
///
/// Following is one storage lookup per hop. A target's own references stay
/// as paths, so chains of any length and cycles are walked by following
/// again rather than by building a cyclic object graph.
pub struct Resolver<'a> {
    binder: Binder<'a>,
    storage: &'a dyn Storage,
    identities: Option<&'a dyn IdentityLookup>,
    config: ResolverConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a Registry, storage: &'a dyn Storage, config: ResolverConfig) -> Self {
        Self {
            binder: Binder::new(registry),
            storage,
            identities: None,
            config,
        }
    }

    /// Resolve identity references through `identities`.
    pub fn with_identities(mut self, identities: &'a dyn IdentityLookup) -> Self {
        self.identities = Some(identities);
        self
    }

    pub fn config(&self) -> ResolverConfig {
        self.config
    }

    /// Bind `node` as `class` under this resolver's configuration.
    pub fn bind(&self, class: &str, node: &Node) -> Result<Bound> {
        self.bind_with(class, node, self.config)
    }

    /// Read the node at `path` and bind it as `class`.
    pub fn load(&self, class: &str, path: &Path) -> Result<Bound> {
        let node = self.storage.get_node(path, Some(class))?;
        self.bind(class, &node)
    }

    /// The object `reference` points at, bound as `class`.
    ///
    /// A missing target is `UnresolvedReference` under the strict policy and
    /// `Ok(None)` under the lenient one.
    pub fn follow(&self, reference: &Reference, class: &str) -> Result<Option<ConfigObject>> {
        let path = match reference {
            Reference::Resolved { target, .. } => return Ok(Some((**target).clone())),
            Reference::Path(path) => path.clone(),
            Reference::Identity(identity) => match self.locate(identity)? {
                Some(path) => path,
                None => return self.missing(format!("#{identity}"), "identity is not indexed"),
            },
        };
        let node = match self.storage.get_node(&path, Some(class)) {
            Ok(node) => node,
            Err(ConfigError::NotFound { .. }) => {
                return self.missing(path.to_string(), "no node at the referenced path")
            }
            Err(e) => return Err(e),
        };
        let hop = ResolverConfig {
            mode: ResolveMode::Lazy,
            ..self.config
        };
        let bound = self.bind_with(class, &node, hop)?;
        debug!(path = %path, class, "followed reference");
        Ok(Some(bound.object))
    }

    /// Follow the single reference held in `obj.field`.
    ///
    /// `Ok(None)` when the field is unset.
    pub fn follow_field(&self, obj: &ConfigObject, field: &str) -> Result<Option<ConfigObject>> {
        let target = match self.field_kind(obj, field)? {
            ValueKind::Reference { target } => target,
            other => return Err(not_a_reference(field, other)),
        };
        match obj.reference(field) {
            Some(reference) => self.follow(reference, target),
            None => Ok(None),
        }
    }

    /// Follow every reference in the collection held in `obj.field`.
    ///
    /// Under the lenient policy missing targets are skipped.
    pub fn follow_all(&self, obj: &ConfigObject, field: &str) -> Result<Vec<ConfigObject>> {
        let target = match self.field_kind(obj, field)? {
            ValueKind::Array(element) | ValueKind::Collection { element, .. } => {
                match element.as_ref() {
                    ValueKind::Reference { target } => target,
                    other => return Err(not_a_reference(field, other)),
                }
            }
            other => return Err(not_a_reference(field, other)),
        };
        let Some(items) = obj.get(field).and_then(Value::as_elements) else {
            return Ok(Vec::new());
        };
        let mut targets = Vec::with_capacity(items.len());
        for reference in items.iter().filter_map(Value::as_reference) {
            if let Some(found) = self.follow(reference, target)? {
                targets.push(found);
            }
        }
        Ok(targets)
    }

    fn bind_with(
        &self,
        class: &str,
        node: &Node,
        config: ResolverConfig,
    ) -> Result<Bound> {
        let loader = StorageLoader(self.storage);
        let mut ctx = self
            .binder
            .context()
            .with_loader(&loader)
            .with_resolver(config);
        let object = self.binder.from_node(class, node, &mut ctx)?;
        Ok(Bound {
            object,
            diagnostics: ctx.take_diagnostics(),
        })
    }

    fn locate(&self, identity: &str) -> Result<Option<Path>> {
        match self.identities {
            Some(lookup) => lookup.lookup(identity),
            None => Ok(None),
        }
    }

    fn missing(&self, target: String, reason: &str) -> Result<Option<ConfigObject>> {
        match self.config.policy {
            ReferencePolicy::Strict => Err(ConfigError::unresolved(target, reason)),
            ReferencePolicy::Lenient => {
                warn!(target = %target, reason, "skipping unresolved reference");
                Ok(None)
            }
        }
    }

    fn field_kind(&self, obj: &ConfigObject, field: &str) -> Result<&'a ValueKind> {
        let registry = self.binder.registry();
        let class = registry.class(obj.class()).ok_or_else(|| {
            ConfigError::unserializable("", format!("class {} is not registered", obj.class()))
        })?;
        class
            .property_named(field)
            .map(|prop| &prop.kind)
            .ok_or_else(|| {
                ConfigError::deserialization(field, obj.class(), "no such property")
            })
    }
}

fn not_a_reference(field: &str, kind: &ValueKind) -> ConfigError {
    ConfigError::deserialization(field, kind.to_string(), "not a reference property")
}
