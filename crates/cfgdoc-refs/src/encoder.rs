//! Turning references into storable paths before a write.

use std::collections::{HashMap, HashSet};

use cfgdoc_binding::{
    walk, ClassDescriptor, ConfigObject, PropertyDescriptor, Reference, Registry, Visitor,
};
use cfgdoc_path::Path;
use cfgdoc_store::Storage;
use cfgdoc_types::{ConfigError, Result};
use tracing::debug;

/// Finds the path an identity is stored at.
pub trait IdentityLookup {
    /// `Ok(None)` if the identity is unknown.
    fn lookup(&self, identity: &str) -> Result<Option<Path>>;
}

impl<S: Storage> IdentityLookup for crate::IndexingStorage<S> {
    fn lookup(&self, identity: &str) -> Result<Option<Path>> {
        match self.locate(identity) {
            Ok(path) => Ok(Some(path)),
            Err(ConfigError::UnresolvedReference { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Rewrites the references in an object about to be persisted.
///
/// Identity references become the canonical path of their target, taken
/// from the object being written when the target is inside it and from the
/// identity index otherwise. Path references must name a node that is either
/// part of the object being written or already stored. Anything else is a
/// `DanglingReference`, and nothing is persisted.
pub struct ReferenceEncoder<'a> {
    registry: &'a Registry,
    storage: &'a dyn Storage,
    identities: Option<&'a dyn IdentityLookup>,
}

impl<'a> ReferenceEncoder<'a> {
    pub fn new(registry: &'a Registry, storage: &'a dyn Storage) -> Self {
        Self {
            registry,
            storage,
            identities: None,
        }
    }

    pub fn with_identities(mut self, identities: &'a dyn IdentityLookup) -> Self {
        self.identities = Some(identities);
        self
    }

    /// Encode the references of `obj`, which will be stored at `base`.
    pub fn encode(&self, obj: &mut ConfigObject, base: &Path) -> Result<()> {
        let mut batch = Batch::default();
        walk(obj, self.registry, base, &mut batch)?;

        let mut rewriter = Rewriter {
            encoder: self,
            batch: &batch,
            base,
            rewritten: 0,
        };
        walk(obj, self.registry, base, &mut rewriter)?;
        debug!(path = %base, references = rewriter.rewritten, "encoded references");
        Ok(())
    }

    fn stored(&self, path: &Path) -> Result<bool> {
        match self.storage.node_exists(path) {
            Ok(exists) => Ok(exists),
            Err(ConfigError::MalformedPath { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Predicate paths are matched against what is stored now.
    fn canonical(&self, path: &Path) -> Result<Option<Path>> {
        if !path.has_predicates() {
            return Ok(Some(path.clone()));
        }
        match self.storage.canonical_path(path) {
            Err(ConfigError::MalformedPath { .. }) => Ok(None),
            other => other,
        }
    }
}

/// Objects and identities inside the object being written.
#[derive(Default)]
struct Batch {
    paths: HashSet<Path>,
    identities: HashMap<String, Path>,
}

impl Visitor for Batch {
    fn visit_object(
        &mut self,
        path: &Path,
        obj: &ConfigObject,
        class: &ClassDescriptor,
    ) -> Result<()> {
        self.paths.insert(path.clone());
        if let Some(identity) = class.uuid_property().and_then(|p| obj.str(&p.name)) {
            self.identities.insert(identity.to_string(), path.clone());
        }
        Ok(())
    }
}

struct Rewriter<'e, 'a> {
    encoder: &'e ReferenceEncoder<'a>,
    batch: &'e Batch,
    base: &'e Path,
    rewritten: usize,
}

// The walk prefixes the field location on the way out.
fn dangling(target: impl Into<String>) -> ConfigError {
    ConfigError::DanglingReference {
        field: String::new(),
        target: target.into(),
    }
}

impl Rewriter<'_, '_> {
    fn identity_path(&self, identity: &str) -> Result<Option<Path>> {
        if let Some(path) = self.batch.identities.get(identity) {
            return Ok(Some(path.clone()));
        }
        match self.encoder.identities {
            Some(lookup) => lookup.lookup(identity),
            None => Ok(None),
        }
    }

    fn path_exists(&self, path: &Path) -> Result<bool> {
        let Some(target) = self.encoder.canonical(path)? else {
            return Ok(false);
        };
        if target.starts_with(self.base) {
            Ok(self.batch.paths.contains(&target))
        } else {
            self.encoder.stored(&target)
        }
    }
}

impl Visitor for Rewriter<'_, '_> {
    fn visit_reference(
        &mut self,
        _: &Path,
        _: &PropertyDescriptor,
        reference: &mut Reference,
    ) -> Result<()> {
        let path = match reference {
            Reference::Identity(identity) => self
                .identity_path(identity)?
                .ok_or_else(|| dangling(identity.as_str()))?,
            Reference::Path(path) | Reference::Resolved { path, .. } => {
                if !self.path_exists(path)? {
                    return Err(dangling(path.to_string()));
                }
                path.clone()
            }
        };
        *reference = Reference::Path(path);
        self.rewritten += 1;
        Ok(())
    }
}
