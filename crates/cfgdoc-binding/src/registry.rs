use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cfgdoc_types::{ConfigError, Node, Result};
use tracing::debug;

use crate::adapter::TypeAdapter;
use crate::adapters::{
    ArrayAdapter, Base64Adapter, CollectionAdapter, EnumAdapter, ExtensionMapAdapter,
    MapAdapter, PrimitiveAdapter, ReferenceAdapter, ReflectiveAdapter, X509Adapter,
};
use crate::binder::Configurable;
use crate::descriptor::{ClassDescriptor, ValueKind};
use crate::schema::SchemaContext;

static PRIMITIVE: PrimitiveAdapter = PrimitiveAdapter;
static ENUM: EnumAdapter = EnumAdapter;
static ARRAY: ArrayAdapter = ArrayAdapter;
static COLLECTION: CollectionAdapter = CollectionAdapter;
static MAP: MapAdapter = MapAdapter;
static EXTENSIONS: ExtensionMapAdapter = ExtensionMapAdapter;
static REFERENCE: ReferenceAdapter = ReferenceAdapter;
static REFLECTIVE: ReflectiveAdapter = ReflectiveAdapter;

/// Class descriptors, extension registrations and opaque adapters.
///
/// Built once at startup and shared by reference; there is no global
/// instance.
pub struct Registry {
    classes: HashMap<String, Arc<ClassDescriptor>>,
    extensions: HashMap<String, Vec<String>>,
    opaque: HashMap<String, Box<dyn TypeAdapter>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut opaque: Vec<&String> = self.opaque.keys().collect();
        opaque.sort();
        f.debug_struct("Registry")
            .field("classes", &self.classes.len())
            .field("extensions", &self.extensions)
            .field("opaque", &opaque)
            .finish()
    }
}

impl Registry {
    /// A registry with the built-in `X509` and `Base64` opaque adapters.
    pub fn new() -> Self {
        let mut registry = Self {
            classes: HashMap::new(),
            extensions: HashMap::new(),
            opaque: HashMap::new(),
        };
        registry.register_opaque(X509Adapter::TAG, X509Adapter);
        registry.register_opaque(Base64Adapter::TAG, Base64Adapter);
        registry
    }

    /// Register a class. A later registration under the same name replaces
    /// the earlier one.
    pub fn register_class(&mut self, class: ClassDescriptor) -> &mut Self {
        debug!(class = class.name(), properties = class.properties().len(), "registered class");
        self.classes.insert(class.name().to_string(), Arc::new(class));
        self
    }

    /// Register the class a [`Configurable`] type binds through.
    pub fn register<T: Configurable>(&mut self) -> &mut Self {
        self.register_class(T::class())
    }

    /// Allow `class` as an extension of `base`.
    pub fn register_extension(
        &mut self,
        base: impl Into<String>,
        class: impl Into<String>,
    ) -> &mut Self {
        let class = class.into();
        let entries = self.extensions.entry(base.into()).or_default();
        if !entries.contains(&class) {
            entries.push(class);
        }
        self
    }

    /// Register an adapter for `ValueKind::Opaque(tag)`.
    pub fn register_opaque(
        &mut self,
        tag: impl Into<String>,
        adapter: impl TypeAdapter + 'static,
    ) -> &mut Self {
        self.opaque.insert(tag.into(), Box::new(adapter));
        self
    }

    pub fn class(&self, name: &str) -> Option<&ClassDescriptor> {
        self.classes.get(name).map(Arc::as_ref)
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Extension classes registered for `base`, in registration order.
    pub fn extensions_of(&self, base: &str) -> &[String] {
        self.extensions.get(base).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The class for extension `tag` of `base`, if registered for it.
    pub fn extension_class(&self, base: &str, tag: &str) -> Option<&ClassDescriptor> {
        self.extensions_of(base)
            .iter()
            .any(|c| c == tag)
            .then(|| self.class(tag))
            .flatten()
    }

    /// The adapter responsible for `kind`.
    pub fn adapter(&self, kind: &ValueKind) -> Result<&dyn TypeAdapter> {
        let adapter: &dyn TypeAdapter = match kind {
            ValueKind::Primitive { .. } => &PRIMITIVE,
            ValueKind::Enum(_) => &ENUM,
            ValueKind::Array(_) => &ARRAY,
            ValueKind::Collection { .. } => &COLLECTION,
            ValueKind::Map { .. } => &MAP,
            ValueKind::ExtensionMap { .. } => &EXTENSIONS,
            ValueKind::Reference { .. } => &REFERENCE,
            ValueKind::Reflective { .. } => &REFLECTIVE,
            ValueKind::Opaque(tag) => self
                .opaque
                .get(tag)
                .map(Box::as_ref)
                .ok_or_else(|| {
                    ConfigError::unserializable("", format!("no adapter registered for {tag}"))
                })?,
        };
        Ok(adapter)
    }

    /// Schema of a registered class, recursing into nested classes.
    pub fn class_schema(&self, name: &str) -> Result<Node> {
        SchemaContext::new(self).class(name).map(Node::Obj)
    }
}
