use cfgdoc_path::Path;
use cfgdoc_types::{ConfigError, Result};
use indexmap::IndexMap;

/// A typed property value as seen by the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// Integers and bytes.
    Int(i64),
    Number(f64),
    Str(String),
    /// Name of an enum constant.
    Enum(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    List(Vec<Value>),
    Set(Vec<Value>),
    /// Ordered key/value pairs. Keys may be any scalar value.
    Map(Vec<(Value, Value)>),
    /// Extension objects keyed by concrete class name.
    Extensions(IndexMap<String, ConfigObject>),
    Reference(Reference),
    Object(ConfigObject),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Elements of an array, list or set.
    pub fn as_elements(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) | Value::List(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ConfigObject> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_extensions(&self) -> Option<&IndexMap<String, ConfigObject>> {
        match self {
            Value::Extensions(map) => Some(map),
            _ => None,
        }
    }

    /// Build a set, dropping later duplicates.
    pub fn set_of(items: impl IntoIterator<Item = Value>) -> Value {
        Value::Set(dedup(items))
    }
}

pub(crate) fn dedup(items: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<ConfigObject> for Value {
    fn from(obj: ConfigObject) -> Self {
        Value::Object(obj)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Value::Reference(r)
    }
}

// ---------------------------------------------------------------------------
// Reference
// ---------------------------------------------------------------------------

/// A pointer from one configuration object to another.
#[derive(Clone, Debug, PartialEq)]
pub enum Reference {
    /// Stored form: the target's canonical path.
    Path(Path),
    /// Target named by identity only; the path is found when encoding.
    Identity(String),
    /// A path together with the object loaded from it.
    Resolved { path: Path, target: Box<ConfigObject> },
}

impl Reference {
    /// The path, when one is known.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Reference::Path(path) | Reference::Resolved { path, .. } => Some(path),
            Reference::Identity(_) => None,
        }
    }

    pub fn target(&self) -> Option<&ConfigObject> {
        match self {
            Reference::Resolved { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Reference::Resolved { .. })
    }
}

// ---------------------------------------------------------------------------
// ConfigObject
// ---------------------------------------------------------------------------

/// Where a nested object sits: the class and identity of the object that
/// owns it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentHandle {
    pub class: String,
    pub identity: Option<String>,
}

/// A typed configuration object: a class name and its field values.
///
/// Absent fields are simply not in the map. The parent handle is navigation
/// state set while binding and does not take part in equality.
#[derive(Clone, Debug)]
pub struct ConfigObject {
    class: String,
    fields: IndexMap<String, Value>,
    parent: Option<ParentHandle>,
}

impl PartialEq for ConfigObject {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.fields == other.fields
    }
}

impl ConfigObject {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            fields: IndexMap::new(),
            parent: None,
        }
    }

    /// Builder form of [`ConfigObject::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut IndexMap<String, Value> {
        &mut self.fields
    }

    pub fn parent(&self) -> Option<&ParentHandle> {
        self.parent.as_ref()
    }

    pub fn set_parent(&mut self, parent: Option<ParentHandle>) {
        self.parent = parent;
    }

    /// The value of `name`, or `MissingValue` if it is absent.
    pub fn require(&self, name: &str) -> Result<&Value> {
        self.get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| ConfigError::missing(name))
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_number)
    }

    pub fn object(&self, name: &str) -> Option<&ConfigObject> {
        self.get(name).and_then(Value::as_object)
    }

    pub fn reference(&self, name: &str) -> Option<&Reference> {
        self.get(name).and_then(Value::as_reference)
    }

    pub fn extension(&self, name: &str, class: &str) -> Option<&ConfigObject> {
        self.get(name)
            .and_then(Value::as_extensions)
            .and_then(|map| map.get(class))
    }

    /// Add an extension object under the extension-map field `name`.
    pub fn with_extension(mut self, name: impl Into<String>, extension: ConfigObject) -> Self {
        let slot = self
            .fields
            .entry(name.into())
            .or_insert_with(|| Value::Extensions(IndexMap::new()));
        if !matches!(slot, Value::Extensions(_)) {
            *slot = Value::Extensions(IndexMap::new());
        }
        if let Value::Extensions(map) = slot {
            map.insert(extension.class.clone(), extension);
        }
        self
    }
}
