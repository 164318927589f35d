use cfgdoc_types::{ConfigError, Node, NodeMap, Result};

use crate::context::BindContext;
use crate::descriptor::PropertyDescriptor;
use crate::registry::Registry;
use crate::schema::SchemaContext;
use crate::value::{ParentHandle, Value};

/// Converts values of one [`ValueKind`](crate::ValueKind) to and from nodes.
///
/// The [`Registry`] picks an adapter per property kind; container adapters
/// dispatch back through the registry for their generic parameters.
///
/// Errors from an adapter carry a field location relative to the value it
/// was handed; callers prefix their own position with
/// [`ConfigError::in_field`].
pub trait TypeAdapter: Send + Sync {
    /// Encode a present value.
    fn to_node(&self, value: &Value, prop: &PropertyDescriptor, registry: &Registry)
        -> Result<Node>;

    /// Decode a present, non-null node. `Ok(None)` leaves the field absent.
    fn from_node(
        &self,
        node: &Node,
        prop: &PropertyDescriptor,
        ctx: &mut BindContext<'_>,
        parent: Option<&ParentHandle>,
    ) -> Result<Option<Value>>;

    /// Fill defaults and coerce textual encodings. `None` means absent, in
    /// and out. Must be idempotent.
    fn normalize(
        &self,
        node: Option<Node>,
        prop: &PropertyDescriptor,
        registry: &Registry,
    ) -> Result<Option<Node>> {
        let _ = (prop, registry);
        Ok(node)
    }

    /// Kind-specific part of the schema entry for `prop`.
    fn schema(&self, prop: &PropertyDescriptor, schema: &mut SchemaContext<'_>) -> Result<NodeMap>;
}

/// A node that does not have the shape `prop` declares.
pub(crate) fn mismatch(prop: &PropertyDescriptor, expected: &str, found: &Node) -> ConfigError {
    ConfigError::deserialization(
        prop.name.as_str(),
        prop.kind.to_string(),
        format!("expected {expected}, found {}", found.kind_name()),
    )
}

/// A value that does not have the shape `prop` declares.
pub(crate) fn wrong_value(prop: &PropertyDescriptor, value: &Value) -> ConfigError {
    ConfigError::unserializable(
        prop.name.as_str(),
        format!("{} value cannot be written as {}", value_kind_name(value), prop.kind),
    )
}

pub(crate) fn unknown_class(field: &str, class: &str) -> ConfigError {
    ConfigError::deserialization(field, class, "class is not registered")
}

fn value_kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Number(_) => "number",
        Value::Str(_) => "string",
        Value::Enum(_) => "enum",
        Value::Bytes(_) => "bytes",
        Value::Array(_) => "array",
        Value::List(_) => "list",
        Value::Set(_) => "set",
        Value::Map(_) => "map",
        Value::Extensions(_) => "extensions",
        Value::Reference(_) => "reference",
        Value::Object(_) => "object",
    }
}
