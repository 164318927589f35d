use cfgdoc_types::{ConfigError, Node, NodeMap, Result};
use indexmap::IndexMap;

use super::reflective::{decode_object, encode_object, normalize_object};
use crate::adapter::{mismatch, wrong_value, TypeAdapter};
use crate::context::{BindContext, DiagnosticKind};
use crate::descriptor::{PropertyDescriptor, ValueKind};
use crate::registry::Registry;
use crate::schema::{schema_type, SchemaContext};
use crate::value::{ParentHandle, Value};

/// Polymorphic extension objects, keyed by concrete class name.
///
/// Reading drops entries whose class is not registered for the base (with a
/// diagnostic); writing such an entry is an error.
pub struct ExtensionMapAdapter;

fn base(prop: &PropertyDescriptor) -> Result<&str> {
    match &prop.kind {
        ValueKind::ExtensionMap { base } => Ok(base),
        other => Err(ConfigError::deserialization(
            prop.name.as_str(),
            other.to_string(),
            "not an extension map property",
        )),
    }
}

impl TypeAdapter for ExtensionMapAdapter {
    fn to_node(&self, value: &Value, prop: &PropertyDescriptor, registry: &Registry) -> Result<Node> {
        let extensions = match value {
            Value::Null => return Ok(Node::Null),
            Value::Extensions(map) => map,
            other => return Err(wrong_value(prop, other)),
        };
        let base = base(prop)?;
        let mut out = NodeMap::with_capacity(extensions.len());
        for (tag, extension) in extensions {
            let class = registry.extension_class(base, tag).ok_or_else(|| {
                ConfigError::unserializable(
                    prop.name.as_str(),
                    format!("extension {tag} is not registered for {base}"),
                )
            })?;
            let node = encode_object(extension, class, registry)
                .map_err(|e| e.in_field(tag).in_field(&prop.name))?;
            out.insert(tag.clone(), node);
        }
        Ok(Node::Obj(out))
    }

    fn from_node(
        &self,
        node: &Node,
        prop: &PropertyDescriptor,
        ctx: &mut BindContext<'_>,
        parent: Option<&ParentHandle>,
    ) -> Result<Option<Value>> {
        let entries = match node {
            Node::Null => return Ok(None),
            Node::Obj(entries) => entries,
            other => return Err(mismatch(prop, "an object", other)),
        };
        let base = base(prop)?;
        let registry = ctx.registry();
        let mut out = IndexMap::with_capacity(entries.len());
        for (tag, child) in entries {
            let Some(class) = registry.extension_class(base, tag) else {
                ctx.within(tag, |ctx| {
                    ctx.report(DiagnosticKind::UnknownExtension { tag: tag.clone() })
                });
                continue;
            };
            let extension = ctx
                .within(tag, |ctx| decode_object(class, child, ctx, parent))
                .map_err(|e| e.in_field(tag).in_field(&prop.name))?;
            out.insert(tag.clone(), extension);
        }
        Ok(Some(Value::Extensions(out)))
    }

    fn normalize(
        &self,
        node: Option<Node>,
        prop: &PropertyDescriptor,
        registry: &Registry,
    ) -> Result<Option<Node>> {
        let entries = match node {
            Some(Node::Null) | None => return Ok(Some(Node::object())),
            Some(Node::Obj(entries)) => entries,
            Some(other) => return Ok(Some(other)),
        };
        let base = base(prop)?;
        let mut out = NodeMap::with_capacity(entries.len());
        for (tag, child) in entries {
            let child = match registry.extension_class(base, &tag) {
                Some(class) => normalize_object(class, child, registry)
                    .map_err(|e| e.in_field(&tag).in_field(&prop.name))?,
                None => child,
            };
            out.insert(tag, child);
        }
        Ok(Some(Node::Obj(out)))
    }

    fn schema(&self, prop: &PropertyDescriptor, schema: &mut SchemaContext<'_>) -> Result<NodeMap> {
        let base = base(prop)?;
        let mut entry = schema_type("object");
        entry.insert("class".into(), Node::from(base));
        let mut properties = NodeMap::new();
        for tag in schema.registry().extensions_of(base) {
            properties.insert(tag.clone(), Node::Obj(schema.class(tag)?));
        }
        entry.insert("properties".into(), Node::Obj(properties));
        Ok(entry)
    }
}
