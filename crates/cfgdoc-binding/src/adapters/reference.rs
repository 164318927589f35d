use cfgdoc_path::Path;
use cfgdoc_types::{ConfigError, Node, NodeMap, Result};
use tracing::debug;

use super::reflective::{decode_object, normalize_object};
use crate::adapter::{mismatch, unknown_class, wrong_value, TypeAdapter};
use crate::context::{BindContext, DiagnosticKind, ReferencePolicy};
use crate::descriptor::{PropertyDescriptor, ValueKind};
use crate::registry::Registry;
use crate::schema::{schema_type, SchemaContext};
use crate::value::{ParentHandle, Reference, Value};

/// References, stored as the target's path.
///
/// Only references with a known path can be written; identities are turned
/// into paths by the reference encoder before binding. Reading resolves one
/// hop when the context carries an eager loader.
pub struct ReferenceAdapter;

fn target(prop: &PropertyDescriptor) -> Result<&str> {
    match &prop.kind {
        ValueKind::Reference { target } => Ok(target),
        other => Err(ConfigError::deserialization(
            prop.name.as_str(),
            other.to_string(),
            "not a reference property",
        )),
    }
}

impl TypeAdapter for ReferenceAdapter {
    fn to_node(&self, value: &Value, prop: &PropertyDescriptor, _: &Registry) -> Result<Node> {
        match value {
            Value::Null => Ok(Node::Null),
            Value::Reference(reference) => match reference.path() {
                Some(path) => Ok(Node::Str(path.to_string())),
                None => Err(ConfigError::unserializable(
                    prop.name.as_str(),
                    "reference has no path; encode references before binding",
                )),
            },
            other => Err(wrong_value(prop, other)),
        }
    }

    fn from_node(
        &self,
        node: &Node,
        prop: &PropertyDescriptor,
        ctx: &mut BindContext<'_>,
        _: Option<&ParentHandle>,
    ) -> Result<Option<Value>> {
        let text = match node {
            Node::Null => return Ok(None),
            Node::Str(text) => text,
            other => return Err(mismatch(prop, "a path string", other)),
        };
        let path = Path::parse(text).map_err(|e| {
            ConfigError::deserialization(prop.name.as_str(), prop.kind.to_string(), e.to_string())
        })?;
        let Some(loader) = ctx.eager_loader() else {
            return Ok(Some(Value::Reference(Reference::Path(path))));
        };

        let target_class = target(prop)?;
        let Some(stored) = loader.load(&path)? else {
            return match ctx.resolver().policy {
                ReferencePolicy::Strict => Err(ConfigError::unresolved(
                    path.to_string(),
                    format!("no node at the path referenced by {}", prop.name),
                )),
                ReferencePolicy::Lenient => {
                    ctx.report(DiagnosticKind::UnresolvedReference {
                        target: path.to_string(),
                    });
                    Ok(None)
                }
            };
        };
        let registry = ctx.registry();
        let class = registry
            .class(target_class)
            .ok_or_else(|| unknown_class(&prop.name, target_class))?;
        let normalized = normalize_object(class, stored, registry)
            .map_err(|e| e.in_field(&prop.name))?;
        let target = ctx
            .hop(|ctx| decode_object(class, &normalized, ctx, None))
            .map_err(|e| e.in_field(&prop.name))?;
        debug!(path = %path, class = target_class, "resolved reference");
        Ok(Some(Value::Reference(Reference::Resolved {
            path,
            target: Box::new(target),
        })))
    }

    fn schema(&self, prop: &PropertyDescriptor, _: &mut SchemaContext<'_>) -> Result<NodeMap> {
        let mut entry = schema_type("string");
        entry.insert("referencedClass".into(), Node::from(target(prop)?));
        Ok(entry)
    }
}
