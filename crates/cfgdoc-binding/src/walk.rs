use cfgdoc_path::Path;
use cfgdoc_types::{ConfigError, Result};

use crate::descriptor::{ClassDescriptor, CollectionKind, PropertyDescriptor, ValueKind};
use crate::registry::Registry;
use crate::value::{ConfigObject, Reference, Value};

/// Callbacks for [`walk`]. Paths are the document paths the visited values
/// will be written at.
pub trait Visitor {
    fn visit_object(
        &mut self,
        path: &Path,
        obj: &ConfigObject,
        class: &ClassDescriptor,
    ) -> Result<()> {
        let _ = (path, obj, class);
        Ok(())
    }

    fn visit_reference(
        &mut self,
        path: &Path,
        prop: &PropertyDescriptor,
        reference: &mut Reference,
    ) -> Result<()> {
        let _ = (path, prop, reference);
        Ok(())
    }
}

/// Visit `obj` and every object and reference nested in it, in property
/// order. `base` is the path `obj` is stored at.
///
/// Positions match what the binder writes: list indices skip null elements,
/// sets skip duplicates, and map keys appear in their stringified form.
/// Targets of resolved references are not entered.
pub fn walk(
    obj: &mut ConfigObject,
    registry: &Registry,
    base: &Path,
    visitor: &mut dyn Visitor,
) -> Result<()> {
    let class = registry.class(obj.class()).ok_or_else(|| {
        ConfigError::unserializable("", format!("class {} is not registered", obj.class()))
    })?;
    visitor.visit_object(base, obj, class)?;
    for prop in class.properties() {
        let Some(value) = obj.get_mut(&prop.name) else {
            continue;
        };
        let path = base.child(prop.storage_key());
        walk_value(value, &prop.kind, prop, registry, &path, visitor)
            .map_err(|e| e.in_field(&prop.name))?;
    }
    Ok(())
}

fn walk_value(
    value: &mut Value,
    kind: &ValueKind,
    prop: &PropertyDescriptor,
    registry: &Registry,
    path: &Path,
    visitor: &mut dyn Visitor,
) -> Result<()> {
    match (kind, value) {
        (ValueKind::Reference { .. }, Value::Reference(reference)) => {
            visitor.visit_reference(path, prop, reference)
        }
        (ValueKind::Reflective { .. }, Value::Object(obj)) => walk(obj, registry, path, visitor),
        (
            ValueKind::Array(element) | ValueKind::Collection { element, .. },
            Value::Array(items) | Value::List(items) | Value::Set(items),
        ) => {
            let is_set = matches!(
                kind,
                ValueKind::Collection {
                    kind: CollectionKind::Set,
                    ..
                }
            );
            let mut index = 0;
            for i in 0..items.len() {
                let (seen, rest) = items.split_at_mut(i);
                let item = &mut rest[0];
                if item.is_null() || (is_set && seen.contains(item)) {
                    continue;
                }
                walk_value(item, element, prop, registry, &path.index(index), visitor)?;
                index += 1;
            }
            Ok(())
        }
        (ValueKind::Map { key, value: element }, Value::Map(pairs)) => {
            let key_prop = prop.element(key);
            let key_adapter = registry.adapter(key)?;
            for (k, v) in pairs.iter_mut() {
                if v.is_null() {
                    continue;
                }
                let text = key_adapter
                    .to_node(k, &key_prop, registry)?
                    .scalar_text()
                    .unwrap_or_default();
                walk_value(v, element, prop, registry, &path.child(text), visitor)?;
            }
            Ok(())
        }
        (ValueKind::ExtensionMap { .. }, Value::Extensions(extensions)) => {
            for (tag, extension) in extensions.iter_mut() {
                walk(extension, registry, &path.child(tag.as_str()), visitor)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
