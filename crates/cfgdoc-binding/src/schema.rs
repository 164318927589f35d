//! Schema export.
//!
//! Each property becomes an object with a `type` and, depending on its kind,
//! `class`, `items`, `properties`, `enum`, `enumRepresentation`, `mapkey` or
//! `referencedClass`, followed by its UI metadata.

use cfgdoc_types::{Node, NodeMap, Result};

use crate::adapter::{unknown_class, TypeAdapter};
use crate::descriptor::PropertyDescriptor;
use crate::registry::Registry;

/// State for one schema export: tracks classes being expanded so that
/// recursive class graphs terminate.
pub struct SchemaContext<'a> {
    registry: &'a Registry,
    expanding: Vec<String>,
}

impl<'a> SchemaContext<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            expanding: Vec::new(),
        }
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Schema entry for `prop`: the adapter's part plus UI metadata.
    pub fn property(&mut self, prop: &PropertyDescriptor) -> Result<Node> {
        let adapter = self.registry.adapter(&prop.kind)?;
        let mut entry = adapter.schema(prop, self)?;
        if let Some(title) = &prop.title {
            entry.insert("title".into(), Node::from(title.as_str()));
        }
        if let Some(description) = &prop.description {
            entry.insert("description".into(), Node::from(description.as_str()));
        }
        if let Some(default) = &prop.default {
            entry.insert("default".into(), Node::from(default.as_str()));
        }
        if !prop.tags.is_empty() {
            let tags = prop.tags.iter().map(|t| Node::from(t.as_str())).collect();
            entry.insert("tags".into(), Node::List(tags));
        }
        if let Some(order) = prop.ui_order {
            entry.insert("uiOrder".into(), Node::from(order));
        }
        if let Some(group) = &prop.ui_group {
            entry.insert("uiGroup".into(), Node::from(group.as_str()));
        }
        Ok(Node::Obj(entry))
    }

    /// Schema of a whole class. A class already being expanded further up
    /// is emitted without its properties.
    pub fn class(&mut self, name: &str) -> Result<NodeMap> {
        let mut entry = NodeMap::new();
        entry.insert("type".into(), Node::from("object"));
        entry.insert("class".into(), Node::from(name));
        if self.expanding.iter().any(|c| c == name) {
            return Ok(entry);
        }
        let class = self
            .registry
            .class(name)
            .ok_or_else(|| unknown_class("", name))?;
        self.expanding.push(name.to_string());
        let mut properties = NodeMap::new();
        for prop in class.properties() {
            let schema = self.property(prop).map_err(|e| e.in_field(&prop.name))?;
            properties.insert(prop.storage_key().to_string(), schema);
        }
        self.expanding.pop();
        entry.insert("properties".into(), Node::Obj(properties));
        Ok(entry)
    }
}

pub(crate) fn schema_type(kind: &str) -> NodeMap {
    let mut entry = NodeMap::new();
    entry.insert("type".into(), Node::from(kind));
    entry
}
