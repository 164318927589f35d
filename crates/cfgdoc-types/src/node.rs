use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Insertion-ordered object map. Keys are unique; order is kept so that
/// serialization is deterministic, but carries no meaning of its own.
pub type NodeMap = IndexMap<String, Node>;

/// The universal document value.
///
/// Every typed configuration object is bound to a tree of `Node`s before it
/// reaches storage. The tree is acyclic: cross-references between parts of a
/// document are `Str` nodes holding a path, never shared sub-trees.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Node {
    #[default]
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Node>),
    Obj(NodeMap),
}

impl Node {
    /// An empty object node.
    pub fn object() -> Self {
        Node::Obj(NodeMap::new())
    }

    /// An empty list node.
    pub fn list() -> Self {
        Node::List(Vec::new())
    }

    /// Build an object node from key/value pairs, keeping their order.
    pub fn obj<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Node)>,
    {
        Node::Obj(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    pub fn is_obj(&self) -> bool {
        matches!(self, Node::Obj(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Node::List(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Node::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Node>> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_obj(&self) -> Option<&NodeMap> {
        match self {
            Node::Obj(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_obj_mut(&mut self) -> Option<&mut NodeMap> {
        match self {
            Node::Obj(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a child of an object node. Returns `None` for other shapes.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_obj().and_then(|map| map.get(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.as_obj_mut().and_then(|map| map.get_mut(key))
    }

    /// Short name of the node's shape, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::Bool(_) => "bool",
            Node::Num(_) => "number",
            Node::Str(_) => "string",
            Node::List(_) => "list",
            Node::Obj(_) => "object",
        }
    }

    /// Textual form of a scalar, as compared by path predicates and emitted
    /// for stringified map keys. Integral numbers print without a fraction.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Node::Str(s) => Some(s.clone()),
            Node::Num(n) => Some(format_number(*n)),
            Node::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Number of direct children (0 for scalars).
    pub fn len(&self) -> usize {
        match self {
            Node::List(items) => items.len(),
            Node::Obj(map) => map.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert into a `serde_json::Value`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::from(self.clone())
    }
}

/// Format a number the way it is written into text backends: integral
/// values lose their fraction (`8080.0` → `"8080"`).
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<serde_json::Value> for Node {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Node::Null,
            serde_json::Value::Bool(b) => Node::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Node::Num).unwrap_or(Node::Null),
            serde_json::Value::String(s) => Node::Str(s),
            serde_json::Value::Array(items) => {
                Node::List(items.into_iter().map(Node::from).collect())
            }
            serde_json::Value::Object(map) => {
                Node::Obj(map.into_iter().map(|(k, v)| (k, Node::from(v))).collect())
            }
        }
    }
}

impl From<Node> for serde_json::Value {
    fn from(node: Node) -> Self {
        match node {
            Node::Null => serde_json::Value::Null,
            Node::Bool(b) => serde_json::Value::Bool(b),
            Node::Num(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
                    serde_json::Value::from(n as i64)
                } else {
                    serde_json::Number::from_f64(n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Node::Str(s) => serde_json::Value::String(s),
            Node::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Node::Obj(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Bool(b)
    }
}

impl From<i64> for Node {
    fn from(n: i64) -> Self {
        Node::Num(n as f64)
    }
}

impl From<i32> for Node {
    fn from(n: i32) -> Self {
        Node::Num(f64::from(n))
    }
}

impl From<f64> for Node {
    fn from(n: f64) -> Self {
        Node::Num(n)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Str(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Str(s)
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::List(items)
    }
}

impl From<NodeMap> for Node {
    fn from(map: NodeMap) -> Self {
        Node::Obj(map)
    }
}
