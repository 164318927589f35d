//! Walking and mutating a node tree along a [`Path`].

use cfgdoc_types::{ConfigError, Node, Result};

use crate::path::{Path, PathSegment};

/// Position of the child a segment selects inside `node`.
enum Slot<'n> {
    Key(&'n str),
    Owned(String),
    Index(usize),
}

/// Find which child of `node` a segment designates.
///
/// `Ok(None)` means the child is absent; an error means the segment cannot
/// address this kind of container at all.
fn locate<'n>(node: &Node, segment: &'n PathSegment, path: &Path) -> Result<Option<Slot<'n>>> {
    match (segment, node) {
        (_, Node::Null) => Ok(None),
        (PathSegment::Key(key), Node::Obj(map)) => Ok(map
            .contains_key(key.as_str())
            .then_some(Slot::Key(key.as_str()))),
        (PathSegment::Index(i), Node::List(items)) => {
            Ok((*i < items.len()).then_some(Slot::Index(*i)))
        }
        (PathSegment::Predicate { key, value }, Node::Obj(map)) => Ok(map
            .iter()
            .find(|(_, child)| field_equals(child, key, value))
            .map(|(k, _)| Slot::Owned(k.clone()))),
        (PathSegment::Predicate { key, value }, Node::List(items)) => Ok(items
            .iter()
            .position(|child| field_equals(child, key, value))
            .map(Slot::Index)),
        (segment, other) => Err(ConfigError::malformed_path(
            path.to_string(),
            format!("segment {segment} cannot address a {} node", other.kind_name()),
        )),
    }
}

fn field_equals(child: &Node, key: &str, value: &str) -> bool {
    child
        .get(key)
        .and_then(Node::scalar_text)
        .is_some_and(|text| text == value)
}

fn child<'a>(node: &'a Node, slot: &Slot<'_>) -> Option<&'a Node> {
    match (slot, node) {
        (Slot::Key(k), Node::Obj(map)) => map.get(*k),
        (Slot::Owned(k), Node::Obj(map)) => map.get(k.as_str()),
        (Slot::Index(i), Node::List(items)) => items.get(*i),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Node, slot: &Slot<'_>) -> Option<&'a mut Node> {
    match (slot, node) {
        (Slot::Key(k), Node::Obj(map)) => map.get_mut(*k),
        (Slot::Owned(k), Node::Obj(map)) => map.get_mut(k.as_str()),
        (Slot::Index(i), Node::List(items)) => items.get_mut(*i),
        _ => None,
    }
}

fn concrete(slot: Slot<'_>) -> PathSegment {
    match slot {
        Slot::Key(k) => PathSegment::Key(k.to_string()),
        Slot::Owned(k) => PathSegment::Key(k),
        Slot::Index(i) => PathSegment::Index(i),
    }
}

impl Path {
    /// Look up the node this path designates.
    ///
    /// Returns `Ok(None)` when some step is absent, and `MalformedPath` when a
    /// segment does not fit the container it addresses (an index into an
    /// object, a key into a list, any segment into a scalar).
    pub fn resolve<'a>(&self, root: &'a Node) -> Result<Option<&'a Node>> {
        let mut current = root;
        for segment in self.segments() {
            match locate(current, segment, self)? {
                Some(slot) => match child(current, &slot) {
                    Some(next) => current = next,
                    None => return Ok(None),
                },
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub fn resolve_mut<'a>(&self, root: &'a mut Node) -> Result<Option<&'a mut Node>> {
        let mut current = root;
        for segment in self.segments() {
            let Some(slot) = locate(current, segment, self)? else {
                return Ok(None);
            };
            match child_mut(current, &slot) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Replace predicate segments with the key or index they select, giving
    /// the canonical location of the node. `Ok(None)` if any step is absent.
    pub fn canonicalize(&self, root: &Node) -> Result<Option<Path>> {
        let mut current = root;
        let mut out = Path::root();
        for segment in self.segments() {
            let Some(slot) = locate(current, segment, self)? else {
                return Ok(None);
            };
            let Some(next) = child(current, &slot) else {
                return Ok(None);
            };
            current = next;
            out.push(concrete(slot));
        }
        Ok(Some(out))
    }

    /// Write `value` at this path, returning the node it replaced.
    ///
    /// Missing objects along key segments are created; `Null` intermediates
    /// become empty objects. Index segments may address an existing element
    /// or one past the end (append). Predicate segments must match an
    /// existing child.
    pub fn set(&self, root: &mut Node, value: Node) -> Result<Option<Node>> {
        let Some((last, parents)) = self.segments().split_last() else {
            return Ok(Some(std::mem::replace(root, value)));
        };

        let mut current = root;
        for segment in parents {
            if current.is_null() {
                *current = Node::object();
            }
            let slot = match locate(current, segment, self)? {
                Some(slot) => slot,
                None => match (segment, &mut *current) {
                    (PathSegment::Key(key), Node::Obj(map)) => {
                        map.insert(key.clone(), Node::object());
                        Slot::Key(key.as_str())
                    }
                    _ => return Err(ConfigError::not_found(self.to_string())),
                },
            };
            current = child_mut(current, &slot)
                .ok_or_else(|| ConfigError::not_found(self.to_string()))?;
        }

        if current.is_null() {
            *current = Node::object();
        }
        match (last, current) {
            (PathSegment::Key(key), Node::Obj(map)) => Ok(map.insert(key.clone(), value)),
            (PathSegment::Index(i), Node::List(items)) => {
                if *i < items.len() {
                    Ok(Some(std::mem::replace(&mut items[*i], value)))
                } else if *i == items.len() {
                    items.push(value);
                    Ok(None)
                } else {
                    Err(ConfigError::not_found(self.to_string()))
                }
            }
            (PathSegment::Predicate { .. }, container) => {
                let slot = locate(container, last, self)?
                    .ok_or_else(|| ConfigError::not_found(self.to_string()))?;
                let target = child_mut(container, &slot)
                    .ok_or_else(|| ConfigError::not_found(self.to_string()))?;
                Ok(Some(std::mem::replace(target, value)))
            }
            (segment, other) => Err(ConfigError::malformed_path(
                self.to_string(),
                format!("segment {segment} cannot address a {} node", other.kind_name()),
            )),
        }
    }

    /// Detach and return the node at this path. Removing the root leaves
    /// `Null` behind.
    pub fn remove(&self, root: &mut Node) -> Result<Option<Node>> {
        let Some(parent_path) = self.parent() else {
            return Ok(Some(std::mem::take(root)));
        };
        let Some(parent) = parent_path.resolve_mut(root)? else {
            return Ok(None);
        };
        let Some(last) = self.last() else {
            return Ok(None);
        };
        let Some(slot) = locate(parent, last, self)? else {
            return Ok(None);
        };
        match (slot, parent) {
            (Slot::Key(k), Node::Obj(map)) => Ok(map.shift_remove(k)),
            (Slot::Owned(k), Node::Obj(map)) => Ok(map.shift_remove(&k)),
            (Slot::Index(i), Node::List(items)) => Ok(Some(items.remove(i))),
            _ => Ok(None),
        }
    }
}
