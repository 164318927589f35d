//! Document operations shared by the whole-tree backends.
//!
//! Writes never touch the current tree: they produce the next version, which
//! the backend swaps in once it is durable.

use cfgdoc_olock::{strip_side_fields, take_expected_hash, OlockEngine};
use cfgdoc_path::Path;
use cfgdoc_types::{ConfigError, Node, Result};
use tracing::{debug, warn};

/// The non-null node at `path`, if any.
pub(crate) fn lookup<'a>(root: &'a Node, path: &Path) -> Result<Option<&'a Node>> {
    Ok(path.resolve(root)?.filter(|n| !n.is_null()))
}

pub(crate) fn read(root: &Node, path: &Path) -> Result<Node> {
    lookup(root, path)?
        .cloned()
        .ok_or_else(|| ConfigError::not_found(path.to_string()))
}

/// Check the write against what is stored and strip side fields.
pub(crate) fn check_write(
    engine: &OlockEngine,
    path: &Path,
    stored: Option<&Node>,
    node: &mut Node,
) -> Result<()> {
    match (take_expected_hash(node), stored) {
        (Some(expected), Some(stored)) => {
            let actual = engine.digest(stored).to_base64();
            if actual != expected {
                warn!(path = %path, expected = %expected, actual = %actual, "olock conflict");
                return Err(ConfigError::Conflict {
                    path: path.to_string(),
                    expected,
                    actual,
                });
            }
        }
        (Some(expected), None) => {
            warn!(path = %path, expected = %expected, "olock conflict: node is gone");
            return Err(ConfigError::Conflict {
                path: path.to_string(),
                expected,
                actual: "<absent>".to_string(),
            });
        }
        (None, Some(_)) => return Err(ConfigError::AlreadyExists { path: path.to_string() }),
        (None, None) => {}
    }
    strip_side_fields(node);
    Ok(())
}

/// The document after writing `node` at `path`.
pub(crate) fn write(engine: &OlockEngine, root: &Node, path: &Path, mut node: Node) -> Result<Node> {
    check_write(engine, path, lookup(root, path)?, &mut node)?;
    let mut next = root.clone();
    path.set(&mut next, node)?;
    debug!(path = %path, "node written");
    Ok(next)
}

/// The document after removing the node at `path`.
pub(crate) fn remove(root: &Node, path: &Path) -> Result<Node> {
    if lookup(root, path)?.is_none() {
        return Err(ConfigError::not_found(path.to_string()));
    }
    let mut next = root.clone();
    path.remove(&mut next)?;
    debug!(path = %path, "node removed");
    Ok(next)
}
