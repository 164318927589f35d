//! Reserved keys inside object-shaped nodes.
//!
//! These names are fixed program-wide. They are excluded from normal field
//! iteration and are treated specially by the binder and the hash engine.

/// Key holding an object's generated identity.
pub const UUID_KEY: &str = "#uuid";

/// Key holding an object's optimistic-lock hash.
pub const OLOCK_HASH_KEY: &str = "#olockhash";

/// Side field receiving the previous hash when a node is re-stamped.
pub const OLD_OLOCK_HASH_KEY: &str = "#old_olockhash";

/// Returns `true` for keys that never map to a configurable property.
pub fn is_reserved_key(key: &str) -> bool {
    matches!(key, UUID_KEY | OLOCK_HASH_KEY | OLD_OLOCK_HASH_KEY)
}
