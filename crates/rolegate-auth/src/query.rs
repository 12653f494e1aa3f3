//! Query-string access for the two entry points.
//!
//! Handlers extract the raw `(key, value)` pairs instead of a struct so a
//! repeated key is not a deserialisation error: the first occurrence wins.

/// Raw query pairs in the order they appeared.
pub type QueryPairs = Vec<(String, String)>;

/// Value of the first `key` in `pairs`, if any.
pub fn first(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
}
