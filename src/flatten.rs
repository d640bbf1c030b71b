//! Conversion between nested JSON objects and flat `key.path -> string` maps.
//!
//! PNG text chunks are a flat keyword/text store, so nested documents are
//! flattened on write and rebuilt on read. Every leaf becomes a string, so a
//! round-trip returns the original structure with string-coerced leaves.
//!
//! ```rust
//! use pngmeta::config::CollisionPolicy;
//! use pngmeta::flatten::{flatten, unflatten};
//! use serde_json::json;
//!
//! let doc = json!({"camera": {"make": "Acme", "iso": 200}});
//! let flat = flatten(doc.as_object().unwrap(), ".", CollisionPolicy::LastWins).unwrap();
//! assert_eq!(flat["camera.iso"], "200");
//!
//! let nested = unflatten(&flat, ".", CollisionPolicy::LastWins).unwrap();
//! assert_eq!(nested["camera"]["iso"], "200");
//! ```

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::config::CollisionPolicy;
use crate::error::MetadataError;

/// Flat keyword → text mapping. Sorted so every traversal is deterministic.
pub type FlatMap = BTreeMap<String, String>;

/// Flatten a nested JSON object into `sep`-joined key paths.
///
/// Objects are descended into; every other value is a leaf and is rendered
/// with [`leaf_to_string`]. Empty nested objects contribute nothing.
pub fn flatten(
    doc: &Map<String, Value>,
    sep: &str,
    policy: CollisionPolicy,
) -> Result<FlatMap, MetadataError> {
    if sep.is_empty() {
        return Err(MetadataError::EmptySeparator);
    }
    let mut flat = FlatMap::new();
    flatten_into(doc, None, sep, policy, &mut flat)?;

    // A leaf that is also an ancestor path cannot be unflattened strictly
    if policy == CollisionPolicy::Reject {
        if let Some(key) = find_prefix_collision(&flat, sep) {
            return Err(MetadataError::KeyCollision { key });
        }
    }
    Ok(flat)
}

/// Find a key that is also the `sep`-terminated prefix of another key.
fn find_prefix_collision(flat: &FlatMap, sep: &str) -> Option<String> {
    flat.keys().find_map(|key| {
        key.match_indices(sep)
            .map(|(pos, _)| &key[..pos])
            .find(|prefix| flat.contains_key(*prefix))
            .map(str::to_string)
    })
}

fn flatten_into(
    map: &Map<String, Value>,
    parent: Option<&str>,
    sep: &str,
    policy: CollisionPolicy,
    out: &mut FlatMap,
) -> Result<(), MetadataError> {
    for (key, value) in map {
        let path = match parent {
            Some(p) => format!("{p}{sep}{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(child) => flatten_into(child, Some(&path), sep, policy, out)?,
            leaf => {
                let text = leaf_to_string(leaf);
                if let Some(previous) = out.insert(path.clone(), text) {
                    match policy {
                        CollisionPolicy::Reject => {
                            return Err(MetadataError::KeyCollision { key: path });
                        }
                        CollisionPolicy::LastWins => {
                            log::warn!("Key '{path}' produced twice, dropping earlier value '{previous}'");
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Render a leaf value as chunk text.
///
/// Strings are stored raw. Numbers, booleans and `null` use their JSON text,
/// so booleans come out as `true`/`false` and null as `null`. Files written by
/// Python's `str()` carry `True`/`False`/`None` instead, and those strings are
/// read back verbatim. Arrays are stored as compact JSON and are not split into
/// elements, so they come back as a single string on read.
pub fn leaf_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Rebuild a nested object from a flat map by splitting keys on `sep`.
///
/// Entries are applied in sorted key order, so the result does not depend on
/// the order the chunks were stored in.
pub fn unflatten(
    flat: &FlatMap,
    sep: &str,
    policy: CollisionPolicy,
) -> Result<Map<String, Value>, MetadataError> {
    if sep.is_empty() {
        return Err(MetadataError::EmptySeparator);
    }

    let mut root = Map::new();
    for (compound, text) in flat {
        let segments: Vec<&str> = compound.split(sep).collect();
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => continue,
        };

        let mut node = &mut root;
        for (depth, segment) in parents.iter().enumerate() {
            let slot = node
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() && policy == CollisionPolicy::LastWins {
                log::warn!(
                    "'{compound}' replaces scalar value at '{}'",
                    segments[..=depth].join(sep)
                );
                *slot = Value::Object(Map::new());
            }
            node = match slot {
                Value::Object(child) => child,
                _ => {
                    return Err(MetadataError::KeyCollision {
                        key: segments[..=depth].join(sep),
                    });
                }
            };
        }

        if let Some(Value::Object(_)) = node.get(*last) {
            match policy {
                CollisionPolicy::Reject => {
                    return Err(MetadataError::KeyCollision { key: compound.clone() });
                }
                CollisionPolicy::LastWins => {
                    log::warn!("'{compound}' replaces a nested object");
                }
            }
        }
        node.insert(last.to_string(), Value::String(text.clone()));
    }

    Ok(root)
}
