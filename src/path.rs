//! Dot-path traversal over JSON mappings.
//!
//! Reads are lenient: a missing or non-mapping intermediate yields `None`,
//! and array elements can be addressed by index. Writes create absent (or
//! `null`) intermediate mappings and refuse to write through anything else.
//! Deletes require every intermediate to exist already.

use crate::error::{Result, StoreError};
use crate::types::{Map, ObjectPath, Value};

/// Outcome of a path write or delete.
#[derive(Clone, Debug, PartialEq)]
pub struct PathWrite {
    /// The mapping holding `name`.
    pub parent: ObjectPath,
    /// Last segment of the path.
    pub name: String,
    /// Value previously stored under `name`, if any.
    pub old_value: Option<Value>,
}

/// Split a dotted path into its segments. Empty segments are rejected.
pub fn split(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

/// Step from a value into one of its children.
pub fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Value located at `segments` below `map`.
pub fn get_in<'a, S: AsRef<str>>(map: &'a Map, segments: &[S]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    rest.iter()
        .try_fold(map.get(first.as_ref())?, |value, segment| {
            child(value, segment.as_ref())
        })
}

/// Value located at dotted `path` below `map`.
pub fn get_path<'a>(path: &str, map: &'a Map) -> Option<&'a Value> {
    let segments = split(path).ok()?;
    get_in(map, &segments)
}

/// Write `value` at dotted `path`, creating intermediate mappings.
pub fn set_path(path: &str, value: Value, map: &mut Map) -> Result<PathWrite> {
    let segments = split(path)?;
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;

    let mut target = map;
    for (depth, segment) in parents.iter().enumerate() {
        let slot = target
            .entry(segment.to_string())
            .or_insert(Value::Null);
        if slot.is_null() {
            *slot = Value::Object(Map::new());
        }
        target = match slot {
            Value::Object(inner) => inner,
            _ => {
                return Err(StoreError::NotAMapping {
                    path: path.to_string(),
                    segment: parents[..=depth].join("."),
                })
            }
        };
    }

    let old_value = target.insert(last.to_string(), value);
    Ok(PathWrite {
        parent: ObjectPath::new(parents.iter().copied()),
        name: last.to_string(),
        old_value,
    })
}

/// Remove the key at dotted `path`. Every intermediate must be a mapping.
pub fn unset_path(path: &str, map: &mut Map) -> Result<PathWrite> {
    let segments = split(path)?;
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;

    let mut target = map;
    for (depth, segment) in parents.iter().enumerate() {
        target = match target.get_mut(*segment) {
            Some(Value::Object(inner)) => inner,
            Some(_) => {
                return Err(StoreError::NotAMapping {
                    path: path.to_string(),
                    segment: parents[..=depth].join("."),
                })
            }
            None => {
                return Err(StoreError::MissingSegment {
                    path: path.to_string(),
                    segment: parents[..=depth].join("."),
                })
            }
        };
    }

    let old_value = target.remove(*last);
    Ok(PathWrite {
        parent: ObjectPath::new(parents.iter().copied()),
        name: last.to_string(),
        old_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_split_rejects_empty_segments() {
        assert_eq!(split("a.b").unwrap(), vec!["a", "b"]);
        assert!(matches!(split(""), Err(StoreError::InvalidPath(_))));
        assert!(matches!(split("a..b"), Err(StoreError::InvalidPath(_))));
        assert!(matches!(split("a."), Err(StoreError::InvalidPath(_))));
    }

    #[test]
    fn test_set_path_creates_intermediates() {
        let mut data = Map::new();
        let write = set_path("a.b.c", json!(1), &mut data).unwrap();

        assert_eq!(Value::Object(data.clone()), json!({"a": {"b": {"c": 1}}}));
        assert_eq!(write.parent, ObjectPath::new(["a", "b"]));
        assert_eq!(write.name, "c");
        assert_eq!(write.old_value, None);
        assert_eq!(get_path("a.b.c", &data), Some(&json!(1)));
    }

    #[test]
    fn test_set_path_replaces_null_intermediate() {
        let mut data = map(json!({"a": null}));
        set_path("a.b", json!(true), &mut data).unwrap();
        assert_eq!(Value::Object(data), json!({"a": {"b": true}}));
    }

    #[test]
    fn test_set_path_refuses_non_mapping() {
        let mut data = map(json!({"a": {"b": "text"}}));
        let err = set_path("a.b.c", json!(1), &mut data).unwrap_err();

        match err {
            StoreError::NotAMapping { segment, .. } => assert_eq!(segment, "a.b"),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(Value::Object(data), json!({"a": {"b": "text"}}));
    }

    #[test]
    fn test_get_path_is_lenient() {
        let data = map(json!({"a": {"b": 2}, "s": "str", "list": [{"t": "x"}]}));

        assert_eq!(get_path("a.x.y", &data), None);
        assert_eq!(get_path("s.length", &data), None);
        assert_eq!(get_path("list.0.t", &data), Some(&json!("x")));
        assert_eq!(get_path("list.9.t", &data), None);
        assert_eq!(get_path("a..b", &data), None);
    }

    #[test]
    fn test_unset_path() {
        let mut data = map(json!({"a": {"b": 1, "c": 2}}));
        let write = unset_path("a.b", &mut data).unwrap();

        assert_eq!(write.old_value, Some(json!(1)));
        assert_eq!(Value::Object(data.clone()), json!({"a": {"c": 2}}));

        let write = unset_path("a.zzz", &mut data).unwrap();
        assert_eq!(write.old_value, None);
    }

    #[test]
    fn test_unset_path_requires_intermediates() {
        let mut data = map(json!({"a": 5}));

        assert!(matches!(
            unset_path("x.y", &mut data),
            Err(StoreError::MissingSegment { .. })
        ));
        assert!(matches!(
            unset_path("a.y", &mut data),
            Err(StoreError::NotAMapping { .. })
        ));
    }
}
