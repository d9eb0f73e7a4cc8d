//! Core types shared by the store, the filters and the templates.

use serde::Serialize;
use std::fmt;

/// Values held by a store.
pub type Value = serde_json::Value;

/// A store's key-value mapping.
pub type Map = serde_json::Map<String, Value>;

/// What a change record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// The key did not exist before the write.
    New,
    /// The key existed; the record carries the previous value.
    Updated,
    /// The key was removed.
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::New => "new",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// Location of a mapping inside a store, as the segments leading to it.
///
/// The empty path is the store's root mapping.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ObjectPath(Vec<String>);

impl ObjectPath {
    /// The store's root mapping.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// True when this is the store itself rather than a nested mapping.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Dotted path of `name` inside this mapping.
    pub fn child(&self, name: &str) -> String {
        if self.is_root() {
            name.to_string()
        } else {
            format!("{}.{}", self.0.join("."), name)
        }
    }
}

impl fmt::Debug for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectPath({:?})", self.0.join("."))
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// A single mutation of an observable store.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChangeRecord {
    /// new, updated or deleted.
    #[serde(rename = "type")]
    pub kind: ChangeKind,

    /// The key that was written or removed. For path operations this is the
    /// last segment of the path.
    pub name: String,

    /// The mapping that was mutated: the root for key operations, the
    /// immediate parent of `name` for path operations.
    pub object: ObjectPath,

    /// The previous value, when there was one.
    #[serde(rename = "oldValue", skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
}

impl ChangeRecord {
    /// Full dotted path of the changed key.
    pub fn path(&self) -> String {
        self.object.child(&self.name)
    }
}

/// JavaScript truthiness: `null`, `false`, `0` and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_path_child() {
        assert_eq!(ObjectPath::root().child("title"), "title");
        assert_eq!(ObjectPath::new(["a", "b"]).child("c"), "a.b.c");
        assert!(ObjectPath::root().is_root());
        assert!(!ObjectPath::new(["a"]).is_root());
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
    }

    #[test]
    fn test_record_serializes_like_a_change_record() {
        let record = ChangeRecord {
            kind: ChangeKind::Updated,
            name: "title".to_string(),
            object: ObjectPath::new(["todo"]),
            old_value: Some(json!("old")),
        };

        let encoded = serde_json::to_value(&record).unwrap();
        assert_eq!(
            encoded,
            json!({"type": "updated", "name": "title", "object": ["todo"], "oldValue": "old"})
        );
        assert_eq!(record.path(), "todo.title");
    }

    #[test]
    fn test_new_record_omits_old_value() {
        let record = ChangeRecord {
            kind: ChangeKind::New,
            name: "a".to_string(),
            object: ObjectPath::root(),
            old_value: None,
        };

        let encoded = serde_json::to_value(&record).unwrap();
        assert!(encoded.get("oldValue").is_none());
    }
}
