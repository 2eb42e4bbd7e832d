//! Component data trees
//!
//! Stored documents are JSON objects. On the way in they are converted into a
//! tagged tree so that references can be matched structurally instead of by
//! probing every object for a `_ref` key.

use crate::error::DataError;
use indexmap::IndexMap;
use indexmap::map::{IntoIter, Iter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Key that marks an object as a reference to another component
pub const REF_KEY: &str = "_ref";

/// A leaf value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

/// Any value inside component data
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentValue {
    Scalar(Scalar),
    Object(ComponentData),
    Sequence(Vec<ComponentValue>),
    Reference(Reference),
}

/// An object carrying a `_ref` key.
///
/// `fields` holds the object's other keys. Before resolution these are
/// usually empty; afterwards they hold the referenced component's data.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub path: String,
    pub fields: ComponentData,
}

impl Reference {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fields: ComponentData::new(),
        }
    }

    /// Whether this reference carries data besides its `_ref`
    pub fn is_bare(&self) -> bool {
        self.fields.is_empty()
    }
}

/// An ordered mapping from field name to value.
///
/// Fields keep the order they were inserted in, so a document reads back with
/// the same shape it was written with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct ComponentData {
    fields: IndexMap<String, ComponentValue>,
}

impl ComponentData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a stored JSON document
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let value: Value = serde_json::from_str(json)?;
        Self::try_from(value)
    }

    /// Serialize to a compact JSON document
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    pub fn to_value(&self) -> Value {
        Value::from(self.clone())
    }

    pub fn get(&self, key: &str) -> Option<&ComponentValue> {
        self.fields.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ComponentValue> {
        self.fields.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ComponentValue) -> Option<ComponentValue> {
        self.fields.insert(key.into(), value)
    }

    /// Remove a field, keeping the order of the rest
    pub fn remove(&mut self, key: &str) -> Option<ComponentValue> {
        self.fields.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, String, ComponentValue> {
        self.fields.iter()
    }

    /// Merge `other` over this data.
    ///
    /// Colliding keys take the value from `other` and keep their position;
    /// new keys are appended. A `_ref` key in `other` never overwrites
    /// anything.
    pub fn merge(&mut self, other: ComponentData) {
        for (key, value) in other {
            if key != REF_KEY {
                self.fields.insert(key, value);
            }
        }
    }

    /// All reference paths in the tree, depth first
    pub fn references(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        for value in self.fields.values() {
            value.collect_references(&mut paths);
        }
        paths
    }

    pub fn has_references(&self) -> bool {
        self.fields.values().any(ComponentValue::has_references)
    }

    fn from_map(map: Map<String, Value>) -> Self {
        map.into_iter()
            .map(|(key, value)| (key, ComponentValue::from(value)))
            .collect()
    }
}

impl ComponentValue {
    pub fn string(value: impl Into<String>) -> Self {
        ComponentValue::Scalar(Scalar::String(value.into()))
    }

    pub fn reference(path: impl Into<String>) -> Self {
        ComponentValue::Reference(Reference::new(path))
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            ComponentValue::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ComponentData> {
        match self {
            ComponentValue::Object(data) => Some(data),
            _ => None,
        }
    }

    fn has_references(&self) -> bool {
        match self {
            ComponentValue::Scalar(_) => false,
            ComponentValue::Reference(_) => true,
            ComponentValue::Object(data) => data.has_references(),
            ComponentValue::Sequence(items) => items.iter().any(Self::has_references),
        }
    }

    fn collect_references<'a>(&'a self, paths: &mut Vec<&'a str>) {
        match self {
            ComponentValue::Scalar(_) => {}
            ComponentValue::Reference(reference) => {
                paths.push(&reference.path);
                for value in reference.fields.fields.values() {
                    value.collect_references(paths);
                }
            }
            ComponentValue::Object(data) => {
                for value in data.fields.values() {
                    value.collect_references(paths);
                }
            }
            ComponentValue::Sequence(items) => {
                for item in items {
                    item.collect_references(paths);
                }
            }
        }
    }
}

impl IntoIterator for ComponentData {
    type Item = (String, ComponentValue);
    type IntoIter = IntoIter<String, ComponentValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a ComponentData {
    type Item = (&'a String, &'a ComponentValue);
    type IntoIter = Iter<'a, String, ComponentValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl FromIterator<(String, ComponentValue)> for ComponentData {
    fn from_iter<I: IntoIterator<Item = (String, ComponentValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// JSON conversions
// ============================================================================

impl TryFrom<Value> for ComponentData {
    type Error = DataError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(DataError::NotAnObject {
                actual: json_kind(&other).to_string(),
            }),
        }
    }
}

impl From<Value> for ComponentValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ComponentValue::Scalar(Scalar::Null),
            Value::Bool(b) => ComponentValue::Scalar(Scalar::Bool(b)),
            Value::Number(n) => ComponentValue::Scalar(Scalar::Number(n)),
            Value::String(s) => ComponentValue::Scalar(Scalar::String(s)),
            Value::Array(items) => {
                ComponentValue::Sequence(items.into_iter().map(Self::from).collect())
            }
            Value::Object(map) => {
                let mut path = None;
                let mut fields = ComponentData::new();
                for (key, value) in map {
                    match value {
                        Value::String(target) if key == REF_KEY => path = Some(target),
                        // A non-string _ref is not a reference; keep it as plain data
                        value => {
                            fields.insert(key, ComponentValue::from(value));
                        }
                    }
                }
                match path {
                    Some(path) => ComponentValue::Reference(Reference { path, fields }),
                    None => ComponentValue::Object(fields),
                }
            }
        }
    }
}

impl From<ComponentData> for Value {
    fn from(data: ComponentData) -> Self {
        Value::Object(
            data.fields
                .into_iter()
                .map(|(key, value)| (key, Value::from(value)))
                .collect(),
        )
    }
}

impl From<ComponentValue> for Value {
    fn from(value: ComponentValue) -> Self {
        match value {
            ComponentValue::Scalar(Scalar::Null) => Value::Null,
            ComponentValue::Scalar(Scalar::Bool(b)) => Value::Bool(b),
            ComponentValue::Scalar(Scalar::Number(n)) => Value::Number(n),
            ComponentValue::Scalar(Scalar::String(s)) => Value::String(s),
            ComponentValue::Object(data) => Value::from(data),
            ComponentValue::Sequence(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            ComponentValue::Reference(reference) => {
                let mut map = Map::new();
                map.insert(REF_KEY.to_string(), Value::String(reference.path));
                for (key, value) in reference.fields {
                    if key != REF_KEY {
                        map.insert(key, Value::from(value));
                    }
                }
                Value::Object(map)
            }
        }
    }
}

/// Human-readable name of a JSON value's type
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> ComponentData {
        ComponentData::try_from(value).unwrap()
    }

    #[test]
    fn test_references_become_tagged() {
        let data = data(json!({
            "a": {"_ref": "/components/b"},
            "c": {"d": {"_ref": "/components/e", "title": "kept"}},
            "list": [{"_ref": "/components/f"}, 3]
        }));

        let a = data.get("a").and_then(ComponentValue::as_reference).unwrap();
        assert_eq!(a.path, "/components/b");
        assert!(a.is_bare());

        let d = data
            .get("c")
            .and_then(ComponentValue::as_object)
            .and_then(|c| c.get("d"))
            .and_then(ComponentValue::as_reference)
            .unwrap();
        assert_eq!(d.fields.get("title"), Some(&ComponentValue::string("kept")));

        assert_eq!(
            data.references(),
            vec!["/components/b", "/components/e", "/components/f"]
        );
    }

    #[test]
    fn test_non_string_ref_is_plain_data() {
        let data = data(json!({"a": {"_ref": 5}}));
        assert!(!data.has_references());
        assert_eq!(data.to_value(), json!({"a": {"_ref": 5}}));
    }

    #[test]
    fn test_json_roundtrip_preserves_shape() {
        let value = json!({
            "a": {"_ref": "/components/b", "g": "h"},
            "n": null,
            "items": [{"x": 1.5}, true]
        });
        assert_eq!(data(value.clone()).to_value(), value);
    }

    #[test]
    fn test_rejects_non_object_documents() {
        assert!(matches!(
            ComponentData::from_json("[1, 2]"),
            Err(DataError::NotAnObject { .. })
        ));
        assert!(matches!(
            ComponentData::from_json("{not json"),
            Err(DataError::Deserialization { .. })
        ));
    }

    #[test]
    fn test_merge_keeps_ref_and_overwrites_fields() {
        let mut own = data(json!({"g": "old", "keep": 1}));
        own.merge(data(json!({"_ref": "/components/other", "g": "new"})));
        assert_eq!(own.to_value(), json!({"g": "new", "keep": 1}));
    }

    #[test]
    fn test_field_order_survives_roundtrip() {
        let raw = r#"{"z":1,"a":{"_ref":"/components/b","y":true,"c":[]},"m":null}"#;
        let parsed = ComponentData::from_json(raw).unwrap();

        assert_eq!(parsed.to_json(), raw);
        let keys: Vec<&str> = parsed.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_merge_appends_new_fields_in_order() {
        let mut own = data(json!({"title": "own", "b": 1}));
        own.merge(data(json!({"z": 2, "title": "fetched"})));
        own.remove("b");
        assert_eq!(own.to_json(), r#"{"title":"fetched","z":2}"#);
    }

    #[test]
    fn test_serde_uses_json_shape() {
        let parsed: ComponentData =
            serde_json::from_str(r#"{"a":{"_ref":"/components/b"}}"#).unwrap();
        assert!(parsed.has_references());
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            r#"{"a":{"_ref":"/components/b"}}"#
        );
    }
}
