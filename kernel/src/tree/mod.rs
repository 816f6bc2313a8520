// Tree Values
//
// Generic in-memory form of parsed plan documents. Every other
// component of the kernel reads these trees; none of them mutates one.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

pub mod mask;
pub mod path;

/// Structural kind of a tree node.
///
/// Booleans, numbers and strings share the `Scalar` kind: two scalars are
/// compared by their text, never by their JSON type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueKind {
    Null,
    Scalar,
    Object,
    Array,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Null => "Null",
            ValueKind::Scalar => "Scalar",
            ValueKind::Object => "Object",
            ValueKind::Array => "Array",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed JSON-like value.
///
/// Numbers keep the literal text they were parsed from. Object members keep
/// their document order and names are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeValue {
    Null,
    Bool(bool),
    Number(String),
    String(String),
    Object(Vec<(String, TreeValue)>),
    Array(Vec<TreeValue>),
}

impl TreeValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TreeValue::Null => ValueKind::Null,
            TreeValue::Bool(_) | TreeValue::Number(_) | TreeValue::String(_) => {
                ValueKind::Scalar
            }
            TreeValue::Object(_) => ValueKind::Object,
            TreeValue::Array(_) => ValueKind::Array,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TreeValue::Null)
    }

    /// Look up an object member by name. `None` for missing members and for
    /// non-object nodes.
    pub fn get(&self, name: &str) -> Option<&TreeValue> {
        match self {
            TreeValue::Object(members) => members
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TreeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[TreeValue]> {
        match self {
            TreeValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Canonical text of the node.
    ///
    /// Scalars render as their bare text (strings unquoted), containers as
    /// compact JSON.
    pub fn text(&self) -> String {
        match self {
            TreeValue::Bool(b) => b.to_string(),
            TreeValue::Number(n) => n.clone(),
            TreeValue::String(s) => s.clone(),
            other => serde_json::Value::from(other).to_string(),
        }
    }
}

impl fmt::Display for TreeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl From<serde_json::Value> for TreeValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => TreeValue::Null,
            serde_json::Value::Bool(b) => TreeValue::Bool(b),
            serde_json::Value::Number(n) => TreeValue::Number(n.to_string()),
            serde_json::Value::String(s) => TreeValue::String(s),
            serde_json::Value::Array(items) => {
                TreeValue::Array(items.into_iter().map(TreeValue::from).collect())
            }
            serde_json::Value::Object(members) => TreeValue::Object(
                members
                    .into_iter()
                    .map(|(key, value)| (key, TreeValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&TreeValue> for serde_json::Value {
    fn from(value: &TreeValue) -> Self {
        match value {
            TreeValue::Null => serde_json::Value::Null,
            TreeValue::Bool(b) => serde_json::Value::Bool(*b),
            TreeValue::Number(n) => match serde_json::Number::from_str(n) {
                Ok(number) => serde_json::Value::Number(number),
                Err(_) => serde_json::Value::String(n.clone()),
            },
            TreeValue::String(s) => serde_json::Value::String(s.clone()),
            TreeValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            TreeValue::Object(members) => serde_json::Value::Object(
                members
                    .iter()
                    .map(|(key, value)| (key.clone(), serde_json::Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for TreeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_json::Value::from(self).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conversion_keeps_member_order() {
        let tree = TreeValue::from(json!({"zeta": 1, "alpha": 2, "mid": 3}));
        let TreeValue::Object(members) = &tree else {
            panic!("expected object");
        };
        let names: Vec<_> = members.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn scalar_text_is_unquoted() {
        assert_eq!(TreeValue::from(json!("prod")).text(), "prod");
        assert_eq!(TreeValue::from(json!(true)).text(), "true");
        assert_eq!(TreeValue::from(json!(42)).text(), "42");
    }

    #[test]
    fn number_text_keeps_literal_spelling() {
        let value: serde_json::Value = serde_json::from_str("1.50").unwrap();
        assert_eq!(TreeValue::from(value).text(), "1.50");
    }

    #[test]
    fn container_text_is_compact_json() {
        let tree = TreeValue::from(json!({"b": [1, "x"], "a": null}));
        assert_eq!(tree.text(), r#"{"b":[1,"x"],"a":null}"#);
    }

    #[test]
    fn scalars_share_a_kind() {
        assert_eq!(TreeValue::from(json!("5")).kind(), ValueKind::Scalar);
        assert_eq!(TreeValue::from(json!(5)).kind(), ValueKind::Scalar);
        assert_eq!(TreeValue::from(json!(false)).kind(), ValueKind::Scalar);
        assert_eq!(TreeValue::Null.kind(), ValueKind::Null);
    }
}
