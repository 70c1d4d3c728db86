//! Property collector specifications and results.

use crate::mor::ManagedObjectRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema-less attribute value returned by the property collector.
///
/// `Absent` stands for "this attribute does not apply to the object". The
/// collector itself never emits it inside a record; it is what lookups of a
/// missing key resolve to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// No value.
    #[default]
    Absent,
    /// Text value.
    String(String),
    /// Integer value (covers `int`, `long` and `short`).
    Int(i64),
    /// Boolean value.
    Bool(bool),
    /// Enumeration literal (e.g. `running` for `guest.guestState`).
    Enum(String),
    /// Reference to another managed object.
    Reference(ManagedObjectRef),
    /// Array value.
    List(Vec<PropertyValue>),
    /// Nested data object, keyed by field name.
    Object(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Check for `Absent`.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Text of a string or enum value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Referenced object.
    pub fn as_reference(&self) -> Option<&ManagedObjectRef> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Render as plain JSON (references become `{"type", "value"}` objects).
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Absent => Value::Null,
            Self::String(s) | Self::Enum(s) => Value::String(s.clone()),
            Self::Int(n) => Value::from(*n),
            Self::Bool(b) => Value::Bool(*b),
            Self::Reference(r) => serde_json::json!({ "type": r.kind, "value": r.value }),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<ManagedObjectRef> for PropertyValue {
    fn from(value: ManagedObjectRef) -> Self {
        Self::Reference(value)
    }
}

/// How to walk from one object to related objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalSpec {
    /// Name other selection specs can refer to.
    pub name: String,
    /// Type the traversal applies to.
    #[serde(rename = "type")]
    pub kind: String,
    /// Property holding the related objects.
    pub path: String,
    /// Whether objects reached through `path` are excluded from results.
    pub skip: bool,
}

/// Starting point of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSpec {
    /// Starting object.
    pub obj: ManagedObjectRef,
    /// Whether the starting object itself is excluded from results.
    pub skip: bool,
    /// Traversals applied from the starting object.
    #[serde(default)]
    pub select_set: Vec<TraversalSpec>,
}

/// Which properties to return for objects of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySpec {
    /// Object type the spec applies to.
    #[serde(rename = "type")]
    pub kind: String,
    /// Return every property of the type.
    pub all: bool,
    /// Property paths to return when `all` is false.
    #[serde(default)]
    pub path_set: Vec<String>,
}

/// One filter passed to a property retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyFilterSpec {
    /// Starting points.
    pub object_set: Vec<ObjectSpec>,
    /// Properties to collect.
    pub prop_set: Vec<PropertySpec>,
}

/// A single `(name, value)` pair returned for an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicProperty {
    /// Property path.
    pub name: String,
    /// Property value.
    pub val: PropertyValue,
}

impl DynamicProperty {
    /// Create a property pair.
    pub fn new(name: impl Into<String>, val: impl Into<PropertyValue>) -> Self {
        Self {
            name: name.into(),
            val: val.into(),
        }
    }
}

/// A requested property the endpoint could not return for an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingProperty {
    /// Property path.
    pub path: String,
    /// Fault type explaining why it is missing.
    pub fault: String,
}

/// Properties returned for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectContent {
    /// The object the properties belong to.
    pub obj: ManagedObjectRef,
    /// Returned properties. Requested properties that do not apply are simply absent.
    #[serde(default)]
    pub prop_set: Vec<DynamicProperty>,
    /// Requested properties that faulted.
    #[serde(default)]
    pub missing_set: Vec<MissingProperty>,
}
