//! # Value Model
//!
//! Dynamic, tagged document type used for every message body.
//!
//! `Value` is a closed sum type. Typed access goes through [`ValueKind`]
//! markers and never coerces between variants: asking for a `String` from an
//! `Int32` is a [`ProtocolError::TypeMismatch`] on the strict path and `None`
//! on the safe path, never an empty string.
//!
//! ## Example
//! ```rust
//! use discord_ipc::core::value::{Map, Value};
//!
//! let mut doc = Value::object();
//! *doc.at_mut("cmd").unwrap() = Value::from("SET_ACTIVITY");
//! doc.insert("args", Map::new()).unwrap();
//!
//! assert!(doc.has("cmd").unwrap());
//! assert_eq!(doc.at("cmd").unwrap().get_as::<String>().unwrap(), "SET_ACTIVITY");
//! assert!(doc.safe_at("missing").is_none());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ProtocolError, Result};

/// Key-value mapping used by [`Value::Object`].
///
/// Keys are unique and iterate in key order, so serialization is stable.
pub type Map = BTreeMap<String, Value>;

/// A dynamically typed document node.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Str(String),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Bool(bool),
    List(Vec<Value>),
    Object(Map),
}

impl Value {
    /// An empty object.
    pub fn object() -> Self {
        Value::Object(Map::new())
    }

    /// An empty list.
    pub fn list() -> Self {
        Value::List(Vec::new())
    }

    /// Name of the active variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Str(_) => "string",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    fn mismatch(&self, expected: &'static str) -> ProtocolError {
        ProtocolError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }

    /// Looks up `key` on an object.
    ///
    /// # Errors
    /// `TypeMismatch` if the receiver is not an object, `MissingKey` if the
    /// key is absent.
    pub fn at(&self, key: &str) -> Result<&Value> {
        match self {
            Value::Object(map) => map
                .get(key)
                .ok_or_else(|| ProtocolError::MissingKey(key.to_string())),
            other => Err(other.mismatch(Map::NAME)),
        }
    }

    /// Returns the entry for `key`, inserting `Null` if it does not exist.
    ///
    /// # Errors
    /// `TypeMismatch` if the receiver is not an object.
    pub fn at_mut(&mut self, key: &str) -> Result<&mut Value> {
        match self {
            Value::Object(map) => Ok(map.entry(key.to_string()).or_default()),
            other => Err(other.mismatch(Map::NAME)),
        }
    }

    /// Looks up `key`, returning `None` for missing keys and non-objects.
    pub fn safe_at(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Whether an object contains `key`.
    ///
    /// # Errors
    /// `TypeMismatch` if the receiver is not an object.
    pub fn has(&self, key: &str) -> Result<bool> {
        match self {
            Value::Object(map) => Ok(map.contains_key(key)),
            other => Err(other.mismatch(Map::NAME)),
        }
    }

    /// Appends to a list.
    ///
    /// # Errors
    /// `TypeMismatch` if the receiver is not a list.
    pub fn push(&mut self, item: impl Into<Value>) -> Result<()> {
        match self {
            Value::List(items) => {
                items.push(item.into());
                Ok(())
            }
            other => Err(other.mismatch(<Vec<Value>>::NAME)),
        }
    }

    /// Inserts `key` into an object, replacing any previous value.
    ///
    /// # Errors
    /// `TypeMismatch` if the receiver is not an object.
    pub fn insert(&mut self, key: impl Into<String>, item: impl Into<Value>) -> Result<Option<Value>> {
        match self {
            Value::Object(map) => Ok(map.insert(key.into(), item.into())),
            other => Err(other.mismatch(Map::NAME)),
        }
    }

    /// Strict typed view of the active variant.
    ///
    /// # Errors
    /// `TypeMismatch` when the active variant is not `T`.
    pub fn get_as<T: ValueKind>(&self) -> Result<&T> {
        T::extract(self).ok_or_else(|| self.mismatch(T::NAME))
    }

    /// Typed view of the active variant, `None` on mismatch.
    pub fn safe_as<T: ValueKind>(&self) -> Option<&T> {
        T::extract(self)
    }

    /// Whether the active variant is `T`.
    pub fn is<T: ValueKind>(&self) -> bool {
        T::extract(self).is_some()
    }

    /// Shorthand for `safe_as::<String>()` returning `&str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Marker for the Rust types a [`Value`] variant can be viewed as.
///
/// Implemented for [`Null`], `String`, `i32`, `i64`, `f64`, `bool`,
/// `Vec<Value>` and [`Map`].
pub trait ValueKind: sealed::Sealed {
    /// Variant name reported in type-mismatch errors.
    const NAME: &'static str;

    /// Borrow the payload if `value` holds this variant.
    fn extract(value: &Value) -> Option<&Self>;
}

/// Marker type for the `Null` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Null;

static NULL: Null = Null;

macro_rules! value_kind {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl sealed::Sealed for $ty {}

        impl ValueKind for $ty {
            const NAME: &'static str = $name;

            #[inline]
            fn extract(value: &Value) -> Option<&Self> {
                match value {
                    Value::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

value_kind!(String, Str, "string");
value_kind!(i32, Int32, "int32");
value_kind!(i64, Int64, "int64");
value_kind!(f64, Float64, "float64");
value_kind!(bool, Bool, "bool");
value_kind!(Vec<Value>, List, "list");
value_kind!(Map, Object, "object");

impl sealed::Sealed for Null {}

impl ValueKind for Null {
    const NAME: &'static str = "null";

    fn extract(value: &Value) -> Option<&Self> {
        match value {
            Value::Null => Some(&NULL),
            _ => None,
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<Null> for Value {
    fn from(_: Null) -> Self {
        Value::Null
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float64(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Object(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::core::serializer::stringify(self))
    }
}

impl FromStr for Value {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        crate::core::parser::parse(s)
    }
}
