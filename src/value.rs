//! Dynamically typed engine values.
//!
//! The engine's property namespace is untyped and string-keyed, so every value
//! crossing the binding boundary is a [`Value`]. Typed access goes through
//! [`FromValue`] and the property table in [`crate::property`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, Result};

/// Closed tagged value type mirroring the engine's node formats.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
  /// No value (unavailable property, command without result).
  #[default]
  None,
  Flag(bool),
  Int64(i64),
  Double(f64),
  String(String),
  Array(Vec<Value>),
  Map(BTreeMap<String, Value>),
  /// Opaque binary payload.
  ByteArray(Vec<u8>),
}

impl Value {
  /// Short name of the value's format, used in diagnostics.
  pub fn format_name(&self) -> &'static str {
    match self {
      Value::None => "none",
      Value::Flag(_) => "flag",
      Value::Int64(_) => "int64",
      Value::Double(_) => "double",
      Value::String(_) => "string",
      Value::Array(_) => "array",
      Value::Map(_) => "map",
      Value::ByteArray(_) => "byte-array",
    }
  }

  pub fn is_none(&self) -> bool {
    matches!(self, Value::None)
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Value::Flag(b) => Some(*b),
      _ => None,
    }
  }

  /// Numeric view; integers are widened.
  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Value::Double(n) => Some(*n),
      Value::Int64(n) => Some(*n as f64),
      _ => None,
    }
  }

  /// Integer view; doubles are accepted only when they carry no fraction.
  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Value::Int64(n) => Some(*n),
      Value::Double(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_array(&self) -> Option<&[Value]> {
    match self {
      Value::Array(items) => Some(items),
      _ => None,
    }
  }

  pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
    match self {
      Value::Map(map) => Some(map),
      _ => None,
    }
  }

  /// Look up a key in a map value.
  pub fn get(&self, key: &str) -> Option<&Value> {
    self.as_map().and_then(|map| map.get(key))
  }

  /// Render as an engine option string (`key=value` lists, `--key=value` args).
  pub fn to_option_string(&self) -> String {
    match self {
      Value::None => String::new(),
      Value::Flag(true) => "yes".to_string(),
      Value::Flag(false) => "no".to_string(),
      Value::Int64(n) => n.to_string(),
      Value::Double(n) => n.to_string(),
      Value::String(s) => s.clone(),
      Value::Array(_) | Value::Map(_) | Value::ByteArray(_) => {
        serde_json::Value::from(self.clone()).to_string()
      }
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_option_string())
  }
}

impl From<serde_json::Value> for Value {
  fn from(value: serde_json::Value) -> Self {
    match value {
      serde_json::Value::Null => Value::None,
      serde_json::Value::Bool(b) => Value::Flag(b),
      serde_json::Value::Number(n) => match n.as_i64() {
        Some(i) => Value::Int64(i),
        None => Value::Double(n.as_f64().unwrap_or(0.0)),
      },
      serde_json::Value::String(s) => Value::String(s),
      serde_json::Value::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
      serde_json::Value::Object(map) => {
        Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
      }
    }
  }
}

impl From<Value> for serde_json::Value {
  fn from(value: Value) -> Self {
    match value {
      Value::None => serde_json::Value::Null,
      Value::Flag(b) => serde_json::Value::Bool(b),
      Value::Int64(n) => serde_json::Value::from(n),
      // Non-finite doubles have no JSON form
      Value::Double(n) => serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null),
      Value::String(s) => serde_json::Value::String(s),
      Value::Array(items) => {
        serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
      }
      Value::Map(map) => serde_json::Value::Object(
        map
          .into_iter()
          .map(|(k, v)| (k, serde_json::Value::from(v)))
          .collect(),
      ),
      Value::ByteArray(bytes) => {
        serde_json::Value::Array(bytes.into_iter().map(serde_json::Value::from).collect())
      }
    }
  }
}

impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Value::Flag(value)
  }
}

impl From<i64> for Value {
  fn from(value: i64) -> Self {
    Value::Int64(value)
  }
}

impl From<i32> for Value {
  fn from(value: i32) -> Self {
    Value::Int64(value as i64)
  }
}

impl From<u32> for Value {
  fn from(value: u32) -> Self {
    Value::Int64(value as i64)
  }
}

impl From<f64> for Value {
  fn from(value: f64) -> Self {
    Value::Double(value)
  }
}

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Value::String(value.to_string())
  }
}

impl From<String> for Value {
  fn from(value: String) -> Self {
    Value::String(value)
  }
}

impl From<Vec<Value>> for Value {
  fn from(value: Vec<Value>) -> Self {
    Value::Array(value)
  }
}

impl From<BTreeMap<String, Value>> for Value {
  fn from(value: BTreeMap<String, Value>) -> Self {
    Value::Map(value)
  }
}

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(value: Option<T>) -> Self {
    value.map(Into::into).unwrap_or(Value::None)
  }
}

/// Conversion from a dynamically typed [`Value`].
///
/// Mismatched formats fail with [`ErrorCode::PropertyFormat`].
pub trait FromValue: Sized {
  fn from_value(value: Value) -> Result<Self>;
}

impl FromValue for Value {
  fn from_value(value: Value) -> Result<Self> {
    Ok(value)
  }
}

impl FromValue for bool {
  fn from_value(value: Value) -> Result<Self> {
    match value {
      Value::Flag(b) => Ok(b),
      // mpv renders some flags as "yes"/"no" strings
      Value::String(s) if s == "yes" => Ok(true),
      Value::String(s) if s == "no" => Ok(false),
      _ => Err(ErrorCode::PropertyFormat),
    }
  }
}

impl FromValue for f64 {
  fn from_value(value: Value) -> Result<Self> {
    value.as_f64().ok_or(ErrorCode::PropertyFormat)
  }
}

impl FromValue for i64 {
  fn from_value(value: Value) -> Result<Self> {
    value.as_i64().ok_or(ErrorCode::PropertyFormat)
  }
}

impl FromValue for String {
  fn from_value(value: Value) -> Result<Self> {
    match value {
      Value::String(s) => Ok(s),
      _ => Err(ErrorCode::PropertyFormat),
    }
  }
}

impl FromValue for Vec<Value> {
  fn from_value(value: Value) -> Result<Self> {
    match value {
      Value::Array(items) => Ok(items),
      _ => Err(ErrorCode::PropertyFormat),
    }
  }
}

impl FromValue for BTreeMap<String, Value> {
  fn from_value(value: Value) -> Result<Self> {
    match value {
      Value::Map(map) => Ok(map),
      _ => Err(ErrorCode::PropertyFormat),
    }
  }
}

impl<T: FromValue> FromValue for Option<T> {
  fn from_value(value: Value) -> Result<Self> {
    match value {
      Value::None => Ok(None),
      other => T::from_value(other).map(Some),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_json() {
    let json: serde_json::Value = serde_json::from_str(
      r#"{"pause":false,"volume":87.5,"count":3,"title":"x","tracks":[1,null]}"#,
    )
    .unwrap();
    let value = Value::from(json);
    assert_eq!(value.get("pause"), Some(&Value::Flag(false)));
    assert_eq!(value.get("volume"), Some(&Value::Double(87.5)));
    assert_eq!(value.get("count"), Some(&Value::Int64(3)));
    assert_eq!(value.get("title").and_then(Value::as_str), Some("x"));
    assert_eq!(
      value.get("tracks"),
      Some(&Value::Array(vec![Value::Int64(1), Value::None]))
    );
  }

  #[test]
  fn test_byte_array_and_nan_to_json() {
    let json = serde_json::Value::from(Value::ByteArray(vec![1, 2]));
    assert_eq!(json, serde_json::json!([1, 2]));
    let json = serde_json::Value::from(Value::Double(f64::NAN));
    assert!(json.is_null());
  }

  #[test]
  fn test_numeric_coercion() {
    assert_eq!(f64::from_value(Value::Int64(4)), Ok(4.0));
    assert_eq!(i64::from_value(Value::Double(4.0)), Ok(4));
    assert_eq!(
      i64::from_value(Value::Double(4.5)),
      Err(ErrorCode::PropertyFormat)
    );
    assert_eq!(
      bool::from_value(Value::Double(1.0)),
      Err(ErrorCode::PropertyFormat)
    );
    assert_eq!(bool::from_value(Value::from("yes")), Ok(true));
  }

  #[test]
  fn test_optional_values() {
    assert_eq!(Option::<f64>::from_value(Value::None), Ok(None));
    assert_eq!(Option::<f64>::from_value(Value::Double(1.5)), Ok(Some(1.5)));
    assert_eq!(Value::from(None::<i64>), Value::None);
  }

  #[test]
  fn test_option_string() {
    assert_eq!(Value::Flag(true).to_option_string(), "yes");
    assert_eq!(Value::Int64(-2).to_option_string(), "-2");
    assert_eq!(Value::from("auto").to_option_string(), "auto");
  }

  #[test]
  fn test_serde_uses_json_shape() {
    let value = Value::Array(vec![Value::from("seek"), Value::Double(10.0)]);
    assert_eq!(serde_json::to_string(&value).unwrap(), r#"["seek",10.0]"#);
    let back: Value = serde_json::from_str(r#"["seek",10.0]"#).unwrap();
    assert_eq!(back, value);
  }
}
