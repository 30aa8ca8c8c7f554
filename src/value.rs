//! Output value tree produced by both binders.
use std::fmt;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use ordered_float::OrderedFloat;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Decimal(Decimal),
    String(String),
    Record(IndexMap<String, Value>),
    Array(Vec<Value>),
    Map(IndexMap<String, Value>),
}

/// A decimal literal, kept in its textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal(String);

static DECIMAL_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?$").expect("valid decimal regex")
});

impl Decimal {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if !DECIMAL_LITERAL.is_match(text) {
            return None;
        }
        let text = text.strip_prefix('+').unwrap_or(text);
        Some(Decimal(text.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ------------------------------- Accessors -------------------------------- //

impl Value {
    pub fn float(f: f64) -> Self {
        Value::Float(OrderedFloat(f))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "()",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Record(_) => "record",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Record(m) | Value::Map(m) => m.get(key),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(xs) => Some(xs),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<&serde_json::Value> for Value {
    /// Open admission: keeps the generic value's shape, objects become maps.
    fn from(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if n.is_u64() {
                    Decimal::parse(&n.to_string()).map_or(Value::Null, Value::Decimal)
                } else {
                    Value::float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(xs) => Value::Array(xs.iter().map(Value::from).collect()),
            serde_json::Value::Object(m) => {
                Value::Map(m.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

// ------------------------------ Serialization ----------------------------- //

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) if f.0.is_finite() => serializer.serialize_f64(f.0),
            Value::Float(_) => serializer.serialize_unit(),
            Value::Decimal(d) => serializer.serialize_str(d.as_str()),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(xs) => {
                let mut seq = serializer.serialize_seq(Some(xs.len()))?;
                for x in xs {
                    seq.serialize_element(x)?;
                }
                seq.end()
            }
            Value::Record(m) | Value::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => Err(fmt::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decimal_literals() {
        assert_eq!(Decimal::parse("+12.50").unwrap().as_str(), "12.50");
        assert_eq!(Decimal::parse(" 1e-3 ").unwrap().as_str(), "1e-3");
        assert!(Decimal::parse(".5").is_some());
        assert!(Decimal::parse("1.2.3").is_none());
        assert!(Decimal::parse("abc").is_none());
    }

    #[test]
    fn open_admission_keeps_shape_and_order() {
        let src = json!({"z": 1, "a": [true, null, 2.5], "m": {"k": "v"}});
        let v = Value::from(&src);
        let Value::Map(m) = &v else { panic!("expected map") };
        assert_eq!(m.keys().collect::<Vec<_>>(), ["z", "a", "m"]);
        assert_eq!(v.to_json(), src);
    }

    #[test]
    fn non_finite_floats_serialize_as_null() {
        assert_eq!(Value::float(f64::NAN).to_json(), json!(null));
        assert_eq!(Value::float(1.5).to_string(), "1.5");
    }
}
