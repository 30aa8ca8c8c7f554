//! String/primitive → scalar conversion.
//!
//! Both binders call into here and nowhere else for leaf values. A failure
//! only names the expected type and the offending text; the caller knows the
//! path and turns it into a `ShapeMismatch`.
use thiserror::Error;

use crate::schema::{ScalarKind, TargetType};
use crate::value::{Decimal, Value};

// Largest integer magnitude an f64 holds exactly.
const F64_EXACT_INT: u64 = 1 << 53;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{text}' cannot be converted to '{expected}'")]
pub struct ScalarError {
    pub expected: String,
    pub text: String,
}

impl ScalarError {
    fn new(expected: impl ToString, text: impl Into<String>) -> Self {
        Self { expected: expected.to_string(), text: text.into() }
    }
}

// ------------------------------ From text -------------------------------- //

/// Convert an XML text node (or any string) into `ty`.
///
/// Unions try members in declaration order and keep the first that converts.
pub fn from_text(text: &str, ty: &TargetType) -> Result<Value, ScalarError> {
    match ty {
        TargetType::Scalar(kind) => text_to_kind(text, *kind),
        TargetType::Json | TargetType::Anydata => Ok(Value::String(text.to_owned())),
        TargetType::Union(members) => members
            .iter()
            .find_map(|m| from_text(text, m).ok())
            .ok_or_else(|| ScalarError::new(ty, text)),
        _ => Err(ScalarError::new(ty, text)),
    }
}

fn text_to_kind(text: &str, kind: ScalarKind) -> Result<Value, ScalarError> {
    let trimmed = text.trim();
    let fail = || ScalarError::new(kind, text);
    match kind {
        ScalarKind::String => Ok(Value::String(text.to_owned())),
        ScalarKind::Null => {
            if trimmed == "null" {
                Ok(Value::Null)
            } else {
                Err(fail())
            }
        }
        ScalarKind::Bool => {
            if trimmed.eq_ignore_ascii_case("true") {
                Ok(Value::Bool(true))
            } else if trimmed.eq_ignore_ascii_case("false") {
                Ok(Value::Bool(false))
            } else {
                Err(fail())
            }
        }
        ScalarKind::Int => trimmed.parse::<i64>().map(Value::Int).map_err(|_| fail()),
        ScalarKind::Float => parse_float(trimmed).map(Value::float).ok_or_else(fail),
        ScalarKind::Decimal => Decimal::parse(trimmed).map(Value::Decimal).ok_or_else(fail),
    }
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" | "+Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        // Rust also accepts "inf"/"nan" spellings; only numeric literals here.
        _ if text.bytes().any(|b| b.is_ascii_alphabetic() && !matches!(b, b'e' | b'E')) => None,
        _ => text.parse::<f64>().ok(),
    }
}

// ------------------------------ From JSON -------------------------------- //

/// Convert a JSON primitive into `kind` without loss of precision.
pub fn from_json(v: &serde_json::Value, kind: ScalarKind) -> Result<Value, ScalarError> {
    use serde_json::Value as J;
    let fail = || ScalarError::new(kind, v.to_string());
    match (kind, v) {
        (ScalarKind::Null, J::Null) => Ok(Value::Null),
        (ScalarKind::Bool, J::Bool(b)) => Ok(Value::Bool(*b)),
        (ScalarKind::String, J::String(s)) => Ok(Value::String(s.clone())),
        (ScalarKind::Int, J::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return Ok(Value::Int(i));
            }
            match n.as_f64() {
                Some(f) if n.is_f64() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                    Ok(Value::Int(f as i64))
                }
                _ => Err(fail()),
            }
        }
        (ScalarKind::Float, J::Number(n)) => {
            if let Some(i) = n.as_i64() {
                if i.unsigned_abs() <= F64_EXACT_INT {
                    return Ok(Value::float(i as f64));
                }
                return Err(fail());
            }
            if n.is_f64() {
                return n.as_f64().map(Value::float).ok_or_else(fail);
            }
            Err(fail())
        }
        (ScalarKind::Decimal, J::Number(n)) => {
            Decimal::parse(&n.to_string()).map(Value::Decimal).ok_or_else(fail)
        }
        // Decimals serialize as strings to keep their digits; read that form back.
        (ScalarKind::Decimal, J::String(s)) => Decimal::parse(s).map(Value::Decimal).ok_or_else(fail),
        _ => Err(fail()),
    }
}
