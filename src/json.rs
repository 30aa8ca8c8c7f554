//! JSON binder: type-directed recursion over an already materialized
//! `serde_json::Value`.
//!
//! - Scalars must already be of a compatible kind (no string→number coercion).
//! - Records resolve keys through rename metadata, route strays to the rest
//!   type, then check required fields.
//! - Unions try members in declaration order; the first success wins, so
//!   `int|string` binds `"5"` as a string.
//!
//! All traversal state lives in a [`BindContext`] created per call, which makes
//! nested and repeated calls independent of each other.
pub mod array;
pub mod record;

use std::fmt::Write as _;

use log::{debug, trace};

use crate::error::{BindError, Result};
use crate::options::DecodeOptions;
use crate::scalar;
use crate::schema::TargetType;
use crate::value::Value;

const DESCRIBE_MAX_CHARS: usize = 48;

pub fn bind(json: &serde_json::Value, ty: &TargetType) -> Result<Value> {
    bind_with_options(json, ty, &DecodeOptions::default())
}

pub fn bind_with_options(json: &serde_json::Value, ty: &TargetType, options: &DecodeOptions) -> Result<Value> {
    debug!("binding json value against '{ty}'");
    let mut cx = BindContext::new(options);
    let out = cx.bind(json, ty);
    debug_assert!(cx.path.is_empty(), "path segments leaked");
    out
}

#[derive(Debug, Clone)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Per-call traversal state.
pub struct BindContext<'o> {
    options: &'o DecodeOptions,
    path: Vec<Segment>,
}

impl<'o> BindContext<'o> {
    pub fn new(options: &'o DecodeOptions) -> Self {
        Self { options, path: Vec::new() }
    }

    pub fn bind(&mut self, json: &serde_json::Value, ty: &TargetType) -> Result<Value> {
        match ty {
            TargetType::Scalar(kind) => {
                scalar::from_json(json, *kind).map_err(|_| self.mismatch(ty, json))
            }
            TargetType::Json | TargetType::Anydata => Ok(Value::from(json)),
            TargetType::Record(record) => self.bind_record(json, record),
            TargetType::Map(value_ty) => self.bind_map(json, value_ty),
            TargetType::Array { element, fixed_size } => self.bind_array(json, element, *fixed_size),
            TargetType::Tuple { members, rest } => self.bind_tuple(json, members, rest.as_deref()),
            TargetType::Union(members) => self.bind_union(json, ty, members),
        }
    }

    /// First member that binds wins; member failures are absorbed and only
    /// surface, as one mismatch naming the whole union, if every member fails.
    fn bind_union(&mut self, json: &serde_json::Value, union: &TargetType, members: &[TargetType]) -> Result<Value> {
        for member in members {
            match self.bind(json, member) {
                Ok(out) => return Ok(out),
                Err(err) => trace!("union member '{member}' rejected at '{}': {err}", self.path()),
            }
        }
        Err(self.mismatch(union, json))
    }

    // ------------------------------ Path -------------------------------- //

    fn with_key<T>(&mut self, key: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.path.push(Segment::Key(key.to_owned()));
        let out = f(self);
        self.path.pop();
        out
    }

    fn with_index<T>(&mut self, index: usize, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.path.push(Segment::Index(index));
        let out = f(self);
        self.path.pop();
        out
    }

    /// `$.a.b[2]`; empty at the root.
    fn path(&self) -> String {
        if self.path.is_empty() {
            return String::new();
        }
        let mut out = String::from("$");
        for seg in &self.path {
            match seg {
                Segment::Key(k) => {
                    let _ = write!(out, ".{k}");
                }
                Segment::Index(i) => {
                    let _ = write!(out, "[{i}]");
                }
            }
        }
        out
    }

    fn label(&self) -> String {
        match self.path() {
            p if p.is_empty() => "$".to_owned(),
            p => p,
        }
    }

    fn mismatch(&self, expected: &TargetType, json: &serde_json::Value) -> BindError {
        BindError::shape(expected, describe(json), self.path())
    }
}

/// Short rendering of a JSON value for error messages.
fn describe(json: &serde_json::Value) -> String {
    let text = json.to_string();
    if text.chars().count() <= DESCRIBE_MAX_CHARS {
        return text;
    }
    let mut short: String = text.chars().take(DESCRIBE_MAX_CHARS).collect();
    short.push('…');
    short
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::{FieldSpec, RecordType};
    use serde_json::json;

    #[test]
    fn scalars_must_already_match() {
        assert_eq!(bind(&json!(7), &TargetType::int()).unwrap(), Value::Int(7));
        let err = bind(&json!("7"), &TargetType::int()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        assert_eq!(err.to_string(), "incompatible value \"7\" for type 'int'");
    }

    #[test]
    fn union_is_first_match_not_best_match() {
        let int_or_string = TargetType::union(vec![TargetType::int(), TargetType::string()]);
        assert_eq!(bind(&json!("5"), &int_or_string).unwrap(), Value::from("5"));
        assert_eq!(bind(&json!(5), &int_or_string).unwrap(), Value::Int(5));

        let float_or_int = TargetType::union(vec![TargetType::float(), TargetType::int()]);
        assert_eq!(bind(&json!(5), &float_or_int).unwrap(), Value::float(5.0));
    }

    #[test]
    fn union_failure_names_the_union() {
        let ty = TargetType::union(vec![TargetType::int(), TargetType::boolean()]);
        let err = bind(&json!({"k": 1}), &ty).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        assert!(err.to_string().contains("'int|boolean'"), "{err}");
    }

    #[test]
    fn union_trials_do_not_leak_partial_state() {
        // The first member fails deep inside the record; the second must see a clean path.
        let strict = RecordType::builder()
            .field(FieldSpec::required("a", TargetType::int()))
            .field(FieldSpec::required("b", TargetType::int()))
            .into_type()
            .unwrap();
        let ty = TargetType::union(vec![strict, TargetType::map_of(TargetType::Json)]);
        let out = bind(&json!({"a": 1}), &ty).unwrap();
        assert!(matches!(out, Value::Map(_)));

        let err = bind(&json!({"x": [1, "y"]}), &TargetType::map_of(TargetType::array_of(TargetType::int()))).unwrap_err();
        assert!(err.to_string().ends_with("at '$.x[1]'"), "{err}");
    }

    #[test]
    fn open_targets_admit_anything_verbatim() {
        let src = json!({"a": [1, {"b": null}], "c": 1.5});
        assert_eq!(bind(&src, &TargetType::Json).unwrap().to_json(), src);
        assert_eq!(bind(&src, &TargetType::Anydata).unwrap().to_json(), src);
    }

    #[test]
    fn long_values_are_truncated_in_messages() {
        let long = json!("x".repeat(200));
        let err = bind(&long, &TargetType::int()).unwrap_err();
        assert!(err.to_string().contains('…'));
    }
}
