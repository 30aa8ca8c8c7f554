//! Per-nesting-level decoder state.
use std::sync::Arc;

use indexmap::IndexMap;
use log::trace;

use crate::error::{BindError, Result};
use crate::scalar;
use crate::schema::{RecordType, TargetType};
use crate::value::Value;

/// Storage for one output key. The second occurrence of a name promotes
/// `One` to `Many`.
#[derive(Debug)]
pub(super) enum Slot {
    One(Value),
    Many(Vec<Value>),
}

impl Slot {
    pub(super) fn push(&mut self, value: Value) {
        match self {
            Slot::Many(items) => items.push(value),
            Slot::One(first) => {
                let first = std::mem::replace(first, Value::Null);
                *self = Slot::Many(vec![first, value]);
            }
        }
    }

    pub(super) fn len(&self) -> usize {
        match self {
            Slot::One(_) => 1,
            Slot::Many(items) => items.len(),
        }
    }

    pub(super) fn into_value(self) -> Value {
        match self {
            Slot::One(value) => value,
            Slot::Many(items) => Value::Array(items),
        }
    }

    fn into_array(self) -> Value {
        match self {
            Slot::One(value) => Value::Array(vec![value]),
            Slot::Many(items) => Value::Array(items),
        }
    }
}

/// How a declared field is fed from XML.
#[derive(Debug, Clone, Copy)]
pub(super) enum Shape<'t> {
    /// Converted from a single text node (scalars and scalar unions).
    Text(&'t TargetType),
    Record(&'t Arc<RecordType>),
    /// Captured wholesale as an open value.
    Open,
    Repeated {
        element: Element<'t>,
        fixed: Option<usize>,
    },
    Unsupported,
}

#[derive(Debug, Clone, Copy)]
pub(super) enum Element<'t> {
    Text(&'t TargetType),
    Record(&'t Arc<RecordType>),
    Open,
}

pub(super) fn shape_of(ty: &TargetType) -> Shape<'_> {
    match ty.strip_nil() {
        TargetType::Json | TargetType::Anydata | TargetType::Map(_) => Shape::Open,
        TargetType::Record(record) => Shape::Record(record),
        TargetType::Array { element, fixed_size } => match element_of(element) {
            Some(element) => Shape::Repeated { element, fixed: *fixed_size },
            None => Shape::Unsupported,
        },
        // Text conversion keeps the nil alternative, so `int?` still sees `()`.
        _ if ty.is_text_convertible() => Shape::Text(ty),
        _ => Shape::Unsupported,
    }
}

fn element_of(ty: &TargetType) -> Option<Element<'_>> {
    match ty.strip_nil() {
        TargetType::Json | TargetType::Anydata | TargetType::Map(_) => Some(Element::Open),
        TargetType::Record(record) => Some(Element::Record(record)),
        _ if ty.is_text_convertible() => Some(Element::Text(ty)),
        _ => None,
    }
}

fn accepts_nil(ty: &TargetType) -> bool {
    match ty {
        TargetType::Scalar(crate::schema::ScalarKind::Null) => true,
        TargetType::Union(members) => members.iter().any(accepts_nil),
        _ => false,
    }
}

/// Text for a scalar field; an empty element binds `()` when the type allows it.
pub(super) fn convert_text(text: &str, ty: &TargetType, path: &str) -> Result<Value> {
    if text.trim().is_empty() && accepts_nil(ty) {
        return Ok(Value::Null);
    }
    scalar::from_text(text, ty).map_err(|e| BindError::from_scalar(e, path))
}

// -------------------------------- Frames --------------------------------- //

/// A scalar element whose text is still arriving.
#[derive(Debug)]
pub(super) struct PendingText {
    pub field: usize,
    pub element: String,
    pub text: String,
}

#[derive(Debug)]
pub(super) struct Frame {
    pub record: Arc<RecordType>,
    pub element: String,
    /// Index of the parent field this frame fills; `None` for the root.
    pub field: Option<usize>,
    values: IndexMap<usize, Slot>,
    rest: IndexMap<String, Slot>,
    /// Sibling-seen set: occurrences per external name.
    seen: IndexMap<String, usize>,
    pub content: Option<String>,
}

impl Frame {
    pub(super) fn new(record: Arc<RecordType>, element: impl Into<String>, field: Option<usize>) -> Self {
        Self {
            record,
            element: element.into(),
            field,
            values: IndexMap::new(),
            rest: IndexMap::new(),
            seen: IndexMap::new(),
            content: None,
        }
    }

    /// Count one more occurrence of `name`; returns the running total.
    pub(super) fn mark_seen(&mut self, name: &str) -> usize {
        let count = self.seen.entry(name.to_owned()).or_insert(0);
        *count += 1;
        *count
    }

    /// Store a value for field `idx`, honoring a fixed-size cap.
    pub(super) fn store(&mut self, idx: usize, value: Value) {
        let cap = match shape_of(&self.record.field(idx).ty) {
            Shape::Repeated { fixed, .. } => fixed,
            _ => None,
        };
        match self.values.get_mut(&idx) {
            Some(slot) if cap.is_some_and(|n| slot.len() >= n) => {
                trace!("'{}' is past its fixed size, occurrence not stored", self.record.field(idx).name);
            }
            Some(slot) => slot.push(value),
            None => {
                self.values.insert(idx, Slot::One(value));
            }
        }
    }

    pub(super) fn store_rest(&mut self, name: &str, value: Value) {
        match self.rest.get_mut(name) {
            Some(slot) => slot.push(value),
            None => {
                self.rest.insert(name.to_owned(), Slot::One(value));
            }
        }
    }

    /// Close the frame: bind pending content, check required fields and
    /// fixed sizes, then assemble the record.
    pub(super) fn finish(mut self, path: &str) -> Result<Value> {
        if let Some(text) = self.content.take() {
            if let Some((idx, field)) = self.record.content_field() {
                let value = convert_text(&text, &field.ty, path)?;
                self.values.insert(idx, Slot::One(value));
            }
        }

        for &idx in &self.record.resolved().required {
            if !self.values.contains_key(&idx) {
                return Err(BindError::RequiredFieldMissing {
                    field: self.record.field(idx).name.clone(),
                    input: "XML",
                });
            }
        }

        let mut out = IndexMap::with_capacity(self.values.len() + self.rest.len());
        for (idx, slot) in self.values {
            let field = self.record.field(idx);
            let value = match shape_of(&field.ty) {
                Shape::Repeated { fixed, .. } => {
                    if let Some(expected) = fixed {
                        let found = self.seen.get(field.external_name()).copied().unwrap_or(slot.len());
                        if found != expected {
                            return Err(BindError::ArraySizeMismatch {
                                field: field.name.clone(),
                                expected,
                                found,
                            });
                        }
                    }
                    slot.into_array()
                }
                _ => slot.into_value(),
            };
            out.insert(field.name.clone(), value);
        }
        for (name, slot) in self.rest {
            out.entry(name).or_insert_with(|| slot.into_value());
        }
        Ok(Value::Record(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;

    #[test]
    fn slots_promote_on_second_push() {
        let mut slot = Slot::One(Value::Int(1));
        assert_eq!(slot.len(), 1);
        slot.push(Value::Int(2));
        slot.push(Value::Int(3));
        assert_eq!(slot.into_value(), Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
    }

    #[test]
    fn shapes_follow_the_declared_type() {
        assert!(matches!(shape_of(&TargetType::optional(TargetType::int())), Shape::Text(_)));
        assert!(matches!(shape_of(&TargetType::Json), Shape::Open));
        assert!(matches!(
            shape_of(&TargetType::fixed_array(TargetType::int(), 2)),
            Shape::Repeated { element: Element::Text(_), fixed: Some(2) }
        ));
        let nested = TargetType::array_of(TargetType::array_of(TargetType::int()));
        assert!(matches!(shape_of(&nested), Shape::Unsupported));
        assert!(matches!(shape_of(&TargetType::tuple(vec![], None)), Shape::Unsupported));
    }

    #[test]
    fn empty_text_binds_nil_only_for_optional_types() {
        assert_eq!(convert_text("", &TargetType::optional(TargetType::int()), "").unwrap(), Value::Null);
        assert!(convert_text("", &TargetType::int(), "").is_err());
        assert_eq!(convert_text("", &TargetType::string(), "").unwrap(), Value::from(""));
    }

    #[test]
    fn fixed_cap_stops_storage_but_not_counting() {
        let record = RecordType::builder()
            .field(FieldSpec::required("i", TargetType::fixed_array(TargetType::int(), 2)))
            .build()
            .unwrap();
        let mut frame = Frame::new(record, "r", None);
        for n in 1..=3 {
            frame.mark_seen("i");
            frame.store(0, Value::Int(n));
        }
        let err = frame.finish("/r").unwrap_err();
        assert_eq!(
            err,
            BindError::ArraySizeMismatch { field: "i".into(), expected: 2, found: 3 }
        );
    }
}
