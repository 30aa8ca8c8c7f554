use super::BindContext;
use crate::error::{BindError, Result};
use crate::schema::TargetType;
use crate::value::Value;

impl BindContext<'_> {
    pub(super) fn bind_array(
        &mut self,
        json: &serde_json::Value,
        element: &TargetType,
        fixed_size: Option<usize>,
    ) -> Result<Value> {
        let serde_json::Value::Array(items) = json else {
            let expected = TargetType::Array { element: Box::new(element.clone()), fixed_size };
            return Err(self.mismatch(&expected, json));
        };
        if let Some(expected) = fixed_size {
            if items.len() != expected {
                return Err(BindError::ArraySizeMismatch {
                    field: self.label(),
                    expected,
                    found: items.len(),
                });
            }
        }
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            out.push(self.with_index(i, |cx| cx.bind(item, element))?);
        }
        Ok(Value::Array(out))
    }

    /// Fixed positions first, then the rest type; without a rest type the
    /// lengths must agree exactly.
    pub(super) fn bind_tuple(
        &mut self,
        json: &serde_json::Value,
        members: &[TargetType],
        rest: Option<&TargetType>,
    ) -> Result<Value> {
        let serde_json::Value::Array(items) = json else {
            let expected = TargetType::Tuple { members: members.to_vec(), rest: rest.cloned().map(Box::new) };
            return Err(self.mismatch(&expected, json));
        };
        let arity_ok = match rest {
            None => items.len() == members.len(),
            Some(_) => items.len() >= members.len(),
        };
        if !arity_ok {
            return Err(BindError::ArityMismatch {
                expected: members.len(),
                found: items.len(),
                path: self.path(),
            });
        }
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            // `arity_ok` guarantees a rest type whenever `i` runs past the members
            let slot = members.get(i).or(rest).ok_or_else(|| BindError::ArityMismatch {
                expected: members.len(),
                found: items.len(),
                path: self.path(),
            })?;
            out.push(self.with_index(i, |cx| cx.bind(item, slot))?);
        }
        Ok(Value::Array(out))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::json::bind;
    use crate::schema::{FieldSpec, RecordType, TargetType};
    use crate::value::Value;
    use serde_json::json;

    #[test]
    fn arrays_bind_every_element() {
        let out = bind(&json!([1, 2, 3]), &TargetType::array_of(TargetType::int())).unwrap();
        assert_eq!(out.as_array().map(<[Value]>::len), Some(3));
        let err = bind(&json!([1, "2"]), &TargetType::array_of(TargetType::int())).unwrap_err();
        assert!(err.to_string().ends_with("at '$[1]'"), "{err}");
    }

    #[test]
    fn fixed_arrays_require_exact_length() {
        let ty = TargetType::fixed_array(TargetType::int(), 2);
        assert!(bind(&json!([1, 2]), &ty).is_ok());
        assert_eq!(bind(&json!([1]), &ty).unwrap_err().kind(), ErrorKind::ArraySizeMismatch);
        assert_eq!(bind(&json!([1, 2, 3]), &ty).unwrap_err().kind(), ErrorKind::ArraySizeMismatch);
    }

    #[test]
    fn tuples_without_rest_need_matching_arity() {
        let ty = TargetType::tuple(vec![TargetType::int(), TargetType::string()], None);
        assert_eq!(bind(&json!([1, "a"]), &ty).unwrap().to_json(), json!([1, "a"]));
        let err = bind(&json!([1, "a", true]), &ty).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArityMismatch);
        assert_eq!(bind(&json!(["a", 1]), &ty).unwrap_err().kind(), ErrorKind::ShapeMismatch);
    }

    #[test]
    fn tuple_rest_absorbs_the_tail() {
        let ty = TargetType::tuple(vec![TargetType::string()], Some(TargetType::int()));
        assert_eq!(bind(&json!(["a", 1, 2]), &ty).unwrap().to_json(), json!(["a", 1, 2]));
        assert_eq!(bind(&json!([]), &ty).unwrap_err().kind(), ErrorKind::ArityMismatch);
        assert_eq!(bind(&json!(["a", 1, "b"]), &ty).unwrap_err().kind(), ErrorKind::ShapeMismatch);
    }

    #[test]
    fn arrays_of_records() {
        let item = RecordType::builder()
            .field(FieldSpec::required("id", TargetType::int()))
            .into_type()
            .unwrap();
        let ty = TargetType::array_of(item);
        let out = bind(&json!([{"id": 1}, {"id": 2, "x": 0}]), &ty).unwrap();
        assert_eq!(out.to_json(), json!([{"id": 1}, {"id": 2}]));
        let err = bind(&json!([{"id": 1}, {}]), &ty).unwrap_err();
        assert_eq!(err.to_string(), "required field '$[1].id' not present in JSON");
    }
}
