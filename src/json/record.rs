use indexmap::IndexMap;
use log::trace;

use super::BindContext;
use crate::error::{BindError, Result};
use crate::scalar;
use crate::schema::{RecordType, ScalarKind, TargetType};
use crate::value::Value;

impl BindContext<'_> {
    pub(super) fn bind_record(&mut self, json: &serde_json::Value, record: &RecordType) -> Result<Value> {
        let serde_json::Value::Object(map) = json else {
            return Err(BindError::shape(record, super::describe(json), self.path()));
        };

        let mut out = IndexMap::with_capacity(map.len());
        let mut consumed = vec![false; record.fields().len()];

        for (key, member) in map {
            // Content fields only mean something for XML; in JSON they are plain keys.
            let declared = record
                .field_named(key)
                .or_else(|| record.content_field().filter(|(_, f)| f.external_name() == key));
            match declared {
                Some((idx, field)) => {
                    consumed[idx] = true;
                    let bound = self.with_key(key, |cx| cx.bind(member, &field.ty))?;
                    out.insert(field.name.clone(), bound);
                }
                None => self.admit_rest(record, key, member, &mut out)?,
            }
        }

        for &idx in &record.resolved().required {
            if !consumed[idx] {
                return Err(BindError::RequiredFieldMissing {
                    field: self.field_label(&record.field(idx).name),
                    input: "JSON",
                });
            }
        }
        Ok(Value::Record(out))
    }

    pub(super) fn bind_map(&mut self, json: &serde_json::Value, value_ty: &TargetType) -> Result<Value> {
        let serde_json::Value::Object(map) = json else {
            return Err(self.mismatch(&TargetType::Map(Box::new(value_ty.clone())), json));
        };
        let mut out = IndexMap::with_capacity(map.len());
        for (key, member) in map {
            let bound = self.with_key(key, |cx| cx.bind(member, value_ty))?;
            out.insert(key.clone(), bound);
        }
        Ok(Value::Map(out))
    }

    /// Route an undeclared key: `json`/`anydata` rest types take it verbatim,
    /// scalar rest types only after the value checks out, anything else drops it.
    fn admit_rest(
        &mut self,
        record: &RecordType,
        key: &str,
        member: &serde_json::Value,
        out: &mut IndexMap<String, Value>,
    ) -> Result<()> {
        let Some(rest) = record.rest_type() else {
            if self.options.strict_closed_records {
                let path = self.with_key(key, |cx| Ok(cx.path()))?;
                return Err(BindError::shape(
                    format!("{record} (closed)"),
                    format!("undeclared field '{key}'"),
                    path,
                ));
            }
            trace!("closed record '{record}' drops undeclared key '{key}'");
            return Ok(());
        };

        match rest {
            TargetType::Json | TargetType::Anydata => {
                out.insert(key.to_owned(), Value::from(member));
            }
            TargetType::Scalar(kind) => match coerce_rest(member, *kind) {
                Some(value) => {
                    out.insert(key.to_owned(), value);
                }
                None => trace!("rest type '{kind}' rejects key '{key}'"),
            },
            other => trace!("rest type '{other}' does not admit key '{key}'"),
        }
        Ok(())
    }

    fn field_label(&self, name: &str) -> String {
        match self.path() {
            p if p.is_empty() => name.to_owned(),
            p => format!("{p}.{name}"),
        }
    }
}

/// A value fits a scalar rest type when it is that scalar, or a map whose
/// members all fit.
fn coerce_rest(member: &serde_json::Value, kind: ScalarKind) -> Option<Value> {
    match member {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| coerce_rest(v, kind).map(|v| (k.clone(), v)))
            .collect::<Option<IndexMap<_, _>>>()
            .map(Value::Map),
        other => scalar::from_json(other, kind).ok(),
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::json::{bind, bind_with_options};
    use crate::options::DecodeOptions;
    use crate::schema::{FieldSpec, RecordType, TargetType};
    use crate::value::Value;
    use serde_json::json;

    fn person() -> TargetType {
        RecordType::named("Person")
            .field(FieldSpec::required("name", TargetType::string()))
            .field(FieldSpec::optional("age", TargetType::int()))
            .field(FieldSpec::required("email", TargetType::string()).renamed("e-mail"))
            .into_type()
            .unwrap()
    }

    #[test]
    fn keys_resolve_through_rename_and_store_canonical_names() {
        let out = bind(&json!({"name": "Ann", "e-mail": "a@x"}), &person()).unwrap();
        assert_eq!(out.get("email"), Some(&Value::from("a@x")));
        assert_eq!(out.get("e-mail"), None);
        assert_eq!(out.get("age"), None);
    }

    #[test]
    fn missing_required_field_fails() {
        let err = bind(&json!({"name": "Ann", "age": 3}), &person()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequiredFieldMissing);
        assert_eq!(err.to_string(), "required field 'email' not present in JSON");
    }

    #[test]
    fn nested_required_field_reports_its_path() {
        let outer = RecordType::builder()
            .field(FieldSpec::required("who", person()))
            .into_type()
            .unwrap();
        let err = bind(&json!({"who": {"name": "Ann"}}), &outer).unwrap_err();
        assert_eq!(err.to_string(), "required field '$.who.email' not present in JSON");
    }

    #[test]
    fn anydata_rest_keeps_extra_keys_verbatim() {
        let ty = RecordType::builder()
            .field(FieldSpec::required("a", TargetType::int()))
            .rest(TargetType::Anydata)
            .into_type()
            .unwrap();
        let out = bind(&json!({"a": 1, "extra": "x", "deep": {"k": [1]}}), &ty).unwrap();
        assert_eq!(out.to_json(), json!({"a": 1, "extra": "x", "deep": {"k": [1]}}));
    }

    #[test]
    fn closed_record_ignores_extra_keys_by_default() {
        let ty = RecordType::builder()
            .field(FieldSpec::required("a", TargetType::int()))
            .field(FieldSpec::optional("b", TargetType::int()))
            .into_type()
            .unwrap();
        let out = bind(&json!({"a": 1, "extra": "x"}), &ty).unwrap();
        assert_eq!(out.to_json(), json!({"a": 1}));

        let err = bind_with_options(&json!({"a": 1, "extra": "x"}), &ty, &DecodeOptions::strict()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        assert!(err.to_string().contains("undeclared field 'extra'"), "{err}");
    }

    #[test]
    fn scalar_rest_admits_only_compatible_values() {
        let ty = RecordType::builder()
            .field(FieldSpec::required("a", TargetType::int()))
            .rest(TargetType::int())
            .into_type()
            .unwrap();
        let out = bind(&json!({"a": 1, "n": 2, "s": "x", "m": {"k": 3}, "bad": {"k": "v"}}), &ty).unwrap();
        assert_eq!(out.to_json(), json!({"a": 1, "n": 2, "m": {"k": 3}}));
    }

    #[test]
    fn structured_rest_types_drop_strays() {
        let ty = RecordType::builder()
            .rest(TargetType::array_of(TargetType::int()))
            .into_type()
            .unwrap();
        let out = bind(&json!({"xs": [1, 2]}), &ty).unwrap();
        assert_eq!(out.to_json(), json!({}));
    }

    #[test]
    fn record_target_needs_an_object() {
        let err = bind(&json!([1]), &person()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        assert!(err.to_string().contains("'Person'"));
    }

    #[test]
    fn map_values_bind_against_the_constraint() {
        let ty = TargetType::map_of(TargetType::float());
        let out = bind(&json!({"x": 1, "y": 2.5}), &ty).unwrap();
        assert_eq!(out.get("x"), Some(&Value::float(1.0)));
        assert!(bind(&json!({"x": "1"}), &ty).is_err());
    }
}
