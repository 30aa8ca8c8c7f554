//! Name resolution over a record type.
//!
//! Pure and order-independent: the same record always resolves to the same
//! maps, so the result is cached on the record itself.
use indexmap::IndexMap;

use super::{FieldRole, FieldSpec, Namespace, RecordType};

#[derive(Debug, Clone, Default)]
pub struct ResolvedRecord {
    /// Element name the record binds to (rename first, then declared name).
    pub element_name: Option<String>,
    /// External name → field index, for every non-content field.
    pub fields: IndexMap<String, usize>,
    /// External name → field index, attribute-bound subset.
    pub attributes: IndexMap<String, usize>,
    pub content: Option<usize>,
    pub required: Vec<usize>,
    pub namespace: Option<Namespace>,
}

impl ResolvedRecord {
    pub(super) fn compute(record: &RecordType) -> Self {
        let mut out = ResolvedRecord {
            element_name: record.rename().or(record.name()).map(str::to_owned),
            namespace: record.namespace().cloned(),
            ..ResolvedRecord::default()
        };
        for (idx, field) in record.fields().iter().enumerate() {
            if field.required {
                out.required.push(idx);
            }
            match field.role {
                FieldRole::Content => {
                    out.content = Some(idx);
                    continue;
                }
                FieldRole::Attribute => {
                    out.attributes.insert(field.external_name().to_owned(), idx);
                }
                FieldRole::Element => {}
            }
            out.fields.insert(field.external_name().to_owned(), idx);
        }
        out
    }
}

impl RecordType {
    pub fn field_named(&self, external: &str) -> Option<(usize, &FieldSpec)> {
        let idx = *self.resolved().fields.get(external)?;
        Some((idx, self.field(idx)))
    }

    pub fn attribute_named(&self, external: &str) -> Option<(usize, &FieldSpec)> {
        let idx = *self.resolved().attributes.get(external)?;
        Some((idx, self.field(idx)))
    }

    pub fn content_field(&self) -> Option<(usize, &FieldSpec)> {
        self.resolved().content.map(|idx| (idx, self.field(idx)))
    }
}

pub fn resolve_fields(record: &RecordType) -> IndexMap<&str, &FieldSpec> {
    record
        .resolved()
        .fields
        .iter()
        .map(|(name, &idx)| (name.as_str(), record.field(idx)))
        .collect()
}

pub fn resolve_attributes(record: &RecordType) -> IndexMap<&str, &FieldSpec> {
    record
        .resolved()
        .attributes
        .iter()
        .map(|(name, &idx)| (name.as_str(), record.field(idx)))
        .collect()
}

pub fn resolve_namespace(record: &RecordType) -> Option<(Option<&str>, &str)> {
    record
        .resolved()
        .namespace
        .as_ref()
        .map(|ns| (ns.prefix.as_deref(), ns.uri.as_str()))
}
