//! Target schema model.
//!
//! A [`TargetType`] is supplied once per decode call and never mutated by the
//! binders. Records are shared behind `Arc` so nested XML frames can hold on
//! to their type without cloning field lists, and each record caches its
//! resolved name maps (see [`resolve`]).
pub mod doc;
pub mod resolve;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{BindError, Result};

pub use resolve::{resolve_attributes, resolve_fields, resolve_namespace, ResolvedRecord};

// ------------------------------- Types ----------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Null,
    Bool,
    Int,
    Float,
    Decimal,
    String,
}

#[derive(Debug, Clone)]
pub enum TargetType {
    Scalar(ScalarKind),
    Json,                    // any generic value, admitted verbatim
    Anydata,                 // same admission rules as `Json`
    Record(Arc<RecordType>),
    Array {
        element: Box<TargetType>,
        fixed_size: Option<usize>,
    },
    Tuple {
        members: Vec<TargetType>,
        rest: Option<Box<TargetType>>,
    },
    Union(Vec<TargetType>),  // ordered; first match wins
    Map(Box<TargetType>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldRole {
    #[default]
    Element,
    Attribute,               // XML attribute; also matched by child elements
    Content,                 // receives an element's inline text
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub rename: Option<String>,
    pub ty: TargetType,
    pub required: bool,
    pub role: FieldRole,
    pub namespace: Option<Namespace>,
}

#[derive(Debug)]
pub struct RecordType {
    name: Option<String>,
    rename: Option<String>,
    namespace: Option<Namespace>,
    fields: Vec<FieldSpec>,
    rest: Option<TargetType>,
    resolved: OnceCell<ResolvedRecord>,
}

// ------------------------------ ScalarKind ------------------------------- //

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Null => "()",
            ScalarKind::Bool => "boolean",
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::Decimal => "decimal",
            ScalarKind::String => "string",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "()" | "null" | "nil" => ScalarKind::Null,
            "boolean" | "bool" => ScalarKind::Bool,
            "int" => ScalarKind::Int,
            "float" => ScalarKind::Float,
            "decimal" => ScalarKind::Decimal,
            "string" => ScalarKind::String,
            _ => return None,
        })
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ------------------------------ TargetType ------------------------------- //

impl TargetType {
    pub fn null() -> Self { TargetType::Scalar(ScalarKind::Null) }
    pub fn boolean() -> Self { TargetType::Scalar(ScalarKind::Bool) }
    pub fn int() -> Self { TargetType::Scalar(ScalarKind::Int) }
    pub fn float() -> Self { TargetType::Scalar(ScalarKind::Float) }
    pub fn decimal() -> Self { TargetType::Scalar(ScalarKind::Decimal) }
    pub fn string() -> Self { TargetType::Scalar(ScalarKind::String) }

    pub fn array_of(element: TargetType) -> Self {
        TargetType::Array { element: Box::new(element), fixed_size: None }
    }

    pub fn fixed_array(element: TargetType, size: usize) -> Self {
        TargetType::Array { element: Box::new(element), fixed_size: Some(size) }
    }

    pub fn tuple(members: Vec<TargetType>, rest: Option<TargetType>) -> Self {
        TargetType::Tuple { members, rest: rest.map(Box::new) }
    }

    pub fn union(members: Vec<TargetType>) -> Self {
        TargetType::Union(members)
    }

    pub fn map_of(value: TargetType) -> Self {
        TargetType::Map(Box::new(value))
    }

    /// `T?`, i.e. `T|()`.
    pub fn optional(ty: TargetType) -> Self {
        TargetType::Union(vec![ty, TargetType::null()])
    }

    pub fn is_open(&self) -> bool {
        matches!(self, TargetType::Json | TargetType::Anydata)
    }

    pub fn as_record(&self) -> Option<&Arc<RecordType>> {
        match self {
            TargetType::Record(r) => Some(r),
            _ => None,
        }
    }

    /// For `T|()` unions, the single non-nil member; otherwise `self`.
    pub fn strip_nil(&self) -> &TargetType {
        if let TargetType::Union(members) = self {
            let mut non_nil = members
                .iter()
                .filter(|m| !matches!(m, TargetType::Scalar(ScalarKind::Null)));
            if let (Some(only), None) = (non_nil.next(), non_nil.next()) {
                return only;
            }
        }
        self
    }

    /// True when every alternative of this type is a scalar (or open) type,
    /// i.e. a value of it can be produced from a single text node.
    pub fn is_text_convertible(&self) -> bool {
        match self {
            TargetType::Scalar(_) | TargetType::Json | TargetType::Anydata => true,
            TargetType::Union(members) => members.iter().all(TargetType::is_text_convertible),
            _ => false,
        }
    }
}

impl From<ScalarKind> for TargetType {
    fn from(kind: ScalarKind) -> Self {
        TargetType::Scalar(kind)
    }
}

impl From<Arc<RecordType>> for TargetType {
    fn from(record: Arc<RecordType>) -> Self {
        TargetType::Record(record)
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Scalar(kind) => write!(f, "{kind}"),
            TargetType::Json => f.write_str("json"),
            TargetType::Anydata => f.write_str("anydata"),
            TargetType::Record(record) => write!(f, "{record}"),
            TargetType::Array { element, fixed_size: None } => write!(f, "{}[]", Paren(element)),
            TargetType::Array { element, fixed_size: Some(n) } => write!(f, "{}[{n}]", Paren(element)),
            TargetType::Tuple { members, rest } => {
                f.write_str("[")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 { f.write_str(", ")?; }
                    write!(f, "{m}")?;
                }
                if let Some(rest) = rest {
                    if !members.is_empty() { f.write_str(", ")?; }
                    write!(f, "{rest}...")?;
                }
                f.write_str("]")
            }
            TargetType::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 { f.write_str("|")?; }
                    write!(f, "{m}")?;
                }
                Ok(())
            }
            TargetType::Map(value) => write!(f, "map<{value}>"),
        }
    }
}

// `int|string[]` would read as a union of an array; parenthesize.
struct Paren<'a>(&'a TargetType);

impl fmt::Display for Paren<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            TargetType::Union(_) => write!(f, "({})", self.0),
            other => write!(f, "{other}"),
        }
    }
}

// ------------------------------- FieldSpec ------------------------------- //

impl FieldSpec {
    pub fn required(name: impl Into<String>, ty: TargetType) -> Self {
        Self {
            name: name.into(),
            rename: None,
            ty,
            required: true,
            role: FieldRole::Element,
            namespace: None,
        }
    }

    pub fn optional(name: impl Into<String>, ty: TargetType) -> Self {
        Self { required: false, ..Self::required(name, ty) }
    }

    pub fn renamed(mut self, external: impl Into<String>) -> Self {
        self.rename = Some(external.into());
        self
    }

    pub fn attribute(mut self) -> Self {
        self.role = FieldRole::Attribute;
        self
    }

    pub fn content(mut self) -> Self {
        self.role = FieldRole::Content;
        self
    }

    pub fn in_namespace(mut self, prefix: Option<&str>, uri: impl Into<String>) -> Self {
        self.namespace = Some(Namespace { prefix: prefix.map(str::to_owned), uri: uri.into() });
        self
    }

    /// Name the field carries in the input after rename metadata is applied.
    pub fn external_name(&self) -> &str {
        self.rename.as_deref().unwrap_or(&self.name)
    }
}

// ------------------------------- RecordType ------------------------------ //

impl RecordType {
    pub fn builder() -> RecordBuilder {
        RecordBuilder::default()
    }

    pub fn named(name: impl Into<String>) -> RecordBuilder {
        RecordBuilder { name: Some(name.into()), ..RecordBuilder::default() }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn rename(&self) -> Option<&str> {
        self.rename.as_deref()
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> &FieldSpec {
        &self.fields[index]
    }

    pub fn rest_type(&self) -> Option<&TargetType> {
        self.rest.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.rest.is_none()
    }

    /// Name maps for this record, computed on first use.
    pub fn resolved(&self) -> &ResolvedRecord {
        self.resolved.get_or_init(|| ResolvedRecord::compute(self))
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            return f.write_str(name);
        }
        f.write_str(if self.is_closed() { "record {|" } else { "record {" })?;
        for field in &self.fields {
            write!(f, " {} {}{};", field.ty, field.name, if field.required { "" } else { "?" })?;
        }
        if let Some(rest) = &self.rest {
            write!(f, " {rest}...;")?;
        }
        f.write_str(if self.is_closed() { " |}" } else { " }" })
    }
}

#[derive(Debug, Default)]
pub struct RecordBuilder {
    name: Option<String>,
    rename: Option<String>,
    namespace: Option<Namespace>,
    fields: Vec<FieldSpec>,
    rest: Option<TargetType>,
    open: bool,
}

impl RecordBuilder {
    pub fn rename(mut self, external: impl Into<String>) -> Self {
        self.rename = Some(external.into());
        self
    }

    pub fn namespace(mut self, prefix: Option<&str>, uri: impl Into<String>) -> Self {
        self.namespace = Some(Namespace { prefix: prefix.map(str::to_owned), uri: uri.into() });
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldSpec>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Open the record with an explicit rest type.
    pub fn rest(mut self, ty: TargetType) -> Self {
        self.rest = Some(ty);
        self.open = true;
        self
    }

    /// Open the record; without an explicit rest type it admits `anydata`.
    pub fn open(mut self) -> Self {
        self.open = true;
        self
    }

    pub fn closed(mut self) -> Self {
        self.open = false;
        self
    }

    pub fn build(self) -> Result<Arc<RecordType>> {
        let label = self.name.clone().unwrap_or_else(|| "record".to_owned());
        if !self.open && self.rest.is_some() {
            return Err(BindError::Schema(format!("closed record '{label}' cannot declare a rest type")));
        }

        let mut seen = HashSet::new();
        let mut content_fields = 0;
        for field in &self.fields {
            if !seen.insert(field.external_name()) {
                return Err(BindError::Schema(format!(
                    "duplicate field name '{}' in record '{label}'",
                    field.external_name()
                )));
            }
            if field.role == FieldRole::Content {
                content_fields += 1;
            }
        }
        if content_fields > 1 {
            return Err(BindError::Schema(format!("record '{label}' declares more than one content field")));
        }

        let rest = match (self.open, self.rest) {
            (false, _) => None,
            (true, Some(rest)) => Some(rest),
            (true, None) => Some(TargetType::Anydata),
        };

        Ok(Arc::new(RecordType {
            name: self.name,
            rename: self.rename,
            namespace: self.namespace,
            fields: self.fields,
            rest,
            resolved: OnceCell::new(),
        }))
    }

    pub fn into_type(self) -> Result<TargetType> {
        self.build().map(TargetType::Record)
    }
}

// ------------------------------- Tests ------------------------------------ //
