//! Schema documents: a JSON description of a [`TargetType`].
//!
//! ```json
//! {
//!   "kind": "record", "name": "Book", "rename": "book",
//!   "namespace": { "prefix": "bk", "uri": "urn:books" },
//!   "fields": [
//!     { "name": "id", "type": "int", "attribute": true },
//!     { "name": "tags", "type": "string[]", "required": false }
//!   ],
//!   "closed": false, "rest": "anydata"
//! }
//! ```
//!
//! Scalar and open types may be written as bare names, with `?` (optional)
//! and `[]` / `[N]` (array) suffixes.
use std::path::Path;

use serde::Deserialize;

use super::{FieldSpec, Namespace, RecordType, ScalarKind, TargetType};
use crate::error::{BindError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TypeDoc {
    Name(String),
    Node(Box<TypeNode>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TypeNode {
    Array {
        element: TypeDoc,
        #[serde(default)]
        size: Option<usize>,
    },
    Tuple {
        members: Vec<TypeDoc>,
        #[serde(default)]
        rest: Option<TypeDoc>,
    },
    Union {
        members: Vec<TypeDoc>,
    },
    Map {
        value: TypeDoc,
    },
    Record(RecordDoc),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDoc {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rename: Option<String>,
    #[serde(default)]
    pub namespace: Option<NamespaceDoc>,
    #[serde(default)]
    pub fields: Vec<FieldDoc>,
    /// Defaults to closed unless a rest type is given.
    #[serde(default)]
    pub closed: Option<bool>,
    #[serde(default)]
    pub rest: Option<TypeDoc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDoc {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDoc,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub rename: Option<String>,
    #[serde(default)]
    pub attribute: bool,
    #[serde(default)]
    pub content: bool,
    #[serde(default)]
    pub namespace: Option<NamespaceDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceDoc {
    #[serde(default)]
    pub prefix: Option<String>,
    pub uri: String,
}

fn default_true() -> bool {
    true
}

// ------------------------------ Conversion ------------------------------- //

impl TypeDoc {
    pub fn to_target(&self) -> Result<TargetType> {
        match self {
            TypeDoc::Name(name) => parse_type_name(name),
            TypeDoc::Node(node) => node.to_target(),
        }
    }
}

impl TypeNode {
    pub fn to_target(&self) -> Result<TargetType> {
        Ok(match self {
            TypeNode::Array { element, size } => TargetType::Array {
                element: Box::new(element.to_target()?),
                fixed_size: *size,
            },
            TypeNode::Tuple { members, rest } => TargetType::Tuple {
                members: members.iter().map(TypeDoc::to_target).collect::<Result<_>>()?,
                rest: rest.as_ref().map(TypeDoc::to_target).transpose()?.map(Box::new),
            },
            TypeNode::Union { members } => {
                if members.is_empty() {
                    return Err(BindError::Schema("union must have at least one member".into()));
                }
                TargetType::Union(members.iter().map(TypeDoc::to_target).collect::<Result<_>>()?)
            }
            TypeNode::Map { value } => TargetType::Map(Box::new(value.to_target()?)),
            TypeNode::Record(record) => record.to_target()?,
        })
    }
}

impl RecordDoc {
    pub fn to_target(&self) -> Result<TargetType> {
        let mut builder = match &self.name {
            Some(name) => RecordType::named(name.clone()),
            None => RecordType::builder(),
        };
        if let Some(rename) = &self.rename {
            builder = builder.rename(rename.clone());
        }
        if let Some(ns) = &self.namespace {
            builder = builder.namespace(ns.prefix.as_deref(), ns.uri.clone());
        }
        for field in &self.fields {
            builder = builder.field(field.to_spec()?);
        }
        let closed = self.closed.unwrap_or(self.rest.is_none());
        builder = match (&self.rest, closed) {
            // `build` rejects a closed record that still carries a rest type
            (Some(rest), true) => builder.rest(rest.to_target()?).closed(),
            (Some(rest), false) => builder.rest(rest.to_target()?),
            (None, false) => builder.open(),
            (None, true) => builder.closed(),
        };
        builder.into_type()
    }
}

impl FieldDoc {
    fn to_spec(&self) -> Result<FieldSpec> {
        if self.attribute && self.content {
            return Err(BindError::Schema(format!(
                "field '{}' cannot be both an attribute and the content field",
                self.name
            )));
        }
        let ty = self.ty.to_target()?;
        let mut spec = if self.required {
            FieldSpec::required(self.name.clone(), ty)
        } else {
            FieldSpec::optional(self.name.clone(), ty)
        };
        if let Some(rename) = &self.rename {
            spec = spec.renamed(rename.clone());
        }
        if self.attribute {
            spec = spec.attribute();
        }
        if self.content {
            spec = spec.content();
        }
        if let Some(ns) = &self.namespace {
            spec.namespace = Some(Namespace { prefix: ns.prefix.clone(), uri: ns.uri.clone() });
        }
        Ok(spec)
    }
}

/// `int`, `string?`, `decimal[]`, `int[3]`, `json`, ...
fn parse_type_name(name: &str) -> Result<TargetType> {
    let name = name.trim();
    if let Some(inner) = name.strip_suffix('?') {
        return Ok(TargetType::optional(parse_type_name(inner)?));
    }
    if let Some(head) = name.strip_suffix(']') {
        if let Some((element, size)) = head.rsplit_once('[') {
            let element = parse_type_name(element)?;
            if size.is_empty() {
                return Ok(TargetType::array_of(element));
            }
            let size = size
                .parse::<usize>()
                .map_err(|_| BindError::Schema(format!("invalid array size in '{name}'")))?;
            return Ok(TargetType::fixed_array(element, size));
        }
    }
    match name {
        "json" => Ok(TargetType::Json),
        "anydata" => Ok(TargetType::Anydata),
        other => ScalarKind::from_name(other)
            .map(TargetType::Scalar)
            .ok_or_else(|| BindError::Schema(format!("unknown type name '{other}'"))),
    }
}

// ------------------------------- Loading --------------------------------- //

pub fn parse_schema(src: &str) -> Result<TargetType> {
    let doc: TypeDoc = crate::path_de::from_str_with_path(src).map_err(BindError::Schema)?;
    doc.to_target()
}

pub fn schema_from_value(value: serde_json::Value) -> Result<TargetType> {
    let doc: TypeDoc = crate::path_de::from_value_with_path(value).map_err(BindError::Schema)?;
    doc.to_target()
}

pub fn load_schema(path: &Path) -> anyhow::Result<TargetType> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read schema {}: {e}", path.display()))?;
    parse_schema(&source).map_err(|e| anyhow::anyhow!("invalid schema {}: {e}", path.display()))
}
