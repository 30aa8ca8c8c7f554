//! Failure taxonomy shared by both binders.
//!
//! Every decode call surfaces exactly one error; nothing here is retried.
//! The JSON binder returns [`BindError`] as-is, the XML decoder wraps it in
//! [`XmlError`] so messages carry the `failed to parse xml: ` prefix.

use thiserror::Error;

use crate::scalar::ScalarError;

pub type Result<T, E = BindError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// The target type cannot drive this decoder (e.g. a non-record XML root).
    #[error("unsupported target type: {0}")]
    Schema(String),

    #[error("incompatible value {found} for type '{expected}'{}", at(.path))]
    ShapeMismatch {
        expected: String,
        found: String,
        path: String,
    },

    #[error("size mismatch between target and source: expected {expected} members, found {found}{}", at(.path))]
    ArityMismatch {
        expected: usize,
        found: usize,
        path: String,
    },

    #[error("array size mismatch for '{field}': expected {expected} elements, found {found}")]
    ArraySizeMismatch {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("required field '{field}' not present in {input}")]
    RequiredFieldMissing { field: String, input: &'static str },

    #[error("root element '{found}' does not match expected '{expected}'")]
    RootNameMismatch { expected: String, found: String },

    #[error("namespace mismatch for element '{element}': expected '{expected}', found '{}'", .found.as_deref().unwrap_or(""))]
    NamespaceMismatch {
        element: String,
        expected: String,
        found: Option<String>,
    },

    #[error("unexpected end of document: element '{open}' was never closed")]
    UnexpectedEndOfDocument { open: String },

    #[error("{0}")]
    MalformedInput(String),
}

/// Fieldless view of [`BindError`], handy for matching in callers and fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
pub enum ErrorKind {
    SchemaError,
    ShapeMismatch,
    ArityMismatch,
    ArraySizeMismatch,
    RequiredFieldMissing,
    RootNameMismatch,
    NamespaceMismatch,
    UnexpectedEndOfDocument,
    MalformedInput,
}

impl BindError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BindError::Schema(_) => ErrorKind::SchemaError,
            BindError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            BindError::ArityMismatch { .. } => ErrorKind::ArityMismatch,
            BindError::ArraySizeMismatch { .. } => ErrorKind::ArraySizeMismatch,
            BindError::RequiredFieldMissing { .. } => ErrorKind::RequiredFieldMissing,
            BindError::RootNameMismatch { .. } => ErrorKind::RootNameMismatch,
            BindError::NamespaceMismatch { .. } => ErrorKind::NamespaceMismatch,
            BindError::UnexpectedEndOfDocument { .. } => ErrorKind::UnexpectedEndOfDocument,
            BindError::MalformedInput(_) => ErrorKind::MalformedInput,
        }
    }

    pub(crate) fn shape(expected: impl ToString, found: impl ToString, path: impl Into<String>) -> Self {
        BindError::ShapeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
            path: path.into(),
        }
    }

    /// Re-anchor a scalar conversion failure at `path`.
    pub(crate) fn from_scalar(err: ScalarError, path: impl Into<String>) -> Self {
        BindError::ShapeMismatch {
            expected: err.expected,
            found: format!("'{}'", err.text),
            path: path.into(),
        }
    }
}

impl From<ScalarError> for BindError {
    fn from(err: ScalarError) -> Self {
        BindError::from_scalar(err, "")
    }
}

fn at(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(" at '{path}'")
    }
}

/// Error surfaced by the XML decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to parse xml: {0}")]
pub struct XmlError(#[from] pub BindError);

impl XmlError {
    pub fn kind(&self) -> ErrorKind {
        self.0.kind()
    }

    pub fn inner(&self) -> &BindError {
        &self.0
    }
}
