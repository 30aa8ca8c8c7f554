//! Schema-directed decoding of JSON and XML into typed values.
//!
//! Two engines share one schema model ([`schema`]) and one scalar converter
//! ([`scalar`]):
//!
//! - [`json`] binds an already parsed `serde_json::Value` by type-directed
//!   recursion, with first-match union resolution.
//! - [`xml`] decodes a stream of events in a single forward pass against a
//!   record type.
//!
//! ```
//! use shape_bind::schema::{FieldSpec, RecordType, TargetType};
//!
//! let person = RecordType::named("person")
//!     .field(FieldSpec::required("name", TargetType::string()))
//!     .field(FieldSpec::optional("age", TargetType::int()))
//!     .into_type()
//!     .unwrap();
//!
//! let a = shape_bind::from_json_str(r#"{"name": "Ann", "age": 7}"#, &person).unwrap();
//! let b = shape_bind::from_xml_str("<person><name>Ann</name><age>7</age></person>", &person).unwrap();
//! assert_eq!(a, b);
//! ```
pub mod error;
pub mod json;
pub mod options;
pub mod path_de;
pub mod scalar;
pub mod schema;
pub mod value;
pub mod xml;

use std::io::BufRead;

pub use error::{BindError, ErrorKind, XmlError};
pub use options::DecodeOptions;
pub use schema::{FieldSpec, RecordType, ScalarKind, TargetType};
pub use value::Value;

// ---------------------------------- JSON ---------------------------------- //

pub fn from_json_value(json: &serde_json::Value, ty: &TargetType) -> Result<Value, BindError> {
    json::bind(json, ty)
}

pub fn from_json_value_with_options(
    json: &serde_json::Value,
    ty: &TargetType,
    options: &DecodeOptions,
) -> Result<Value, BindError> {
    json::bind_with_options(json, ty, options)
}

pub fn from_json_str(src: &str, ty: &TargetType) -> Result<Value, BindError> {
    from_json_str_with_options(src, ty, &DecodeOptions::default())
}

pub fn from_json_str_with_options(src: &str, ty: &TargetType, options: &DecodeOptions) -> Result<Value, BindError> {
    let json = serde_json::from_str(src).map_err(malformed_json)?;
    json::bind_with_options(&json, ty, options)
}

pub fn from_json_slice(bytes: &[u8], ty: &TargetType) -> Result<Value, BindError> {
    from_json_slice_with_options(bytes, ty, &DecodeOptions::default())
}

pub fn from_json_slice_with_options(
    bytes: &[u8],
    ty: &TargetType,
    options: &DecodeOptions,
) -> Result<Value, BindError> {
    let json = serde_json::from_slice(bytes).map_err(malformed_json)?;
    json::bind_with_options(&json, ty, options)
}

fn malformed_json(err: serde_json::Error) -> BindError {
    BindError::MalformedInput(format!("failed to parse json: {err}"))
}

// ---------------------------------- XML ----------------------------------- //

pub fn from_xml_str(src: &str, ty: &TargetType) -> Result<Value, XmlError> {
    from_xml_str_with_options(src, ty, &DecodeOptions::default())
}

pub fn from_xml_str_with_options(src: &str, ty: &TargetType, options: &DecodeOptions) -> Result<Value, XmlError> {
    xml::decode(&mut xml::QuickXmlSource::from_str(src), ty, options)
}

pub fn from_xml_reader<R: BufRead>(reader: R, ty: &TargetType) -> Result<Value, XmlError> {
    from_xml_reader_with_options(reader, ty, &DecodeOptions::default())
}

pub fn from_xml_reader_with_options<R: BufRead>(
    reader: R,
    ty: &TargetType,
    options: &DecodeOptions,
) -> Result<Value, XmlError> {
    xml::decode(&mut xml::QuickXmlSource::new(reader), ty, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_is_reported_before_binding() {
        let err = from_json_str("{\"a\": ", &TargetType::Json).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(err.to_string().starts_with("failed to parse json: "));
    }

    #[test]
    fn readers_and_strings_agree() {
        let ty = RecordType::named("r")
            .field(FieldSpec::required("a", TargetType::decimal()))
            .into_type()
            .unwrap();
        let xml = "<r><a>1.50</a></r>";
        assert_eq!(
            from_xml_reader(std::io::Cursor::new(xml), &ty).unwrap(),
            from_xml_str(xml, &ty).unwrap()
        );
    }
}
