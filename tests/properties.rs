use serde_json::json;
use shape_bind::schema::doc::schema_from_value;
use shape_bind::{
    from_json_str, from_json_value, from_xml_str, DecodeOptions, ErrorKind, FieldSpec, RecordType, TargetType, Value,
};

fn closed_person() -> TargetType {
    let address = RecordType::named("address")
        .field(FieldSpec::required("city", TargetType::string()))
        .field(FieldSpec::optional("zip", TargetType::int()))
        .into_type()
        .unwrap();
    RecordType::named("person")
        .field(FieldSpec::required("name", TargetType::string()))
        .field(FieldSpec::required("score", TargetType::float()))
        .field(FieldSpec::required("balance", TargetType::decimal()))
        .field(FieldSpec::required("active", TargetType::boolean()))
        .field(FieldSpec::optional("tags", TargetType::array_of(TargetType::string())))
        .field(FieldSpec::required("home", address))
        .into_type()
        .unwrap()
}

#[test]
fn serialize_then_decode_is_identity() {
    let ty = closed_person();
    let first = from_json_value(
        &json!({
            "name": "Ann",
            "score": 2.5,
            "balance": 1.5,
            "active": true,
            "tags": ["a", "b"],
            "home": {"city": "Oslo", "zip": 150}
        }),
        &ty,
    )
    .unwrap();
    let second = from_json_value(&first.to_json(), &ty).unwrap();
    assert_eq!(first, second);

    // decimals decoded from XML keep their exact digits through JSON
    let xml = "<person><name>Ann</name><score>1</score><balance>10.250</balance><active>true</active>\
               <home><city>Oslo</city></home></person>";
    let from_xml = from_xml_str(xml, &ty).unwrap();
    assert_eq!(from_json_value(&from_xml.to_json(), &ty).unwrap(), from_xml);
}

#[test]
fn missing_required_fails_and_missing_optional_is_unset() {
    let ty = closed_person();
    let ok = from_json_str(r#"{"name": "Ann", "score": 1.0, "balance": 0, "active": false, "home": {"city": "Oslo"}}"#, &ty).unwrap();
    assert_eq!(ok.get("tags"), None);
    assert_eq!(ok.get("home").and_then(|h| h.get("zip")), None);

    let err = from_json_str(r#"{"name": "Ann", "score": 1.0, "balance": 0, "home": {"city": "Oslo"}}"#, &ty).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RequiredFieldMissing);

    let xml = "<person><name>Ann</name><score>1</score><balance>0</balance><home><city>Oslo</city></home></person>";
    let err = from_xml_str(xml, &ty).unwrap_err();
    assert_eq!(err.to_string(), "failed to parse xml: required field 'active' not present in XML");
}

#[test]
fn json_rest_admission() {
    let open = RecordType::builder()
        .field(FieldSpec::required("a", TargetType::int()))
        .rest(TargetType::Anydata)
        .into_type()
        .unwrap();
    let out = from_json_str(r#"{"a": 1, "extra": "x"}"#, &open).unwrap();
    assert_eq!(out.to_json(), json!({"a": 1, "extra": "x"}));

    let closed = RecordType::builder()
        .field(FieldSpec::required("a", TargetType::int()))
        .field(FieldSpec::optional("b", TargetType::int()))
        .into_type()
        .unwrap();
    let out = from_json_str(r#"{"a": 1, "extra": "x"}"#, &closed).unwrap();
    assert_eq!(out.to_json(), json!({"a": 1}));

    let strict = shape_bind::from_json_str_with_options(r#"{"a": 1, "extra": "x"}"#, &closed, &DecodeOptions::strict());
    assert_eq!(strict.unwrap_err().kind(), ErrorKind::ShapeMismatch);
}

#[test]
fn xml_sibling_coalescing() {
    let array = RecordType::named("r")
        .field(FieldSpec::required("i", TargetType::array_of(TargetType::int())))
        .into_type()
        .unwrap();
    let out = from_xml_str("<r><i>1</i><i>2</i></r>", &array).unwrap();
    assert_eq!(out.to_json(), json!({"i": [1, 2]}));

    let scalar = RecordType::named("r")
        .field(FieldSpec::required("i", TargetType::int()))
        .into_type()
        .unwrap();
    let err = from_xml_str("<r><i>1</i><i>2</i></r>", &scalar).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
}

#[test]
fn fixed_array_size() {
    let ty = RecordType::named("r")
        .field(FieldSpec::required("i", TargetType::fixed_array(TargetType::int(), 2)))
        .into_type()
        .unwrap();
    let err = from_xml_str("<r><i>1</i><i>2</i><i>3</i></r>", &ty).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArraySizeMismatch);
    assert!(from_xml_str("<r><i>1</i><i>2</i></r>", &ty).is_ok());

    assert_eq!(from_json_str(r#"{"i": [1, 2, 3]}"#, &ty).unwrap_err().kind(), ErrorKind::ArraySizeMismatch);
    assert!(from_json_str(r#"{"i": [1, 2]}"#, &ty).is_ok());
}

#[test]
fn union_first_match() {
    let ty = RecordType::builder()
        .field(FieldSpec::required("v", TargetType::union(vec![TargetType::int(), TargetType::string()])))
        .into_type()
        .unwrap();
    let out = from_json_str(r#"{"v": "5"}"#, &ty).unwrap();
    assert_eq!(out.get("v"), Some(&Value::from("5")));
}

#[test]
fn namespace_is_checked_before_fields() {
    let ty = RecordType::named("r")
        .namespace(None, "urn:expected")
        .field(FieldSpec::required("a", TargetType::int()))
        .into_type()
        .unwrap();
    // `a` is missing too, but the namespace check runs first
    let err = from_xml_str(r#"<r xmlns="urn:other"/>"#, &ty).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NamespaceMismatch);
    assert!(from_xml_str(r#"<r xmlns="urn:expected"><a>1</a></r>"#, &ty).is_ok());
}

#[test]
fn schema_documents_drive_both_engines() {
    let ty = schema_from_value(json!({
        "kind": "record",
        "name": "Book",
        "rename": "book",
        "fields": [
            {"name": "id", "type": "int", "attribute": true},
            {"name": "title", "type": "string"},
            {"name": "authors", "type": "string[]", "rename": "author"},
            {"name": "price", "type": "decimal?", "required": false}
        ]
    }))
    .unwrap();

    let xml = r#"<book id="7"><title>Rust</title><author>A</author><author>B</author><price>9.90</price></book>"#;
    let from_xml = from_xml_str(xml, &ty).unwrap();
    assert_eq!(
        from_xml.to_json(),
        json!({"id": 7, "title": "Rust", "authors": ["A", "B"], "price": "9.90"})
    );

    let from_json = from_json_str(r#"{"id": 7, "title": "Rust", "author": ["A", "B"]}"#, &ty).unwrap();
    assert_eq!(from_json.get("authors").and_then(Value::as_array).map(<[Value]>::len), Some(2));
}
