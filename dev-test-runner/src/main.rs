//! Data-driven fixture runner.
//!
//! Each file under `fixtures/` holds a JSON array of cases:
//!
//! ```json
//! [{
//!   "name": "coalesce siblings",
//!   "format": "xml",
//!   "schema": { "kind": "record", "name": "r", "fields": [{ "name": "i", "type": "int[]" }] },
//!   "input": "<r><i>1</i><i>2</i></r>",
//!   "expect": { "value": { "i": [1, 2] } }
//! }]
//! ```
//!
//! `expect` is either `{"value": ...}` or `{"error": "<ErrorKind>"}`.
//!
//! Usage: `dev-test-runner [FIXTURE_DIR] [NAME_REGEX]`
use std::path::{Path, PathBuf};

use colored::Colorize;
use regex::Regex;
use serde::Deserialize;

use shape_bind::schema::doc::schema_from_value;
use shape_bind::{DecodeOptions, ErrorKind};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Case {
    name: String,
    format: Format,
    schema: serde_json::Value,
    input: serde_json::Value,
    #[serde(default)]
    options: DecodeOptions,
    expect: Expect,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Format {
    Json,
    Xml,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Expect {
    Value(serde_json::Value),
    Error(ErrorKind),
}

fn load_cases(path: &Path) -> Result<Vec<Case>, String> {
    let source = std::fs::read_to_string(path).map_err(|e| format!("failed to read: {e}"))?;
    let de = &mut serde_json::Deserializer::from_str(&source);
    serde_path_to_error::deserialize(de).map_err(|err| format!("at JSON path {} → {}", err.path(), err.inner()))
}

fn run_case(case: &Case) -> Result<(), String> {
    let schema = schema_from_value(case.schema.clone()).map_err(|e| format!("bad schema: {e}"))?;
    let outcome = match case.format {
        Format::Json => shape_bind::from_json_value_with_options(&case.input, &schema, &case.options)
            .map_err(|e| (e.kind(), e.to_string())),
        Format::Xml => {
            let Some(src) = case.input.as_str() else {
                return Err("xml input must be a string".into());
            };
            shape_bind::from_xml_str_with_options(src, &schema, &case.options).map_err(|e| (e.kind(), e.to_string()))
        }
    };
    match (&case.expect, outcome) {
        (Expect::Value(want), Ok(got)) => {
            let got = got.to_json();
            if got == *want { Ok(()) } else { Err(format!("expected {want}, got {got}")) }
        }
        (Expect::Value(_), Err((_, msg))) => Err(format!("unexpected error: {msg}")),
        (Expect::Error(want), Err((got, _))) if got == *want => Ok(()),
        (Expect::Error(want), Err((got, msg))) => Err(format!("expected {want:?}, got {got:?}: {msg}")),
        (Expect::Error(want), Ok(got)) => Err(format!("expected {want:?}, got value {got}")),
    }
}

fn fixture_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

fn main() {
    let mut args = std::env::args().skip(1);
    let dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("../fixtures"));
    let filter = match args.next().map(|p| Regex::new(&p)).transpose() {
        Ok(filter) => filter,
        Err(error) => {
            eprintln!("invalid name filter: {error}");
            std::process::exit(2);
        }
    };

    let files = match fixture_files(&dir) {
        Ok(files) => files,
        Err(error) => {
            eprintln!("failed to list fixtures in {}: {error}", dir.display());
            std::process::exit(2);
        }
    };

    let (mut passed, mut failed) = (0usize, 0usize);
    for file in files {
        let cases = match load_cases(&file) {
            Ok(cases) => cases,
            Err(error) => {
                eprintln!("{} {}: {error}", "✗".red(), file.display());
                failed += 1;
                continue;
            }
        };
        for case in cases.iter().filter(|c| filter.as_ref().is_none_or(|re| re.is_match(&c.name))) {
            match run_case(case) {
                Ok(()) => {
                    passed += 1;
                    eprintln!("{} {}", "✓".green(), case.name);
                }
                Err(error) => {
                    failed += 1;
                    eprintln!("{} {}: {error}", "✗".red(), case.name.bold());
                }
            }
        }
    }

    eprintln!("{passed} passed, {failed} failed");
    if failed > 0 {
        std::process::exit(1);
    }
}
