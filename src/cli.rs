//! CLI: bind JSON or decode XML inputs against a schema document.
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use log::debug;
use rayon::prelude::*;

use shape_bind::schema::doc::load_schema;
use shape_bind::{DecodeOptions, TargetType};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// decode JSON or XML documents into values shaped by a schema document
#[derive(Parser, Debug)]
#[command(name = "shape-bind", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// bind JSON documents
    Json(JsonIn),
    /// decode XML documents
    Xml(XmlIn),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// schema document (.json) describing the target type
    #[arg(long)]
    schema: PathBuf,

    /// decode options file (.json); flags given on the command line win
    #[arg(long)]
    options: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct JsonIn {
    #[command(flatten)]
    schema: SchemaSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document; every output is bound separately
    #[arg(long)]
    jq_expr: Option<String>,

    /// reject undeclared keys on closed records instead of dropping them
    #[arg(long, default_value_t = false)]
    strict_closed_records: bool,
}

#[derive(clap::Parser, Debug)]
struct XmlIn {
    #[command(flatten)]
    schema: SchemaSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// key for mixed text inside captured subtrees
    #[arg(long)]
    text_key: Option<String>,
}

/// Result of decoding one input file.
struct Outcome {
    path: PathBuf,
    result: Result<Vec<serde_json::Value>>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSettings {
    fn load(&self) -> Result<(TargetType, DecodeOptions)> {
        let schema = load_schema(&self.schema)?;
        let options = match &self.options {
            Some(path) => DecodeOptions::load(path)?,
            None => DecodeOptions::default(),
        };
        debug!("schema '{schema}' with {options:?}");
        Ok((schema, options))
    }
}

impl JsonIn {
    fn decode(&self, path: &Path, schema: &TargetType, options: &DecodeOptions) -> Result<Vec<serde_json::Value>> {
        let source = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let document: serde_json::Value = serde_json::from_str(&source).context("failed to parse json")?;
        let document = match &self.json_pointer {
            Some(pointer) => document
                .pointer(pointer)
                .cloned()
                .ok_or_else(|| anyhow!("json pointer {pointer} selects nothing"))?,
            None => document,
        };
        let documents = match &self.jq_expr {
            Some(filter) => crate::jq_exec::select(filter, &document)?,
            None => vec![document],
        };
        documents
            .iter()
            .map(|doc| Ok(shape_bind::from_json_value_with_options(doc, schema, options)?.to_json()))
            .collect()
    }
}

impl XmlIn {
    fn decode(&self, path: &Path, schema: &TargetType, options: &DecodeOptions) -> Result<Vec<serde_json::Value>> {
        let file = std::fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let value = shape_bind::from_xml_reader_with_options(std::io::BufReader::new(file), schema, options)?;
        Ok(vec![value.to_json()])
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Json(target) => {
                let (schema, mut options) = target.schema.load()?;
                options.strict_closed_records |= target.strict_closed_records;
                run_inputs(&target.input_settings, |path| target.decode(path, &schema, &options))
            }
            Command::Xml(target) => {
                let (schema, mut options) = target.schema.load()?;
                if let Some(text_key) = &target.text_key {
                    options.text_key = text_key.clone();
                }
                run_inputs(&target.input_settings, |path| target.decode(path, &schema, &options))
            }
        }
    }
}

/// Decode every input in parallel, report per-input status on stderr and
/// write the successful values. Any failed input fails the run.
fn run_inputs<F>(settings: &InputSettings, decode: F) -> Result<()>
where
    F: Fn(&Path) -> Result<Vec<serde_json::Value>> + Sync,
{
    let paths = resolve_file_path_patterns(&settings.input)?;
    let outcomes: Vec<Outcome> = paths
        .into_par_iter()
        .map(|path| {
            let result = decode(&path);
            Outcome { path, result }
        })
        .collect();

    let mut values = Vec::new();
    let mut failed = 0usize;
    for outcome in &outcomes {
        let shown = outcome.path.display().to_string();
        match &outcome.result {
            Ok(vs) => {
                eprintln!("{} {}", "✓".green(), shown);
                values.extend(vs.iter().cloned());
            }
            Err(error) => {
                failed += 1;
                eprintln!("{} {}: {error:#}", "✗".red(), shown.bold());
            }
        }
    }

    let rendered = match values.len() {
        1 => serde_json::to_string_pretty(&values[0])?,
        _ => serde_json::to_string_pretty(&values)?,
    };
    match settings.out.as_ref() {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, &rendered).with_context(|| format!("failed to write {}", out.display()))?;
        }
        None => println!("{rendered}"),
    }

    if failed > 0 {
        return Err(anyhow!("{failed} of {} inputs failed", outcomes.len()));
    }
    Ok(())
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                return Err(anyhow!("glob pattern matched no files: {pattern}"));
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
