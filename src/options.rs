//! Per-call decode settings.
use std::path::Path;

use serde::Deserialize;

pub const DEFAULT_TEXT_KEY: &str = "#content";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct DecodeOptions {
    /// JSON: reject undeclared keys on closed records instead of dropping them.
    pub strict_closed_records: bool,
    /// XML: key holding mixed text inside rest-captured subtrees.
    pub text_key: String,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            strict_closed_records: false,
            text_key: DEFAULT_TEXT_KEY.to_owned(),
        }
    }
}

impl DecodeOptions {
    pub fn strict() -> Self {
        Self { strict_closed_records: true, ..Self::default() }
    }

    /// Load options from a JSON file; errors point at the offending key.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)?;
        crate::path_de::from_str_with_path(&source)
            .map_err(|e| anyhow::anyhow!("invalid options file {}: {e}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_fill_defaults() {
        let opts: DecodeOptions = serde_json::from_str(r#"{"strictClosedRecords": true}"#).unwrap();
        assert!(opts.strict_closed_records);
        assert_eq!(opts.text_key, DEFAULT_TEXT_KEY);
    }

    #[test]
    fn unknown_keys_are_rejected_with_path() {
        let err = crate::path_de::from_str_with_path::<DecodeOptions>(r#"{"textKey": "_", "bogus": 1}"#)
            .unwrap_err();
        assert!(err.contains("bogus"), "{err}");
    }
}
