//! Source Normalizer
//!
//! Turns the explorer's `SourceCode` field into an ordered list of
//! `SourceFile`s. Three payload shapes exist in the wild:
//! - plain Solidity text (single-file verification)
//! - `{{ "language": ..., "sources": {...}, "settings": {...} }}`, a
//!   Standard-JSON-Input document wrapped in one extra pair of braces
//! - `{ "path.sol": { "content": ... }, ... }`, a flat path → content map
//!
//! Anything unrecognized degrades to one best-effort file holding the raw
//! string: a usable-but-imperfect bundle beats no bundle.

use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{CompilerSettings, ExplorerSourceEntry, OptimizerSettings, SourceFile};

/// File name stem used when the explorer reports no contract name
const FALLBACK_CONTRACT_NAME: &str = "Contract";

/// Normalize a raw explorer source blob. Pure and deterministic.
///
/// Blank input yields an empty list; any other input yields at least one file.
pub fn normalize_source(raw: &str, contract_name: &str) -> Vec<SourceFile> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    if !raw.trim_start().starts_with('{') {
        return vec![single_file(raw, contract_name)];
    }

    match parse_packed(raw).map(|doc| collect_files(&doc)) {
        Some(Some(files)) if !files.is_empty() => files,
        _ => {
            debug!(contract = contract_name, "Packed source not recognized, using single-file fallback");
            vec![single_file(raw, contract_name)]
        }
    }
}

/// Compiler settings from the packed document's `settings`, or synthesized
/// from the explorer's flat fields
pub fn compiler_settings(entry: &ExplorerSourceEntry) -> CompilerSettings {
    let flat = flat_settings(entry);

    let packed = if entry.source_code.trim_start().starts_with('{') {
        parse_packed(&entry.source_code)
    } else {
        None
    };

    let Some(settings) = packed.as_ref().and_then(|doc| doc.get("settings")) else {
        return flat;
    };

    let optimizer = settings.get("optimizer");
    let enabled = optimizer
        .and_then(|o| o.get("enabled"))
        .and_then(Value::as_bool)
        .unwrap_or(flat.optimizer.enabled);
    let runs = optimizer
        .and_then(|o| o.get("runs"))
        .and_then(Value::as_u64)
        .map(|r| r.min(u32::MAX as u64) as u32)
        .unwrap_or(flat.optimizer.runs);

    let remappings = settings
        .get("remappings")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    CompilerSettings {
        optimizer: OptimizerSettings { enabled, runs },
        remappings,
        output_selection: settings
            .get("outputSelection")
            .cloned()
            .unwrap_or(flat.output_selection),
        evm_version: settings
            .get("evmVersion")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(flat.evm_version),
    }
}

fn flat_settings(entry: &ExplorerSourceEntry) -> CompilerSettings {
    let evm_version = match entry.evm_version.trim() {
        "" => None,
        v if v.eq_ignore_ascii_case("default") => None,
        v => Some(v.to_string()),
    };

    CompilerSettings {
        optimizer: OptimizerSettings {
            enabled: entry.optimization_used.trim() == "1",
            runs: entry.runs.trim().parse().unwrap_or(0),
        },
        remappings: Vec::new(),
        output_selection: Value::Object(Map::new()),
        evm_version,
    }
}

fn single_file(raw: &str, contract_name: &str) -> SourceFile {
    let stem = match contract_name.trim() {
        "" => FALLBACK_CONTRACT_NAME,
        name => name,
    };
    SourceFile::new(format!("{}.sol", stem), raw)
}

/// Strip the explorer's extra brace pair, then parse as a JSON object
fn parse_packed(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();
    let unwrapped = if trimmed.starts_with("{{") && trimmed.ends_with("}}") {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    match serde_json::from_str::<Value>(unwrapped) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Files from either accepted shape; `None` when the shape is not accepted
fn collect_files(doc: &Map<String, Value>) -> Option<Vec<SourceFile>> {
    let entries = match doc.get("sources") {
        Some(Value::Object(sources)) => sources,
        Some(_) => return None,
        // Standard-JSON-Input without a sources map is not a flat map either
        None if doc.contains_key("language") || doc.contains_key("settings") => return None,
        None => doc,
    };

    entries
        .iter()
        .map(|(path, value)| file_content(value).map(|content| SourceFile::new(path.clone(), content)))
        .collect()
}

fn file_content(value: &Value) -> Option<String> {
    match value {
        Value::String(content) => Some(content.clone()),
        Value::Object(obj) => obj.get("content").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceRole;

    const STANDARD_JSON: &str = r#"{{
  "language": "Solidity",
  "sources": {
    "contracts/Token.sol": { "content": "import './lib/Math.sol';\ncontract Token {}" },
    "contracts/lib/Math.sol": { "content": "library Math {}" }
  },
  "settings": {
    "optimizer": { "enabled": true, "runs": 999 },
    "remappings": ["@oz/=lib/openzeppelin/"],
    "outputSelection": { "*": { "*": ["abi"] } },
    "evmVersion": "paris"
  }
}}"#;

    fn entry(source: &str) -> ExplorerSourceEntry {
        ExplorerSourceEntry {
            source_code: source.to_string(),
            contract_name: "Token".to_string(),
            optimization_used: "0".to_string(),
            runs: "200".to_string(),
            evm_version: "Default".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_file() {
        let files = normalize_source("contract Foo {}", "Foo");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "Foo.sol");
        assert_eq!(files[0].name, "Foo.sol");
        assert_eq!(files[0].content, "contract Foo {}");
        assert_eq!(files[0].role, SourceRole::Plain);
    }

    #[test]
    fn test_single_file_without_name() {
        let files = normalize_source("contract Foo {}", "  ");
        assert_eq!(files[0].path, "Contract.sol");
    }

    #[test]
    fn test_standard_json_input() {
        let files = normalize_source(STANDARD_JSON, "Token");
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["contracts/Token.sol", "contracts/lib/Math.sol"]);
        assert_eq!(files[1].name, "Math.sol");
        assert_eq!(files[1].content, "library Math {}");
    }

    #[test]
    fn test_flat_map_with_string_and_object_values() {
        let raw = r#"{"B.sol": "contract B {}", "A.sol": {"content": "contract A {}"}}"#;
        let files = normalize_source(raw, "A");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "A.sol");
        assert_eq!(files[1].content, "contract B {}");
    }

    #[test]
    fn test_malformed_json_falls_back_to_raw() {
        let raw = "{{ this is not json";
        let files = normalize_source(raw, "Broken");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "Broken.sol");
        assert_eq!(files[0].content, raw);
    }

    #[test]
    fn test_unknown_shapes_fall_back() {
        for raw in [
            r#"{"sources": []}"#,
            r#"{"sources": {}}"#,
            r#"{"A.sol": 42}"#,
            r#"{"language": "Solidity"}"#,
        ] {
            let files = normalize_source(raw, "X");
            assert_eq!(files.len(), 1, "input: {}", raw);
            assert_eq!(files[0].path, "X.sol");
            assert_eq!(files[0].content, raw);
        }
    }

    #[test]
    fn test_blank_input_is_empty() {
        assert!(normalize_source("", "Foo").is_empty());
        assert!(normalize_source("  \n", "Foo").is_empty());
    }

    #[test]
    fn test_single_and_packed_agree_on_content() {
        let single = normalize_source("contract Foo {}", "Foo");
        let packed = normalize_source(r#"{{"sources": {"Foo.sol": {"content": "contract Foo {}"}}}}"#, "Foo");
        assert_eq!(single.len(), packed.len());
        assert_eq!(single[0].content, packed[0].content);
        assert_eq!(single[0].role, packed[0].role);
    }

    #[test]
    fn test_idempotent() {
        assert_eq!(
            normalize_source(STANDARD_JSON, "Token"),
            normalize_source(STANDARD_JSON, "Token")
        );
    }

    #[test]
    fn test_settings_from_packed_document() {
        let settings = compiler_settings(&entry(STANDARD_JSON));
        assert!(settings.optimizer.enabled);
        assert_eq!(settings.optimizer.runs, 999);
        assert_eq!(settings.remappings, vec!["@oz/=lib/openzeppelin/".to_string()]);
        assert_eq!(settings.evm_version.as_deref(), Some("paris"));
        assert!(settings.output_selection.get("*").is_some());
    }

    #[test]
    fn test_settings_synthesized_from_flat_fields() {
        let mut e = entry("contract Token {}");
        e.optimization_used = "1".to_string();
        let settings = compiler_settings(&e);
        assert!(settings.optimizer.enabled);
        assert_eq!(settings.optimizer.runs, 200);
        assert!(settings.remappings.is_empty());
        assert_eq!(settings.evm_version, None);
    }
}
