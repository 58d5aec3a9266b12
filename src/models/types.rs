//! Type definitions for Ruster Audit
//! Explorer wire types, normalized source bundle and analysis results

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::errors::ExplorerDiagnostic;
use crate::utils::constants::{
    EXPLORER_STATUS_NOTOK, EXPLORER_STATUS_OK, IMPLEMENTATION_PATH_PREFIX, PROXY_PATH_PREFIX,
    UNPARSED_RESPONSE_MESSAGE,
};

// ============================================
// EXPLORER WIRE TYPES
// ============================================

/// Explorer API surface generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApiVersion {
    V1,
    V2,
}

/// One explorer query. Never mutated: an upgrade builds a new request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerRequest {
    base_url: String,
    params: Vec<(&'static str, String)>,
    version: ApiVersion,
}

impl ExplorerRequest {
    /// Build a v1-style query (`module`, `action`, `address`, `apikey`)
    pub fn new(base_url: &str, module: &str, action: &str, address: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            params: vec![
                ("module", module.to_string()),
                ("action", action.to_string()),
                ("address", address.to_string()),
                ("apikey", api_key.to_string()),
            ],
            version: ApiVersion::V1,
        }
    }

    /// Same query against the v2 endpoint shape, with `chainid` appended
    pub fn upgraded_to_v2(&self, chain_id: u64) -> Self {
        let mut params: Vec<(&'static str, String)> = self
            .params
            .iter()
            .filter(|(key, _)| *key != "chainid")
            .cloned()
            .collect();
        params.push(("chainid", chain_id.to_string()));

        Self {
            base_url: v2_base_url(&self.base_url),
            params,
            version: ApiVersion::V2,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn params(&self) -> &[(&'static str, String)] {
        &self.params
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// Value of one query parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Insert a `/v2` segment before the trailing endpoint segment:
/// `https://api.etherscan.io/api` → `https://api.etherscan.io/v2/api`
pub fn v2_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');

    // Split off the scheme so "//" is never mistaken for a path separator
    let (scheme, rest) = match trimmed.find("://") {
        Some(idx) => trimmed.split_at(idx + 3),
        None => ("", trimmed),
    };

    if rest.split('/').any(|segment| segment == "v2") {
        return trimmed.to_string();
    }

    match rest.rfind('/') {
        Some(idx) => format!("{}{}/v2{}", scheme, &rest[..idx], &rest[idx..]),
        None => format!("{}{}/v2/api", scheme, rest),
    }
}

/// Explorer response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorerResult {
    #[serde(default, deserialize_with = "string_or_number")]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

impl ExplorerResult {
    /// Decode a response body. Anything that is not an explorer envelope is
    /// kept as an "unparsed response" failure with the raw body as payload.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<ExplorerResult>(body) {
            Ok(parsed) if !parsed.status.is_empty() => parsed,
            _ => Self {
                status: EXPLORER_STATUS_NOTOK.to_string(),
                message: UNPARSED_RESPONSE_MESSAGE.to_string(),
                result: Value::String(body.to_string()),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EXPLORER_STATUS_OK
    }

    /// `message` and `result` joined, for heuristics over human-readable text
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.message, self.result_text())
    }

    /// `result` as text (strings verbatim, anything else as JSON)
    pub fn result_text(&self) -> String {
        match &self.result {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Diagnostic snapshot for error reporting
    pub fn diagnostic(&self) -> ExplorerDiagnostic {
        ExplorerDiagnostic {
            status: self.status.clone(),
            message: self.message.clone(),
            raw: self.result_text(),
        }
    }
}

/// One entry of a `getsourcecode` result array
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExplorerSourceEntry {
    #[serde(rename = "SourceCode", default)]
    pub source_code: String,
    #[serde(rename = "ContractName", default)]
    pub contract_name: String,
    #[serde(rename = "CompilerVersion", default)]
    pub compiler_version: String,
    #[serde(rename = "OptimizationUsed", default, deserialize_with = "string_or_number")]
    pub optimization_used: String,
    #[serde(rename = "Runs", default, deserialize_with = "string_or_number")]
    pub runs: String,
    #[serde(rename = "ConstructorArguments", default)]
    pub constructor_arguments: String,
    #[serde(rename = "EVMVersion", default)]
    pub evm_version: String,
    #[serde(rename = "LicenseType", default)]
    pub license_type: String,
    #[serde(rename = "Implementation", default)]
    pub implementation: String,
}

impl ExplorerSourceEntry {
    /// Explorers report unverified contracts with an empty `SourceCode`
    pub fn is_verified(&self) -> bool {
        !self.source_code.trim().is_empty()
    }
}

/// Some explorers send numeric fields as JSON numbers, most as strings
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if b { "1" } else { "0" }.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

// ============================================
// NORMALIZED SOURCE
// ============================================

/// Who a source file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    /// Non-proxy contract, no path prefix
    Plain,
    /// Proxy shell, `proxy/` prefix
    Proxy,
    /// Implementation behind a proxy, `implementation/` prefix
    Implementation,
}

impl SourceRole {
    pub fn path_prefix(&self) -> &'static str {
        match self {
            SourceRole::Plain => "",
            SourceRole::Proxy => PROXY_PATH_PREFIX,
            SourceRole::Implementation => IMPLEMENTATION_PATH_PREFIX,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceRole::Plain => "plain",
            SourceRole::Proxy => "proxy",
            SourceRole::Implementation => "implementation",
        }
    }
}

/// One normalized source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Final path segment
    pub name: String,
    /// Canonical identity, used for ordering and citations
    pub path: String,
    pub content: String,
    pub role: SourceRole,
}

impl SourceFile {
    /// Plain-role file; `name` is derived from the path
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: file_name(&path),
            path,
            content: content.into(),
            role: SourceRole::Plain,
        }
    }

    /// Re-tag with a role, prefixing the path accordingly
    pub fn with_role(self, role: SourceRole) -> Self {
        let path = format!("{}{}", role.path_prefix(), self.path);
        Self {
            name: file_name(&path),
            path,
            content: self.content,
            role,
        }
    }
}

/// Last `/`-delimited segment, or the whole path when there is none
pub fn file_name(path: &str) -> String {
    match path.rsplit('/').next() {
        Some(segment) if !segment.is_empty() => segment.to_string(),
        _ => path.to_string(),
    }
}

/// Optimizer block of the compiler settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    pub enabled: bool,
    pub runs: u32,
}

/// Compiler settings, always present in a bundle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilerSettings {
    pub optimizer: OptimizerSettings,
    pub remappings: Vec<String>,
    pub output_selection: Value,
    pub evm_version: Option<String>,
}

/// Implementation source could not be resolved behind a proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyPartial {
    pub implementation_address: String,
    pub reason: String,
}

/// Normalized, role-tagged unit handed to the analysis orchestrator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractBundle {
    pub address: String,
    pub chain_id: u64,
    pub files: Vec<SourceFile>,
    pub settings: CompilerSettings,
    pub contract_name: String,
    pub compiler_version: String,
    /// ABI JSON array (possibly empty)
    pub abi: Value,
    /// Implementation ABI JSON array (possibly empty)
    pub implementation_abi: Value,
    pub is_proxy: bool,
    pub implementation_address: Option<String>,
    /// Set when only the proxy shell could be resolved
    pub proxy_partial: Option<ProxyPartial>,
    pub license: Option<String>,
    pub constructor_arguments: Option<String>,
}

impl ContractBundle {
    /// Total source size in bytes
    pub fn total_source_bytes(&self) -> usize {
        self.files.iter().map(|f| f.content.len()).sum()
    }
}

// ============================================
// ANALYSIS
// ============================================

/// Built prompt and the knobs that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub prompt: String,
    pub model: String,
    pub language: String,
    pub super_prompt: bool,
    /// Paths included in the prompt body
    pub included_paths: Vec<String>,
    /// Paths left out (filtered or over budget)
    pub omitted_paths: Vec<String>,
}

/// Successful analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    /// Normalized Markdown, attribution header included
    pub markdown: String,
    pub model: String,
    /// Inference attempts made, successful one included
    pub attempts: u32,
    pub elapsed_ms: u64,
}

/// Analysis orchestrator states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnalysisState {
    Idle,
    Building,
    Requesting,
    Retrying,
    Succeeded,
    Failed,
    Cancelled,
}

impl AnalysisState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_v2_base_url() {
        assert_eq!(
            v2_base_url("https://api.etherscan.io/api"),
            "https://api.etherscan.io/v2/api"
        );
        assert_eq!(
            v2_base_url("https://api.bscscan.com/api/"),
            "https://api.bscscan.com/v2/api"
        );
        assert_eq!(
            v2_base_url("https://api.etherscan.io/v2/api"),
            "https://api.etherscan.io/v2/api"
        );
        assert_eq!(v2_base_url("http://127.0.0.1:1234"), "http://127.0.0.1:1234/v2/api");
    }

    #[test]
    fn test_request_upgrade_is_a_new_value() {
        let v1 = ExplorerRequest::new(
            "https://api.etherscan.io/api",
            "contract",
            "getsourcecode",
            "0xabc",
            "KEY",
        );
        let v2 = v1.upgraded_to_v2(1);

        assert_eq!(v1.version(), ApiVersion::V1);
        assert_eq!(v1.param("chainid"), None);
        assert_eq!(v2.version(), ApiVersion::V2);
        assert_eq!(v2.param("chainid"), Some("1"));
        assert_eq!(v2.param("address"), Some("0xabc"));
        assert_eq!(v2.base_url(), "https://api.etherscan.io/v2/api");
    }

    #[test]
    fn test_explorer_result_fallback() {
        let parsed = ExplorerResult::from_body(r#"{"status":"1","message":"OK","result":"[]"}"#);
        assert!(parsed.is_success());

        let html = ExplorerResult::from_body("<html>502 Bad Gateway</html>");
        assert!(!html.is_success());
        assert_eq!(html.message, UNPARSED_RESPONSE_MESSAGE);
        assert_eq!(html.result, json!("<html>502 Bad Gateway</html>"));
    }

    #[test]
    fn test_numeric_status_accepted() {
        let parsed = ExplorerResult::from_body(r#"{"status":1,"message":"OK","result":[]}"#);
        assert!(parsed.is_success());
    }

    #[test]
    fn test_source_entry_deserialize() {
        let entry: ExplorerSourceEntry = serde_json::from_value(json!({
            "SourceCode": "contract Foo {}",
            "ABI": "[]",
            "ContractName": "Foo",
            "CompilerVersion": "v0.8.19+commit.7dd6d404",
            "OptimizationUsed": "1",
            "Runs": 200,
            "EVMVersion": "Default",
            "Implementation": ""
        }))
        .unwrap();

        assert!(entry.is_verified());
        assert_eq!(entry.runs, "200");
        assert_eq!(entry.contract_name, "Foo");
    }

    #[test]
    fn test_terminal_states() {
        assert!(AnalysisState::Succeeded.is_terminal());
        assert!(AnalysisState::Failed.is_terminal());
        assert!(AnalysisState::Cancelled.is_terminal());
        assert!(!AnalysisState::Retrying.is_terminal());
        assert!(!AnalysisState::Idle.is_terminal());
    }

    #[test]
    fn test_source_file_roles() {
        let file = SourceFile::new("contracts/token/Token.sol", "contract Token {}");
        assert_eq!(file.name, "Token.sol");
        assert_eq!(file.role, SourceRole::Plain);

        let tagged = file.with_role(SourceRole::Implementation);
        assert_eq!(tagged.path, "implementation/contracts/token/Token.sol");
        assert_eq!(tagged.name, "Token.sol");
    }

    #[test]
    fn test_file_name_without_separator() {
        assert_eq!(file_name("Foo.sol"), "Foo.sol");
        assert_eq!(file_name("dir/"), "dir/");
    }
}
