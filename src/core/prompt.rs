//! Prompt Builder
//!
//! Selects files worth auditing, concatenates them under path headers within
//! the model's source budget, and wraps the result in the audit template
//! with a language directive and the optional super prompt.

use tracing::debug;

use crate::models::{AnalysisRequest, AnalyzerConfig, ContractBundle, SourceFile, SourceRole};
use crate::utils::constants::{get_language_name, ModelInfo, AUDIT_TEMPLATE, SUPER_PROMPT};

/// Path fragments of third-party code that is audited upstream
const VENDORED_PATH_MARKERS: [&str; 12] = [
    "node_modules/",
    "@openzeppelin/",
    "openzeppelin-contracts/",
    "openzeppelin-contracts-upgradeable/",
    "forge-std/",
    "@chainlink/",
    "@uniswap/",
    "solmate/",
    "solady/",
    "@gnosis.pm/",
    "@layerzerolabs/",
    "hardhat/console.sol",
];

/// Marker appended to a file cut to fit the budget
const TRUNCATION_MARKER: &str = "\n// ... truncated to fit the model context ...\n";

/// File declares interfaces but no contract or library
pub fn is_interface_only(file: &SourceFile) -> bool {
    let mut has_interface = false;
    for line in file.content.lines() {
        let line = line.trim_start();
        if line.starts_with("contract ")
            || line.starts_with("abstract contract ")
            || line.starts_with("library ")
        {
            return false;
        }
        if line.starts_with("interface ") {
            has_interface = true;
        }
    }
    has_interface
}

/// File lives in a well-known third-party package
pub fn is_vendored(file: &SourceFile) -> bool {
    let path = file.path.to_lowercase();
    VENDORED_PATH_MARKERS.iter().any(|marker| path.contains(marker))
}

/// Cut `s` to at most `max` bytes on a char boundary
fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn file_section(path: &str, content: &str) -> String {
    format!("// File: {}\n{}\n\n", path, content)
}

/// Implementation logic first: it is what executes behind a proxy
fn role_priority(role: SourceRole) -> u8 {
    match role {
        SourceRole::Implementation => 0,
        SourceRole::Plain => 1,
        SourceRole::Proxy => 2,
    }
}

pub struct PromptBuilder {
    max_source_bytes: usize,
}

impl PromptBuilder {
    pub fn new(max_source_bytes: usize) -> Self {
        Self { max_source_bytes }
    }

    pub fn for_model(model: &ModelInfo) -> Self {
        Self::new(model.max_source_bytes)
    }

    /// Build the full analysis request for a bundle
    pub fn build(&self, bundle: &ContractBundle, config: &AnalyzerConfig) -> AnalysisRequest {
        let mut selected: Vec<&SourceFile> = bundle
            .files
            .iter()
            .filter(|f| !is_interface_only(f) && !is_vendored(f))
            .collect();
        let mut omitted: Vec<String> = bundle
            .files
            .iter()
            .filter(|f| is_interface_only(f) || is_vendored(f))
            .map(|f| f.path.clone())
            .collect();

        // Never audit nothing
        if selected.is_empty() {
            selected = bundle.files.iter().collect();
            omitted.clear();
        }
        selected.sort_by_key(|f| role_priority(f.role));

        let mut sources = String::new();
        let mut included = Vec::new();
        for file in selected {
            let section = file_section(&file.path, &file.content);
            if sources.len() + section.len() <= self.max_source_bytes {
                sources.push_str(&section);
                included.push(file.path.clone());
            } else if included.is_empty() {
                let overhead = file_section(&file.path, "").len() + TRUNCATION_MARKER.len();
                let room = self.max_source_bytes.saturating_sub(overhead);
                let cut = truncate_at_char_boundary(&file.content, room);
                sources.push_str(&file_section(&file.path, &format!("{}{}", cut, TRUNCATION_MARKER)));
                included.push(file.path.clone());
            } else {
                omitted.push(file.path.clone());
            }
        }

        debug!(
            included = included.len(),
            omitted = omitted.len(),
            bytes = sources.len(),
            "Prompt sources assembled"
        );

        let body = AUDIT_TEMPLATE
            .replace("{metadata}", &metadata_block(bundle, &omitted))
            .replace("{sources}", &sources);

        let mut prompt = String::new();
        if config.super_prompt {
            prompt.push_str(SUPER_PROMPT);
            prompt.push_str("\n\n");
        }
        prompt.push_str(&body);
        prompt.push_str(&format!(
            "\n\nIMPORTANT: Write the entire report in {}.",
            get_language_name(&config.language)
        ));

        AnalysisRequest {
            prompt,
            model: config.selected_model.clone(),
            language: config.language.clone(),
            super_prompt: config.super_prompt,
            included_paths: included,
            omitted_paths: omitted,
        }
    }
}

fn metadata_block(bundle: &ContractBundle, omitted: &[String]) -> String {
    let mut lines = vec![
        format!("- Contract: {}", bundle.contract_name),
        format!("- Address: {} (chain id {})", bundle.address, bundle.chain_id),
        format!("- Compiler: {}", bundle.compiler_version),
        format!(
            "- Optimizer: {} ({} runs)",
            if bundle.settings.optimizer.enabled { "enabled" } else { "disabled" },
            bundle.settings.optimizer.runs
        ),
    ];
    if let Some(evm) = &bundle.settings.evm_version {
        lines.push(format!("- EVM version: {}", evm));
    }
    if let Some(license) = &bundle.license {
        lines.push(format!("- License: {}", license));
    }
    if bundle.is_proxy {
        lines.push(format!(
            "- Proxy: yes, implementation at {}",
            bundle.implementation_address.as_deref().unwrap_or("unknown")
        ));
        if bundle.proxy_partial.is_some() {
            lines.push("- Implementation source unavailable, only the proxy shell is included".to_string());
        }
    } else {
        lines.push("- Proxy: no".to_string());
    }
    if !omitted.is_empty() {
        lines.push(format!("- Files not included: {}", omitted.join(", ")));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CompilerSettings;
    use serde_json::json;

    fn bundle(files: Vec<SourceFile>) -> ContractBundle {
        ContractBundle {
            address: "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
            chain_id: 1,
            files,
            settings: CompilerSettings::default(),
            contract_name: "Vault".to_string(),
            compiler_version: "v0.8.20+commit.a1b79de6".to_string(),
            abi: json!([]),
            implementation_abi: json!([]),
            is_proxy: false,
            implementation_address: None,
            proxy_partial: None,
            license: Some("MIT".to_string()),
            constructor_arguments: None,
        }
    }

    fn config() -> AnalyzerConfig {
        AnalyzerConfig {
            api_key: Some("sk".to_string()),
            selected_model: "openai/gpt-4o".to_string(),
            language: "ja".to_string(),
            super_prompt: false,
        }
    }

    #[test]
    fn test_filters_interfaces_and_vendored_code() {
        let b = bundle(vec![
            SourceFile::new("src/Vault.sol", "contract Vault {}"),
            SourceFile::new("src/IVault.sol", "interface IVault {}"),
            SourceFile::new("@openzeppelin/contracts/token/ERC20.sol", "contract ERC20 {}"),
        ]);
        let request = PromptBuilder::new(10_000).build(&b, &config());

        assert_eq!(request.included_paths, vec!["src/Vault.sol".to_string()]);
        assert_eq!(request.omitted_paths.len(), 2);
        assert!(request.prompt.contains("// File: src/Vault.sol"));
        assert!(!request.prompt.contains("// File: src/IVault.sol"));
    }

    #[test]
    fn test_budget_counts_utf8_bytes() {
        let b = bundle(vec![
            SourceFile::new("A.sol", "contract A {}"),
            SourceFile::new("B.sol", "contract B { string s = \"ééééé\"; }"),
        ]);
        // A's section is 30 bytes; B's is 51 chars but 56 bytes
        let request = PromptBuilder::new(81).build(&b, &config());
        assert_eq!(request.included_paths, vec!["A.sol".to_string()]);
        assert_eq!(request.omitted_paths, vec!["B.sol".to_string()]);

        let request = PromptBuilder::new(86).build(&b, &config());
        assert_eq!(request.included_paths.len(), 2);
    }

    #[test]
    fn test_keeps_everything_when_all_filtered() {
        let b = bundle(vec![SourceFile::new("IToken.sol", "interface IToken {}")]);
        let request = PromptBuilder::new(10_000).build(&b, &config());
        assert_eq!(request.included_paths, vec!["IToken.sol".to_string()]);
        assert!(request.omitted_paths.is_empty());
    }

    #[test]
    fn test_interface_detection() {
        assert!(is_interface_only(&SourceFile::new("a.sol", "pragma solidity ^0.8.0;\ninterface A {}")));
        assert!(!is_interface_only(&SourceFile::new("a.sol", "interface A {}\ncontract B is A {}")));
        assert!(!is_interface_only(&SourceFile::new("a.sol", "struct S { uint x; }")));
    }

    #[test]
    fn test_budget_omits_files_that_do_not_fit() {
        let b = bundle(vec![
            SourceFile::new("A.sol", "contract A {}"),
            SourceFile::new("B.sol", &"x".repeat(500)),
        ]);
        let request = PromptBuilder::new(100).build(&b, &config());
        assert_eq!(request.included_paths, vec!["A.sol".to_string()]);
        assert_eq!(request.omitted_paths, vec!["B.sol".to_string()]);
        assert!(request.prompt.contains("Files not included: B.sol"));
    }

    #[test]
    fn test_oversized_first_file_is_truncated() {
        let b = bundle(vec![SourceFile::new("Big.sol", &format!("contract Big {{{}}}", "é".repeat(400)))]);
        let request = PromptBuilder::new(200).build(&b, &config());
        assert_eq!(request.included_paths, vec!["Big.sol".to_string()]);
        assert!(request.prompt.contains("truncated to fit"));
    }

    #[test]
    fn test_implementation_files_come_first() {
        let b = bundle(vec![
            SourceFile::new("Proxy.sol", "contract Proxy {}").with_role(SourceRole::Proxy),
            SourceFile::new("Logic.sol", "contract Logic {}").with_role(SourceRole::Implementation),
        ]);
        let request = PromptBuilder::new(10_000).build(&b, &config());
        assert_eq!(request.included_paths[0], "implementation/Logic.sol");
    }

    #[test]
    fn test_language_and_super_prompt() {
        let b = bundle(vec![SourceFile::new("Vault.sol", "contract Vault {}")]);
        let plain = PromptBuilder::new(10_000).build(&b, &config());
        assert!(plain.prompt.ends_with("Write the entire report in Japanese."));
        assert!(!plain.prompt.contains("Deep analysis mode"));

        let mut cfg = config();
        cfg.super_prompt = true;
        let enhanced = PromptBuilder::new(10_000).build(&b, &cfg);
        assert!(enhanced.prompt.starts_with("## Deep analysis mode"));
        assert!(enhanced.super_prompt);
    }
}
