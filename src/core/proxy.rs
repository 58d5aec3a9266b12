//! Proxy Resolver
//!
//! Proxy status comes from the explorer's own `Implementation` field; the
//! explorers run their own EIP-1967 / UUPS / transparent / beacon slot
//! detection, so no storage slots are read here.
//!
//! When proxied, the proxy's files are tagged `proxy/` and the
//! implementation's files `implementation/`. Prefixing is unconditional so
//! the two path namespaces are always disjoint, even for identical paths.

use alloy_primitives::Address;
use std::str::FromStr;
use tracing::{info, warn};

use super::normalizer::normalize_source;
use crate::models::{
    ExplorerContext, ExplorerSourceEntry, ProxyPartial, SourceFile, SourceRole,
};
use crate::providers::ExplorerClient;

/// Implementation address when the explorer reports a real one
pub fn reported_implementation(entry: &ExplorerSourceEntry) -> Option<String> {
    let raw = entry.implementation.trim();
    if raw.is_empty() {
        return None;
    }

    match Address::from_str(raw) {
        Ok(address) if address != Address::ZERO => Some(raw.to_string()),
        Ok(_) => None,
        Err(e) => {
            warn!("⚠️ Ignoring malformed Implementation field {:?}: {}", raw, e);
            None
        }
    }
}

/// Tag every file with a role
pub fn tag_files(files: Vec<SourceFile>, role: SourceRole) -> Vec<SourceFile> {
    files.into_iter().map(|f| f.with_role(role)).collect()
}

/// Outcome of proxy resolution for one primary contract
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResolution {
    pub is_proxy: bool,
    /// Proxy files first, then implementation files
    pub files: Vec<SourceFile>,
    pub implementation_address: Option<String>,
    /// Implementation source could not be resolved
    pub partial: Option<ProxyPartial>,
}

/// Splits proxy and implementation source into one role-tagged file set
pub struct ProxyResolver<'a> {
    explorer: &'a ExplorerClient,
}

impl<'a> ProxyResolver<'a> {
    pub fn new(explorer: &'a ExplorerClient) -> Self {
        Self { explorer }
    }

    /// Resolve the file set for an already-fetched primary source entry
    pub async fn resolve(&self, entry: &ExplorerSourceEntry, ctx: &ExplorerContext) -> ProxyResolution {
        let own_files = normalize_source(&entry.source_code, &entry.contract_name);

        let Some(implementation) = reported_implementation(entry) else {
            return ProxyResolution {
                is_proxy: false,
                files: tag_files(own_files, SourceRole::Plain),
                implementation_address: None,
                partial: None,
            };
        };

        info!("🔀 {} is a proxy, implementation at {}", entry.contract_name, implementation);
        let mut files = tag_files(own_files, SourceRole::Proxy);

        let partial = match self.explorer.get_source_code(ctx, &implementation).await {
            Ok(impl_entry) => {
                let impl_files = normalize_source(&impl_entry.source_code, &impl_entry.contract_name);
                files.extend(tag_files(impl_files, SourceRole::Implementation));
                None
            }
            Err(e) => {
                warn!("⚠️ Implementation {} unresolved, keeping proxy files only: {}", implementation, e);
                Some(ProxyPartial {
                    implementation_address: implementation.clone(),
                    reason: e.to_string(),
                })
            }
        };

        ProxyResolution {
            is_proxy: true,
            files,
            implementation_address: Some(implementation),
            partial,
        }
    }
}
