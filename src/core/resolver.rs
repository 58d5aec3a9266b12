//! Contract Resolver - address + chain → `ContractBundle`
//!
//! Chain Registry → Explorer Client → Source Normalizer → Proxy Resolver →
//! ABI Fetcher. Independent calls are issued in pairs:
//! - primary source ‖ primary ABI
//! - implementation source ‖ implementation ABI
//!
//! Both calls of a pair complete before the bundle exists. A bundle is either
//! complete or an error; the only partial outcome is the explicit
//! `proxy_partial` advisory.

use alloy_primitives::Address;
use std::str::FromStr;
use std::time::Instant;
use tracing::info;

use super::abi::{empty_abi, AbiFetcher};
use super::normalizer::compiler_settings;
use super::proxy::{reported_implementation, ProxyResolver};
use crate::models::{AppError, AppResult, ChainRegistry, ContractBundle, ExplorerContext};
use crate::providers::ExplorerClient;

/// Validate a 20-byte hex address
pub fn validate_address(address: &str) -> AppResult<String> {
    let trimmed = address.trim();
    Address::from_str(trimmed)
        .map(|_| trimmed.to_string())
        .map_err(|_| AppError::invalid_address(format!("Invalid contract address: {}", address)))
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub struct ContractResolver {
    explorer: ExplorerClient,
    registry: ChainRegistry,
}

impl ContractResolver {
    pub fn new(registry: ChainRegistry) -> AppResult<Self> {
        Ok(Self::with_client(ExplorerClient::new()?, registry))
    }

    pub fn with_client(explorer: ExplorerClient, registry: ChainRegistry) -> Self {
        Self { explorer, registry }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    /// Resolve `address` on the chain named by `chain`
    pub async fn resolve(&self, address: &str, chain: &str) -> AppResult<ContractBundle> {
        let address = validate_address(address)?;
        let ctx = self.registry.resolve(chain)?;
        self.resolve_with_context(&address, &ctx).await
    }

    /// Resolve against an already-resolved explorer context
    pub async fn resolve_with_context(
        &self,
        address: &str,
        ctx: &ExplorerContext,
    ) -> AppResult<ContractBundle> {
        let start = Instant::now();
        info!("🔍 Resolving {} on {}", address, ctx.chain_name);

        let abi_fetcher = AbiFetcher::new(&self.explorer);
        let (entry, abi) = tokio::join!(
            self.explorer.get_source_code(ctx, address),
            abi_fetcher.fetch(address, ctx)
        );
        let entry = entry?;

        let proxy_resolver = ProxyResolver::new(&self.explorer);
        let (resolution, implementation_abi) = match reported_implementation(&entry) {
            Some(implementation) => tokio::join!(
                proxy_resolver.resolve(&entry, ctx),
                abi_fetcher.fetch(&implementation, ctx)
            ),
            None => (proxy_resolver.resolve(&entry, ctx).await, empty_abi()),
        };

        let bundle = ContractBundle {
            address: address.to_string(),
            chain_id: ctx.chain_id,
            files: resolution.files,
            settings: compiler_settings(&entry),
            contract_name: entry.contract_name.clone(),
            compiler_version: entry.compiler_version.clone(),
            abi,
            implementation_abi,
            is_proxy: resolution.is_proxy,
            implementation_address: resolution.implementation_address,
            proxy_partial: resolution.partial,
            license: non_empty(&entry.license_type),
            constructor_arguments: non_empty(&entry.constructor_arguments),
        };

        info!(
            "✅ Resolved {} ({} files, proxy: {}) in {}ms",
            bundle.contract_name,
            bundle.files.len(),
            bundle.is_proxy,
            start.elapsed().as_millis()
        );

        Ok(bundle)
    }
}
