//! Ruster Audit CLI
//!
//! Usage:
//!   ruster_audit <address> [chain] [--analyze] [--out <file>]
//!
//! Resolves the verified source of `address` (default chain: ethereum),
//! prints the bundle summary and, with `--analyze`, runs the AI audit and
//! prints (or writes) the Markdown report. Ctrl+C cancels a running audit.
//!
//! Environment:
//!   ETHERSCAN_API_KEY / <CHAIN>SCAN_API_KEY - explorer keys
//!   AI_API_KEY, AI_MODEL, AI_LANGUAGE, AI_SUPER_PROMPT - analysis
//!   RUST_LOG - Log filter (default: info)

use clap::Parser;
use eyre::Result;
use ruster_audit::models::{ChainRegistry, ConfigStore, EnvConfigStore, OrchestratorSettings};
use ruster_audit::utils::constants::DEFAULT_CHAIN;
use ruster_audit::{ContractBundle, ContractResolver, Orchestrator, TelemetryCollector};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    name = "ruster_audit",
    version,
    about = "Resolve verified contract source and run an AI security audit"
)]
struct Cli {
    /// Contract address (0x-prefixed, 20 bytes)
    address: String,

    /// Chain name or numeric chain id
    #[arg(default_value = DEFAULT_CHAIN)]
    chain: String,

    /// Run the AI audit after resolving
    #[arg(short, long)]
    analyze: bool,

    /// Write the Markdown report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    out: Option<PathBuf>,
}

fn print_bundle(bundle: &ContractBundle) {
    println!();
    println!("📄 {} on chain {}", bundle.contract_name, bundle.chain_id);
    println!("   Address:   {}", bundle.address);
    println!("   Compiler:  {}", bundle.compiler_version);
    println!(
        "   Optimizer: {} ({} runs)",
        bundle.settings.optimizer.enabled, bundle.settings.optimizer.runs
    );
    if let Some(implementation) = &bundle.implementation_address {
        println!("   Proxy →    {}", implementation);
    }
    if let Some(partial) = &bundle.proxy_partial {
        println!("   ⚠️  Implementation source unavailable: {}", partial.reason);
    }
    println!(
        "   Files ({}, {} bytes):",
        bundle.files.len(),
        bundle.total_source_bytes()
    );
    for file in &bundle.files {
        println!("     - {} ({} bytes)", file.path, file.content.len());
    }
    println!(
        "   ABI entries: {} (implementation: {})",
        bundle.abi.as_array().map_or(0, Vec::len),
        bundle.implementation_abi.as_array().map_or(0, Vec::len)
    );
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Cli::parse();
    let telemetry = Arc::new(TelemetryCollector::new());

    let resolver = ContractResolver::new(ChainRegistry::new())?;
    let bundle = resolver.resolve(&args.address, &args.chain).await?;
    print_bundle(&bundle);

    if !args.analyze {
        return Ok(());
    }

    let config = EnvConfigStore.load();
    info!(
        "🔑 Model: {}, language: {}, key: {}",
        config.selected_model,
        config.language,
        config.masked_api_key()
    );
    let orchestrator = Orchestrator::with_telemetry(OrchestratorSettings::from_env(), telemetry.clone())?;

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Ctrl+C received, cancelling analysis...");
            ctrl_c_token.cancel();
        }
    });

    match orchestrator.analyze(&bundle, &config, cancel).await {
        Ok(report) => match args.out {
            Some(path) => {
                std::fs::write(&path, &report.markdown)?;
                println!("✅ Report written to {} ({} attempt(s))", path.display(), report.attempts);
            }
            None => println!("{}", report.markdown),
        },
        Err(e) if e.is_cancelled() => println!("🛑 Analysis cancelled"),
        Err(e) => {
            let stats = telemetry.get_stats();
            eprintln!("❌ {} after {} attempt(s)", e, stats.inference_attempts);
            return Err(e.into());
        }
    }

    Ok(())
}
