//! ARBITER: autonomous multi-network opportunity scanner
//!
//! Entry point. Loads configuration, initialises structured logging, wires
//! one source and execution gate per network into the scanner, starts the
//! scan loop and the API server, and stops cleanly on Ctrl+C.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use arbiter::api;
use arbiter::audit::{AuditSink, FanoutAudit, JsonlAudit, TracingAudit};
use arbiter::config::AppConfig;
use arbiter::engine::{AutonomousScanner, ExecutionEngine, NetworkRuntime};
use arbiter::execution::{TransactionBuilder, WalletBatchBuilder};
use arbiter::sources::{OpportunitySource, ReplaySource};
use arbiter::strategy::TemplateStrategist;

const BANNER: &str = r#"
    _    ____  ____ ___ _____ _____ ____
   / \  |  _ \| __ )_ _|_   _| ____|  _ \
  / _ \ | |_) |  _ \| |  | | |  _| | |_) |
 / ___ \|  _ <| |_) | |  | | | |___|  _ <
/_/   \_\_| \_\____/___| |_| |_____|_| \_\

  Autonomous multi-network opportunity scanner
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("ARBITER_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let cfg = AppConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    init_logging();

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        config = %config_path,
        "ARBITER starting up"
    );

    // -- Audit sinks -----------------------------------------------------

    let mut audit = FanoutAudit::new(vec![Arc::new(TracingAudit)]);
    if let Some(path) = &cfg.audit.jsonl_path {
        info!(path = %path.display(), "Writing audit trail");
        audit.push(Arc::new(JsonlAudit::new(path)));
    }
    let audit: Arc<dyn AuditSink> = Arc::new(audit);

    // -- Policy ----------------------------------------------------------

    let policy = cfg.policy()?;
    info!(
        min_profit = format!("${:.2}", policy.min_profit_usd),
        max_gas_gwei = %policy.max_gas_price_gwei,
        interval_secs = policy.scan_interval_secs,
        networks = ?policy.networks,
        pairs = policy.monitored_pairs.len(),
        autonomous = policy.autonomous_mode,
        manual_approval = policy.require_manual_approval,
        "Policy loaded"
    );
    let networks = policy.networks.clone();
    let policy = policy.into_shared();

    // -- Per-network runtimes --------------------------------------------

    let mut sources = match &cfg.sources.replay_file {
        Some(path) => ReplaySource::load(path)?,
        None => {
            warn!("No opportunity source configured, scanner will idle");
            HashMap::new()
        }
    };

    let wallet = cfg.wallet_address();
    if wallet.is_none() {
        warn!(
            env = %cfg.execution.wallet_address_env,
            "No execution wallet configured, every opportunity will fail the backend check"
        );
    }

    let engine_settings = cfg.engine_settings()?;
    let mut runtimes = HashMap::new();
    for network in &networks {
        let Some(source) = sources.remove(network) else {
            warn!(network = %network, "No fixtures for network, skipping");
            continue;
        };

        let builder: Option<Arc<dyn TransactionBuilder>> = match &wallet {
            Some(wallet) => match WalletBatchBuilder::new(wallet.clone(), network) {
                Ok(builder) => Some(Arc::new(builder)),
                Err(e) => {
                    warn!(network = %network, error = %e, "Execution disabled for network");
                    None
                }
            },
            None => None,
        };

        let engine = Arc::new(ExecutionEngine::new(
            network.clone(),
            Arc::clone(&policy),
            Arc::clone(&audit),
            builder,
            engine_settings,
        ));
        let source: Arc<dyn OpportunitySource> = Arc::new(source);
        info!(network = %network, source = source.name(), backend = engine.has_backend(), "Network ready");
        runtimes.insert(network.clone(), NetworkRuntime { source, engine });
    }

    let scanner = AutonomousScanner::new(
        policy,
        cfg.scanner_settings()?,
        runtimes,
        Arc::new(TemplateStrategist),
        Arc::clone(&audit),
    );

    // -- Run -------------------------------------------------------------

    scanner.start();

    if cfg.api.enabled {
        let state = Arc::clone(&scanner);
        let port = cfg.api.port;
        tokio::spawn(async move {
            if let Err(e) = api::serve(state, port).await {
                error!(error = %e, "API server stopped");
            }
        });
    }

    info!("Scanner running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received.");

    scanner.stop().await;

    let status = scanner.get_status();
    let stats = scanner.get_execution_stats();
    info!(
        scans = status.stats.total_scans,
        found = status.stats.opportunities_found,
        executed = status.stats.opportunities_executed,
        errors = status.stats.errors,
        pending = stats.pending_approvals,
        profit = format!("${:.2}", stats.totals.total_profit_usd()),
        "ARBITER shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("arbiter=info"));

    let json_logging = std::env::var("ARBITER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
