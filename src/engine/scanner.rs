//! Autonomous multi-network scanner.
//!
//! Owns the background loop: every interval it walks each configured
//! network and monitored pair, asks that network's source for an
//! opportunity, records profitable ones in a bounded history and, in
//! autonomous mode, hands them to the network's execution gate.
//!
//! Every public method is safe to call while the loop is running. Locks are
//! `parking_lot` and never held across an `.await`.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::audit::{AuditEvent, AuditSink};
use crate::engine::accountant::{CycleReport, ScanEvent, ScanStats};
use crate::engine::executor::{EngineStats, ExecutionEngine};
use crate::engine::history::RingBuffer;
use crate::engine::stats::StatsCounters;
use crate::error::{panic_message, ConfigError};
use crate::policy::{PolicySnapshot, PolicyUpdate, SharedPolicy};
use crate::sources::OpportunitySource;
use crate::strategy::template::template_strategy;
use crate::strategy::StrategyGenerator;
use crate::types::{ApprovalRecord, Opportunity, TokenPair};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct ScannerSettings {
    /// Capacity of the opportunity history ring.
    pub history_capacity: NonZeroUsize,
    /// Sleep after a loop-level failure before the next iteration.
    pub error_backoff: Duration,
    /// How long `stop()` waits for the loop to exit.
    pub stop_timeout: Duration,
    /// Upper bound on a single discovery call.
    pub discovery_timeout: Duration,
    /// Upper bound on strategy generation outside autonomous mode.
    pub strategy_timeout: Duration,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            history_capacity: NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN),
            error_backoff: Duration::from_secs(10),
            stop_timeout: Duration::from_secs(5),
            discovery_timeout: Duration::from_secs(30),
            strategy_timeout: Duration::from_secs(30),
        }
    }
}

/// Per-network collaborators.
pub struct NetworkRuntime {
    pub source: Arc<dyn OpportunitySource>,
    pub engine: Arc<ExecutionEngine>,
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct NetworkStatus {
    pub name: String,
    /// `None` when the network is configured but has no runtime.
    pub source: Option<String>,
    pub execution_backend: bool,
    pub wallet: Option<String>,
    pub pending_approvals: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScannerStatus {
    pub running: bool,
    pub autonomous_mode: bool,
    pub last_scan: Option<DateTime<Utc>>,
    pub scan_count: u64,
    pub stats: ScanStats,
    pub networks: Vec<NetworkStatus>,
    pub monitored_pairs: usize,
    pub enabled_dexes: Vec<String>,
    pub policy: PolicySnapshot,
    pub opportunities_in_history: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregatedExecutionStats {
    #[serde(flatten)]
    pub totals: StatsCounters,
    pub success_rate: f64,
    pub pending_approvals: usize,
    pub by_network: BTreeMap<String, EngineStats>,
}

/// A pending approval qualified by the network that owns it.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkApproval {
    pub network: String,
    #[serde(flatten)]
    pub record: ApprovalRecord,
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

struct LoopTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct AutonomousScanner {
    policy: SharedPolicy,
    settings: ScannerSettings,
    networks: HashMap<String, NetworkRuntime>,
    strategist: Arc<dyn StrategyGenerator>,
    audit: Arc<dyn AuditSink>,
    history: Mutex<RingBuffer<Arc<Opportunity>>>,
    stats: Mutex<ScanStats>,
    task: Mutex<Option<LoopTask>>,
}

/// Policy values read once per iteration.
struct CycleInputs {
    networks: Vec<String>,
    pairs: Vec<TokenPair>,
    skipped_pairs: usize,
    dexes: Vec<String>,
    autonomous: bool,
}

impl AutonomousScanner {
    pub fn new(
        policy: SharedPolicy,
        settings: ScannerSettings,
        networks: HashMap<String, NetworkRuntime>,
        strategist: Arc<dyn StrategyGenerator>,
        audit: Arc<dyn AuditSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            policy,
            settings,
            networks,
            strategist,
            audit,
            history: Mutex::new(RingBuffer::new(settings.history_capacity)),
            stats: Mutex::new(ScanStats::default()),
            task: Mutex::new(None),
        })
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Spawn the scan loop. Returns `false` if it is already running.
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            debug!("Scanner already running");
            return false;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(self).run_loop(token.clone()));
        *task = Some(LoopTask { token, handle });
        true
    }

    /// Signal the loop and wait (bounded) for it to exit. Returns `false` if
    /// it was not running.
    pub async fn stop(&self) -> bool {
        let Some(LoopTask { token, mut handle }) = self.task.lock().take() else {
            return false;
        };
        token.cancel();

        match tokio::time::timeout(self.settings.stop_timeout, &mut handle).await {
            Ok(Ok(())) => info!("Scanner stopped"),
            Ok(Err(e)) => warn!(error = %e, "Scanner task ended abnormally"),
            Err(_) => {
                warn!(
                    timeout_secs = self.settings.stop_timeout.as_secs(),
                    "Scanner did not stop in time, aborting task"
                );
                handle.abort();
            }
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    async fn run_loop(self: Arc<Self>, token: CancellationToken) {
        info!(networks = self.networks.len(), "Autonomous scanner started");

        while !token.is_cancelled() {
            let cycle = AssertUnwindSafe(self.scan_cycle(&token)).catch_unwind().await;
            let delay = match cycle {
                Ok(report) => {
                    report.log();
                    Duration::from_secs(self.policy.read().scan_interval_secs)
                }
                Err(panic) => {
                    self.stats.lock().apply(&ScanEvent::Error);
                    error!(
                        error = %panic_message(panic.as_ref()),
                        backoff_secs = self.settings.error_backoff.as_secs(),
                        "Scan iteration failed"
                    );
                    self.settings.error_backoff
                }
            };

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Autonomous scanner loop exited");
    }

    /// Run a single iteration outside the background loop.
    pub async fn scan_once(&self) -> CycleReport {
        self.scan_cycle(&CancellationToken::new()).await
    }

    // -- Iteration ----------------------------------------------------------

    fn cycle_inputs(&self) -> CycleInputs {
        let policy = self.policy.read();
        let (pairs, skipped): (Vec<TokenPair>, Vec<TokenPair>) = policy
            .monitored_pairs
            .iter()
            .cloned()
            .partition(|p| !policy.pair_blacklisted(p));
        CycleInputs {
            networks: policy.networks.clone(),
            pairs,
            skipped_pairs: skipped.len(),
            dexes: policy.enabled_dexes.clone(),
            autonomous: policy.autonomous_mode,
        }
    }

    fn note(&self, report: &mut CycleReport, event: ScanEvent<'_>) {
        self.stats.lock().apply(&event);
        report.apply(&event);
    }

    async fn scan_cycle(&self, token: &CancellationToken) -> CycleReport {
        let scan_number = self.stats.lock().begin_scan();
        let mut report = CycleReport::new(scan_number, Utc::now());
        let inputs = self.cycle_inputs();
        debug!(scan = scan_number, networks = inputs.networks.len(), "Scan cycle started");

        'networks: for network in &inputs.networks {
            if token.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let Some(runtime) = self.networks.get(network) else {
                warn!(network = %network, "No source configured for network, skipping");
                continue;
            };

            self.audit.record(&AuditEvent::ScanStarted {
                network: network.clone(),
                pairs: inputs.pairs.len(),
            });
            self.note(&mut report, ScanEvent::NetworkScanned);
            for _ in 0..inputs.skipped_pairs {
                self.note(&mut report, ScanEvent::PairSkipped);
            }

            for pair in &inputs.pairs {
                if token.is_cancelled() {
                    report.cancelled = true;
                    break 'networks;
                }
                let scanned =
                    AssertUnwindSafe(self.scan_pair(network, runtime, pair, &inputs, &mut report))
                        .catch_unwind()
                        .await;
                if let Err(panic) = scanned {
                    error!(
                        network = %network,
                        pair = %pair,
                        error = %panic_message(panic.as_ref()),
                        "Pair scan panicked"
                    );
                    self.note(&mut report, ScanEvent::Error);
                }
            }
        }

        let finished = Utc::now();
        report.finish(finished);
        self.stats.lock().finish_scan(finished);
        report
    }

    async fn scan_pair(
        &self,
        network: &str,
        runtime: &NetworkRuntime,
        pair: &TokenPair,
        inputs: &CycleInputs,
        report: &mut CycleReport,
    ) {
        let discovered = tokio::time::timeout(
            self.settings.discovery_timeout,
            runtime.source.discover(pair, &inputs.dexes),
        )
        .await;

        let opportunity = match discovered {
            Ok(Ok(opportunity)) => opportunity,
            Ok(Err(e)) => {
                warn!(network, pair = %pair, source = runtime.source.name(), error = %e, "Discovery failed");
                self.note(report, ScanEvent::Error);
                return;
            }
            Err(_) => {
                warn!(
                    network,
                    pair = %pair,
                    timeout_secs = self.settings.discovery_timeout.as_secs(),
                    "Discovery timed out"
                );
                self.note(report, ScanEvent::Error);
                return;
            }
        };
        self.note(report, ScanEvent::PairScanned);

        if !opportunity.profitable {
            debug!(network, pair = %pair, "No profitable opportunity");
            return;
        }

        info!(
            network,
            kind = opportunity.kind_name(),
            profit = format!("${:.2}", opportunity.estimated_profit_usd),
            "Opportunity found"
        );
        self.note(report, ScanEvent::Found);
        self.audit.record(&AuditEvent::OpportunityFound {
            network: network.to_string(),
            kind: opportunity.kind_name().to_string(),
            estimated_profit_usd: opportunity.estimated_profit_usd,
        });

        let opportunity = if inputs.autonomous || opportunity.strategy.is_some() {
            opportunity
        } else {
            self.attach_strategy(network, opportunity).await
        };
        let opportunity = Arc::new(opportunity.tagged(network, Utc::now()));
        self.history.lock().push(Arc::clone(&opportunity));

        if !inputs.autonomous {
            return;
        }

        let profit = opportunity.estimated_profit_usd;
        let outcome = runtime.engine.execute_opportunity(opportunity);
        if !outcome.accepted() {
            debug!(network, outcome = ?outcome, "Opportunity not accepted");
        }
        self.note(
            report,
            ScanEvent::Outcome {
                outcome: &outcome,
                profit_usd: profit,
            },
        );
    }

    /// Ask the strategy generator for a plan, falling back to the template on
    /// error or timeout.
    async fn attach_strategy(&self, network: &str, opportunity: Opportunity) -> Opportunity {
        let generated = tokio::time::timeout(
            self.settings.strategy_timeout,
            self.strategist.generate(&opportunity),
        )
        .await;

        let strategy = match generated {
            Ok(Ok(strategy)) => strategy,
            Ok(Err(e)) => {
                warn!(network, generator = self.strategist.name(), error = %e, "Strategy generation failed, using template");
                template_strategy(&opportunity)
            }
            Err(_) => {
                warn!(network, generator = self.strategist.name(), "Strategy generation timed out, using template");
                template_strategy(&opportunity)
            }
        };
        opportunity.with_strategy(strategy)
    }

    // -- Queries ------------------------------------------------------------

    pub fn get_status(&self) -> ScannerStatus {
        let stats = self.stats.lock().clone();
        let (network_names, monitored_pairs, enabled_dexes, autonomous_mode, snapshot) = {
            let policy = self.policy.read();
            (
                policy.networks.clone(),
                policy.monitored_pairs.len(),
                policy.enabled_dexes.clone(),
                policy.autonomous_mode,
                policy.snapshot(),
            )
        };

        let networks = network_names
            .into_iter()
            .map(|name| match self.networks.get(&name) {
                Some(rt) => NetworkStatus {
                    source: Some(rt.source.name().to_string()),
                    execution_backend: rt.engine.has_backend(),
                    wallet: rt.engine.wallet().map(String::from),
                    pending_approvals: rt.engine.get_stats().pending_approvals,
                    name,
                },
                None => NetworkStatus {
                    name,
                    source: None,
                    execution_backend: false,
                    wallet: None,
                    pending_approvals: 0,
                },
            })
            .collect();

        ScannerStatus {
            running: self.is_running(),
            autonomous_mode,
            last_scan: stats.last_scan,
            scan_count: stats.completed_scans,
            stats,
            networks,
            monitored_pairs,
            enabled_dexes,
            policy: snapshot,
            opportunities_in_history: self.history.lock().len(),
        }
    }

    /// Up to `limit` recent opportunities, newest first.
    pub fn get_opportunities(&self, limit: usize) -> Vec<Arc<Opportunity>> {
        self.history.lock().recent(limit).cloned().collect()
    }

    pub fn get_execution_stats(&self) -> AggregatedExecutionStats {
        let mut totals = StatsCounters::new();
        let mut pending_approvals = 0;
        let mut by_network = BTreeMap::new();

        for (name, rt) in &self.networks {
            let stats = rt.engine.get_stats();
            totals.absorb(&stats.counters);
            pending_approvals += stats.pending_approvals;
            by_network.insert(name.clone(), stats);
        }

        AggregatedExecutionStats {
            success_rate: totals.success_rate(),
            totals,
            pending_approvals,
            by_network,
        }
    }

    /// Pending approvals across all networks, grouped by network name.
    pub fn get_pending_approvals(&self) -> Vec<NetworkApproval> {
        let mut names: Vec<&String> = self.networks.keys().collect();
        names.sort();
        names
            .into_iter()
            .flat_map(|name| {
                self.networks[name]
                    .engine
                    .get_pending_approvals()
                    .into_iter()
                    .map(move |record| NetworkApproval {
                        network: name.clone(),
                        record,
                    })
            })
            .collect()
    }

    pub fn approve_transaction(&self, network: &str, approval_id: &str) -> bool {
        match self.networks.get(network) {
            Some(rt) => rt.engine.approve_transaction(approval_id),
            None => {
                warn!(network, approval_id, "Approve for unknown network");
                false
            }
        }
    }

    pub fn reject_transaction(&self, network: &str, approval_id: &str) -> bool {
        match self.networks.get(network) {
            Some(rt) => rt.engine.reject_transaction(approval_id),
            None => {
                warn!(network, approval_id, "Reject for unknown network");
                false
            }
        }
    }

    /// Apply a runtime policy update. Invalid updates leave the policy as it was.
    pub fn update_config(&self, update: PolicyUpdate) -> Result<(), ConfigError> {
        self.policy.write().apply(&update)?;

        let fields: Vec<String> = update.fields().into_iter().map(String::from).collect();
        info!(fields = ?fields, "Policy updated");
        self.audit.record(&AuditEvent::PolicyUpdated { fields });
        Ok(())
    }

    pub fn engine(&self, network: &str) -> Option<&Arc<ExecutionEngine>> {
        self.networks.get(network).map(|rt| &rt.engine)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
