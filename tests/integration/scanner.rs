//! Full-pipeline scanner tests.
//!
//! Each test wires real execution engines and batch builders behind the
//! scanner, with `MockSource` standing in for on-chain discovery.

use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arbiter::audit::{AuditEvent, AuditSink, FanoutAudit, JsonlAudit, MemoryAudit};
use arbiter::engine::executor::EngineSettings;
use arbiter::engine::{AutonomousScanner, ExecutionEngine, NetworkRuntime, ScannerSettings};
use arbiter::execution::{TransactionBuilder, WalletBatchBuilder};
use arbiter::policy::{Policy, PolicyUpdate};
use arbiter::sources::OpportunitySource;
use arbiter::strategy::TemplateStrategist;
use arbiter::types::{ExecutionStatus, TokenPair};

use crate::mock_source::{arbitrage, Fault, MockSource, DAI, USDC, USDT, WALLET, WETH};

struct Pipeline {
    scanner: Arc<AutonomousScanner>,
    audit: Arc<MemoryAudit>,
}

fn fast_settings() -> ScannerSettings {
    ScannerSettings {
        history_capacity: NonZeroUsize::new(100).unwrap(),
        error_backoff: Duration::from_millis(50),
        stop_timeout: Duration::from_secs(2),
        discovery_timeout: Duration::from_secs(2),
        strategy_timeout: Duration::from_secs(2),
    }
}

fn pipeline(
    sources: Vec<Arc<MockSource>>,
    autonomous: bool,
    manual: bool,
    settings: ScannerSettings,
    extra_sink: Option<Arc<dyn AuditSink>>,
) -> Pipeline {
    let mut policy = Policy::default();
    policy.networks = sources.iter().map(|s| s.network().to_string()).collect();
    policy.monitored_pairs = vec![
        TokenPair::new(WETH, USDC),
        TokenPair::new(WETH, USDT),
        TokenPair::new(WETH, DAI),
    ];
    policy.autonomous_mode = autonomous;
    policy.require_manual_approval = manual;
    policy.scan_interval_secs = 1;
    let policy = policy.into_shared();

    let memory = Arc::new(MemoryAudit::new());
    let mut fanout = FanoutAudit::new(vec![memory.clone()]);
    if let Some(sink) = extra_sink {
        fanout.push(sink);
    }
    let audit: Arc<dyn AuditSink> = Arc::new(fanout);

    let networks: HashMap<String, NetworkRuntime> = sources
        .into_iter()
        .map(|source| {
            let network = source.network().to_string();
            let builder: Arc<dyn TransactionBuilder> =
                Arc::new(WalletBatchBuilder::new(WALLET, &network).unwrap());
            let engine = Arc::new(ExecutionEngine::new(
                network.clone(),
                Arc::clone(&policy),
                Arc::clone(&audit),
                Some(builder),
                EngineSettings::default(),
            ));
            (network, NetworkRuntime { source, engine })
        })
        .collect();

    let scanner = AutonomousScanner::new(
        policy,
        settings,
        networks,
        Arc::new(TemplateStrategist),
        audit,
    );
    Pipeline {
        scanner,
        audit: memory,
    }
}

// ---------------------------------------------------------------------------
// Pipeline behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_autonomous_pipeline_gates_each_network() {
    let ethereum = Arc::new(MockSource::new("ethereum").with(arbitrage(USDC, dec!(120), dec!(30))));
    let polygon = Arc::new(MockSource::new("polygon").with(arbitrage(USDT, dec!(30), dec!(30))));
    let arbitrum = Arc::new(MockSource::new("arbitrum").with(arbitrage(DAI, dec!(200), dec!(150))));

    let p = pipeline(
        vec![ethereum.clone(), polygon.clone(), arbitrum.clone()],
        true,
        false,
        fast_settings(),
        None,
    );
    let report = p.scanner.scan_once().await;

    assert_eq!(report.networks_scanned, 3);
    assert_eq!(report.pairs_scanned, 9);
    assert_eq!(report.opportunities_found, 3);
    assert_eq!(report.executed, 1);
    assert_eq!(report.rejected, 2);
    assert_eq!(report.profit_usd, dec!(120));
    assert_eq!(ethereum.calls() + polygon.calls() + arbitrum.calls(), 9);

    let stats = p.scanner.get_execution_stats();
    assert_eq!(stats.totals.total_executions(), 1);
    assert_eq!(stats.by_network["ethereum"].counters.successful(), 1);
    assert_eq!(stats.by_network["polygon"].counters.total_executions(), 0);

    let history = p.scanner.engine("ethereum").unwrap().get_execution_history(5);
    assert_eq!(history[0].status, ExecutionStatus::Success);
    assert_eq!(history[0].network, "ethereum");

    let reasons: Vec<String> = p
        .audit
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AuditEvent::SafetyCheckFailed { network, reason, .. } => Some(format!("{network}: {reason}")),
            _ => None,
        })
        .collect();
    assert_eq!(reasons.len(), 2);
    assert!(reasons.iter().any(|r| r.starts_with("polygon") && r.contains("below minimum")));
    assert!(reasons.iter().any(|r| r.starts_with("arbitrum") && r.contains("exceeds maximum")));
}

#[tokio::test]
async fn test_opportunities_are_tagged_and_newest_first() {
    let ethereum = Arc::new(
        MockSource::new("ethereum")
            .with(arbitrage(USDC, dec!(60), dec!(20)))
            .with(arbitrage(DAI, dec!(90), dec!(20))),
    );
    let p = pipeline(vec![ethereum], false, true, fast_settings(), None);
    p.scanner.scan_once().await;

    let opps = p.scanner.get_opportunities(10);
    assert_eq!(opps.len(), 2);
    // DAI is scanned after USDC, so it is the newest entry.
    assert_eq!(opps[0].estimated_profit_usd, dec!(90));
    assert!(opps.iter().all(|o| o.network.as_deref() == Some("ethereum")));
    assert!(opps.iter().all(|o| o.discovered_at.is_some()));
    assert!(opps.iter().all(|o| o.strategy.is_some()));
    assert_eq!(p.scanner.get_opportunities(1).len(), 1);
}

#[tokio::test]
async fn test_manual_approvals_across_networks() {
    let ethereum = Arc::new(MockSource::new("ethereum").with(arbitrage(USDC, dec!(120), dec!(30))));
    let polygon = Arc::new(MockSource::new("polygon").with(arbitrage(USDT, dec!(80), dec!(30))));
    let p = pipeline(vec![ethereum, polygon], true, true, fast_settings(), None);

    let report = p.scanner.scan_once().await;
    assert_eq!(report.queued, 2);
    assert_eq!(report.executed, 0);

    let pending = p.scanner.get_pending_approvals();
    assert_eq!(pending.len(), 2);
    let eth = pending.iter().find(|a| a.network == "ethereum").unwrap();
    let poly = pending.iter().find(|a| a.network == "polygon").unwrap();

    // Ids are scoped to their network.
    assert!(!p.scanner.approve_transaction("polygon", &eth.record.id));

    assert!(p.scanner.approve_transaction("ethereum", &eth.record.id));
    assert!(p.scanner.reject_transaction("polygon", &poly.record.id));
    assert!(!p.scanner.approve_transaction("ethereum", &eth.record.id));
    assert!(!p.scanner.approve_transaction("polygon", &poly.record.id));
    assert!(p.scanner.get_pending_approvals().is_empty());

    let stats = p.scanner.get_execution_stats();
    assert_eq!(stats.totals.total_executions(), 1);
    assert_eq!(stats.totals.total_profit_usd(), dec!(120));
    assert_eq!(stats.pending_approvals, 0);
    // Approval-path executions are not counted as scanner executions.
    assert_eq!(p.scanner.get_status().stats.opportunities_executed, 0);
    assert_eq!(p.scanner.get_status().stats.opportunities_queued, 2);
}

#[tokio::test]
async fn test_runtime_policy_update_applies_to_gate() {
    let ethereum = Arc::new(MockSource::new("ethereum").with(arbitrage(USDC, dec!(120), dec!(30))));
    let p = pipeline(vec![ethereum], true, false, fast_settings(), None);

    p.scanner
        .update_config(PolicyUpdate {
            min_profit_usd: Some(dec!(500)),
            ..Default::default()
        })
        .unwrap();
    let report = p.scanner.scan_once().await;
    assert_eq!(report.rejected, 1);

    p.scanner
        .update_config(PolicyUpdate {
            min_profit_usd: Some(dec!(100)),
            ..Default::default()
        })
        .unwrap();
    let report = p.scanner.scan_once().await;
    assert_eq!(report.executed, 1);
}

#[tokio::test]
async fn test_audit_trail_written_as_jsonl() {
    let mut path = std::env::temp_dir();
    path.push(format!("arbiter_it_{}.jsonl", uuid::Uuid::new_v4()));
    let jsonl: Arc<dyn AuditSink> = Arc::new(JsonlAudit::new(&path));

    let ethereum = Arc::new(MockSource::new("ethereum").with(arbitrage(USDC, dec!(120), dec!(30))));
    let p = pipeline(vec![ethereum], true, false, fast_settings(), Some(jsonl));
    p.scanner.scan_once().await;

    let contents = std::fs::read_to_string(&path).unwrap();
    let events: Vec<serde_json::Value> = contents
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let names: Vec<&str> = events.iter().map(|e| e["event"].as_str().unwrap()).collect();
    assert_eq!(names.first(), Some(&"scan_started"));
    assert!(names.contains(&"opportunity_found"));
    assert!(names.contains(&"transaction_submitted"));
    assert!(names.contains(&"transaction_succeeded"));
    assert!(events.iter().all(|e| e["timestamp"].is_string()));

    let _ = std::fs::remove_file(&path);
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_failing_network_is_isolated() {
    let ethereum = Arc::new(MockSource::new("ethereum").with(arbitrage(USDC, dec!(120), dec!(30))));
    let polygon = Arc::new(MockSource::new("polygon"));
    polygon.set_fault(Fault::Error("rpc unavailable".into()));

    let p = pipeline(vec![polygon.clone(), ethereum], true, false, fast_settings(), None);
    let report = p.scanner.scan_once().await;

    assert_eq!(report.errors, 3);
    assert_eq!(report.executed, 1);
    assert_eq!(polygon.calls(), 3);
    assert_eq!(p.scanner.get_status().stats.errors, 3);

    polygon.clear_fault();
    let report = p.scanner.scan_once().await;
    assert_eq!(report.errors, 0);
    assert_eq!(p.scanner.get_status().stats.errors, 3);
}

#[tokio::test]
async fn test_discovery_timeout_counts_as_error() {
    let ethereum = Arc::new(MockSource::new("ethereum"));
    ethereum.set_fault(Fault::Hang(Duration::from_secs(30)));

    let settings = ScannerSettings {
        discovery_timeout: Duration::from_millis(50),
        ..fast_settings()
    };
    let p = pipeline(vec![ethereum], true, false, settings, None);

    let started = Instant::now();
    let report = p.scanner.scan_once().await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.errors, 3);
    assert_eq!(report.pairs_scanned, 0);
}

#[tokio::test]
async fn test_panicking_network_does_not_block_others() {
    let arbitrum = Arc::new(MockSource::new("arbitrum"));
    arbitrum.set_fault(Fault::Panic);
    let ethereum = Arc::new(MockSource::new("ethereum").with(arbitrage(USDC, dec!(120), dec!(30))));
    let p = pipeline(
        vec![arbitrum.clone(), ethereum.clone()],
        true,
        false,
        fast_settings(),
        None,
    );

    let report = p.scanner.scan_once().await;
    assert_eq!(arbitrum.calls(), 3);
    assert_eq!(ethereum.calls(), 3);
    assert_eq!(report.errors, 3);
    assert_eq!(report.networks_scanned, 2);
    assert_eq!(report.pairs_scanned, 3);
    assert_eq!(report.executed, 1);

    let stats = p.scanner.get_execution_stats();
    assert_eq!(stats.by_network["ethereum"].counters.successful(), 1);
    assert_eq!(stats.by_network["arbitrum"].counters.total_executions(), 0);
}

#[tokio::test]
async fn test_loop_keeps_scanning_through_panics() {
    let arbitrum = Arc::new(MockSource::new("arbitrum"));
    arbitrum.set_fault(Fault::Panic);
    let ethereum = Arc::new(MockSource::new("ethereum").with(arbitrage(USDC, dec!(120), dec!(30))));
    let p = pipeline(
        vec![arbitrum.clone(), ethereum.clone()],
        true,
        false,
        fast_settings(),
        None,
    );

    assert!(p.scanner.start());
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(p.scanner.is_running());
    assert!(ethereum.calls() > 0);
    let status = p.scanner.get_status();
    assert_eq!(status.stats.errors, 3);
    assert_eq!(status.stats.completed_scans, 1);
    assert_eq!(p.scanner.get_execution_stats().totals.successful(), 1);

    arbitrum.clear_fault();
    // Next iteration follows the 1s scan interval.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let status = p.scanner.get_status();
    assert!(status.stats.completed_scans >= 2);
    assert_eq!(status.stats.errors, 3);

    assert!(p.scanner.stop().await);
    assert!(!p.scanner.is_running());
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stop_lets_inflight_pair_finish_then_exits() {
    let ethereum = Arc::new(MockSource::new("ethereum"));
    ethereum.set_fault(Fault::Hang(Duration::from_millis(300)));
    let p = pipeline(vec![ethereum.clone()], true, false, fast_settings(), None);

    assert!(p.scanner.start());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    assert!(p.scanner.stop().await);
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(100), "stopped too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "stop took {elapsed:?}");
    assert_eq!(ethereum.calls(), 1);
    assert!(!p.scanner.is_running());
    assert_eq!(p.scanner.get_status().stats.completed_scans, 1);
}

#[tokio::test]
async fn test_stop_is_bounded_when_loop_hangs() {
    let ethereum = Arc::new(MockSource::new("ethereum"));
    ethereum.set_fault(Fault::Hang(Duration::from_secs(60)));
    let settings = ScannerSettings {
        stop_timeout: Duration::from_millis(200),
        discovery_timeout: Duration::from_secs(120),
        ..fast_settings()
    };
    let p = pipeline(vec![ethereum], true, false, settings, None);

    assert!(p.scanner.start());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    assert!(p.scanner.stop().await);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!p.scanner.is_running());
}

#[tokio::test]
async fn test_start_is_idempotent_and_restartable() {
    let ethereum = Arc::new(MockSource::new("ethereum"));
    let p = pipeline(vec![ethereum], true, false, fast_settings(), None);

    assert!(!p.scanner.stop().await);
    assert!(p.scanner.start());
    assert!(!p.scanner.start());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(p.scanner.stop().await);

    assert!(p.scanner.start());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(p.scanner.stop().await);
    assert!(p.scanner.get_status().stats.total_scans >= 2);
}
