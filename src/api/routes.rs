//! API route handlers.
//!
//! All endpoints return JSON. State is the shared `Arc<AutonomousScanner>`.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::engine::scanner::{
    AggregatedExecutionStats, AutonomousScanner, NetworkApproval, ScannerStatus,
};
use crate::policy::{PolicySnapshot, PolicyUpdate};
use crate::types::{ApprovalStatus, Opportunity};

pub type AppState = Arc<AutonomousScanner>;

const DEFAULT_OPPORTUNITY_LIMIT: usize = 20;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalResponse {
    pub network: String,
    pub id: String,
    pub status: ApprovalStatus,
    /// Only meaningful for approvals: whether execution succeeded.
    pub executed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScannerControlResponse {
    pub running: bool,
    /// `false` when the call was a no-op.
    pub changed: bool,
}

#[derive(Debug, Deserialize)]
pub struct OpportunityQuery {
    pub limit: Option<usize>,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /api/status
pub async fn get_status(State(scanner): State<AppState>) -> Json<ScannerStatus> {
    Json(scanner.get_status())
}

/// GET /api/opportunities?limit=N
pub async fn get_opportunities(
    State(scanner): State<AppState>,
    Query(query): Query<OpportunityQuery>,
) -> Json<Vec<Arc<Opportunity>>> {
    let limit = query.limit.unwrap_or(DEFAULT_OPPORTUNITY_LIMIT);
    Json(scanner.get_opportunities(limit))
}

/// GET /api/stats
pub async fn get_stats(State(scanner): State<AppState>) -> Json<AggregatedExecutionStats> {
    Json(scanner.get_execution_stats())
}

/// GET /api/approvals
pub async fn get_approvals(State(scanner): State<AppState>) -> Json<Vec<NetworkApproval>> {
    Json(scanner.get_pending_approvals())
}

/// POST /api/approvals/:network/:id/approve
pub async fn approve(
    State(scanner): State<AppState>,
    Path((network, id)): Path<(String, String)>,
) -> Response {
    resolve(&scanner, network, id, ApprovalStatus::Approved)
}

/// POST /api/approvals/:network/:id/reject
pub async fn reject(
    State(scanner): State<AppState>,
    Path((network, id)): Path<(String, String)>,
) -> Response {
    resolve(&scanner, network, id, ApprovalStatus::Rejected)
}

fn resolve(
    scanner: &AutonomousScanner,
    network: String,
    id: String,
    status: ApprovalStatus,
) -> Response {
    let Some(engine) = scanner.engine(&network) else {
        return error(StatusCode::NOT_FOUND, format!("Unknown network: {network}"));
    };
    match engine.get_approval(&id) {
        None => return error(StatusCode::NOT_FOUND, format!("Approval not found: {id}")),
        Some(record) if record.status.is_terminal() => {
            return error(
                StatusCode::CONFLICT,
                format!("Approval {id} already {}", record.status),
            )
        }
        Some(_) => {}
    }

    let (resolved, executed) = match status {
        ApprovalStatus::Approved => {
            let executed = scanner.approve_transaction(&network, &id);
            // `false` may also mean execution failed after approval.
            let resolved = engine
                .get_approval(&id)
                .is_some_and(|r| r.status == ApprovalStatus::Approved);
            (resolved, executed)
        }
        _ => (scanner.reject_transaction(&network, &id), false),
    };

    if !resolved {
        return error(StatusCode::CONFLICT, format!("Approval {id} was resolved concurrently"));
    }
    Json(ApprovalResponse {
        network,
        id,
        status,
        executed,
    })
    .into_response()
}

/// POST /api/scanner/start
pub async fn start_scanner(State(scanner): State<AppState>) -> Json<ScannerControlResponse> {
    let changed = scanner.start();
    info!(changed, "Scanner start requested via API");
    Json(ScannerControlResponse {
        running: scanner.is_running(),
        changed,
    })
}

/// POST /api/scanner/stop
pub async fn stop_scanner(State(scanner): State<AppState>) -> Json<ScannerControlResponse> {
    let changed = scanner.stop().await;
    info!(changed, "Scanner stop requested via API");
    Json(ScannerControlResponse {
        running: scanner.is_running(),
        changed,
    })
}

/// POST /api/config
pub async fn update_config(
    State(scanner): State<AppState>,
    payload: Result<Json<PolicyUpdate>, JsonRejection>,
) -> Response {
    let Json(update) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return error(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    match scanner.update_config(update) {
        Ok(()) => Json::<PolicySnapshot>(scanner.get_status().policy).into_response(),
        Err(e) => error(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
