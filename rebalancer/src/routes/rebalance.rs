//! Rebalance control endpoints

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use super::AppState;
use crate::{
    error::{RebalancerError, Result},
    types::{RunReport, StepStatus},
};

/// Create rebalance router
pub fn rebalance_router(state: AppState) -> Router {
    Router::new()
        .route("/api/rebalance/run", post(run))
        .route("/api/rebalance/status", get(status))
        .route("/api/withdrawal-queue/process", post(process_withdrawal_queue))
        .with_state(state)
}

/// Run all five steps once
///
/// POST /api/rebalance/run
async fn run(State(state): State<AppState>) -> Json<RunReport> {
    info!("Rebalance run requested over HTTP");
    Json(state.run_once().await)
}

/// Report of the most recent run
///
/// GET /api/rebalance/status
async fn status(State(state): State<AppState>) -> Result<Json<RunReport>> {
    state
        .last_report
        .read()
        .await
        .clone()
        .map(Json)
        .ok_or_else(|| RebalancerError::NotFound("no rebalance has run yet".to_string()))
}

/// Pay queued emergency withdrawals
///
/// POST /api/withdrawal-queue/process
async fn process_withdrawal_queue(State(state): State<AppState>) -> Json<StepStatus> {
    info!("Withdrawal queue processing requested over HTTP");
    Json(state.rebalancer.process_withdrawal_queue().await)
}
