//! API Routes

pub mod health;
pub mod rebalance;

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    Router,
};
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::warn;

pub use health::health_router;
pub use rebalance::rebalance_router;

use crate::{
    rebalancer::Rebalancer,
    types::{Config, RunReport},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rebalancer: Arc<Rebalancer>,
    pub last_report: Arc<RwLock<Option<RunReport>>>,
}

impl AppState {
    pub fn new(config: Arc<Config>, rebalancer: Arc<Rebalancer>) -> Self {
        Self {
            config,
            rebalancer,
            last_report: Arc::new(RwLock::new(None)),
        }
    }

    /// Runs the rebalancer once and keeps the report for `/api/rebalance/status`.
    pub async fn run_once(&self) -> RunReport {
        let report = self.rebalancer.run().await;
        *self.last_report.write().await = Some(report.clone());
        report
    }
}

/// Full HTTP application: routes, auth, CORS, body limit and tracing.
pub fn app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config);
    let config = state.config.clone();

    Router::new()
        .merge(health_router(state.clone()))
        .merge(rebalance_router(state))
        .layer(middleware::from_fn_with_state(config, api_key_middleware))
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(16 * 1024))
        .layer(TraceLayer::new_for_http())
}

/// Build CORS layer from config
fn build_cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("x-api-key"),
        ])
}

/// API key authentication middleware
async fn api_key_middleware(
    State(config): State<Arc<Config>>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    // No keys configured: development mode
    if config.api_keys.is_empty() {
        return Ok(next.run(request).await);
    }

    let api_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            warn!("Request missing API key");
            StatusCode::UNAUTHORIZED
        })?;

    if !config.api_keys.iter().any(|key| key == api_key) {
        warn!("Invalid API key provided");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
