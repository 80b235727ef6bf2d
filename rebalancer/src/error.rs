//! Error types for the Alpine rebalancer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failure talking to one of the chains.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// The transaction was mined (or simulated) and reverted.
    #[error("transaction reverted: {0}")]
    Reverted(String),

    /// RPC unreachable, timed out or returned garbage.
    #[error("network failure: {0}")]
    Network(String),
}

impl From<alp_vault::VaultError> for ChainError {
    fn from(err: alp_vault::VaultError) -> Self {
        ChainError::Reverted(err.to_string())
    }
}

/// Failure talking to an off-chain service (guardian API, exit proofs, address book).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("address book has no entry {0}")]
    MissingContract(String),
}

/// API error types
#[derive(Debug, Error)]
pub enum RebalancerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for RebalancerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            RebalancerError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            RebalancerError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            RebalancerError::Chain(_) => (StatusCode::BAD_GATEWAY, "CHAIN_ERROR"),
            RebalancerError::Service(_) => (StatusCode::BAD_GATEWAY, "SERVICE_ERROR"),
            RebalancerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for RebalancerError {
    fn from(err: anyhow::Error) -> Self {
        RebalancerError::Internal(err.to_string())
    }
}

/// Result type alias for API handlers
pub type Result<T> = std::result::Result<T, RebalancerError>;
