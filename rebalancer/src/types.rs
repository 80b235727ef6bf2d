//! Configuration and report types for the Alpine rebalancer

use std::{fmt, time::Duration};

use alp_vault::TxHash;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub network: NetworkMode,
    pub timestamp: i64,
}

/// Which chains the rebalancer drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// Ethereum and Polygon over JSON-RPC
    Evm,
    /// In-process devnet
    Local,
}

/// Configuration for the rebalancer service
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// CORS allowed origins
    pub cors_origins: Vec<String>,

    /// API keys for authentication
    pub api_keys: Vec<String>,

    /// Mainnet (Ethereum + Polygon PoS) or testnet (Goerli + Mumbai)
    pub mainnet: bool,

    /// Address book version to resolve vaults from
    pub contract_version: String,

    pub address_book_url: String,
    pub eth_rpc_url: String,
    pub polygon_rpc_url: String,

    /// Hex private key of the account submitting transactions on both chains
    pub private_key: Option<String>,

    pub wormhole_api_url: String,
    pub exit_proof_api_url: String,

    /// Attempts per proof fetch before a step reports "not ready"
    pub proof_poll_attempts: u32,
    pub proof_poll_interval: Duration,

    /// Built-in scheduler period; `None` leaves scheduling to an external cron
    pub rebalance_interval: Option<Duration>,

    pub network: NetworkMode,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_network(false)
    }
}

impl Config {
    /// Defaults for mainnet or testnet endpoints.
    pub fn for_network(mainnet: bool) -> Self {
        let (wormhole, polygon) = if mainnet {
            ("mainnet", "matic")
        } else {
            ("testnet", "mumbai")
        };
        Self {
            port: 3002,
            cors_origins: vec!["http://localhost:3000".to_string()],
            api_keys: vec![],
            mainnet,
            contract_version: "stable".to_string(),
            address_book_url: "https://sc-abis.s3.us-east-2.amazonaws.com".to_string(),
            eth_rpc_url: "http://localhost:8545".to_string(),
            polygon_rpc_url: "http://localhost:8546".to_string(),
            private_key: None,
            wormhole_api_url: format!("https://wormhole-v2-{wormhole}-api.certus.one"),
            exit_proof_api_url: format!("https://apis.matic.network/api/v1/{polygon}"),
            proof_poll_attempts: 5,
            proof_poll_interval: Duration::from_secs(2),
            rebalance_interval: None,
            network: NetworkMode::Evm,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mainnet = env_parse("MAINNET").unwrap_or(false);
        let defaults = Self::for_network(mainnet);

        let port = env_parse("PORT").unwrap_or(defaults.port);

        let cors_origins = std::env::var("CORS_ORIGINS")
            .ok()
            .map(|s| split_list(&s))
            .unwrap_or(defaults.cors_origins);

        let api_keys = std::env::var("API_KEYS")
            .ok()
            .map(|s| split_list(&s))
            .unwrap_or_default();

        let network = match std::env::var("REBALANCER_NETWORK").as_deref() {
            Ok("local") => NetworkMode::Local,
            _ => NetworkMode::Evm,
        };

        Self {
            port,
            cors_origins,
            api_keys,
            mainnet,
            contract_version: std::env::var("CONTRACT_VERSION").unwrap_or(defaults.contract_version),
            address_book_url: std::env::var("ADDRESS_BOOK_URL").unwrap_or(defaults.address_book_url),
            eth_rpc_url: std::env::var("ETH_RPC_URL").unwrap_or(defaults.eth_rpc_url),
            polygon_rpc_url: std::env::var("POLYGON_RPC_URL").unwrap_or(defaults.polygon_rpc_url),
            private_key: std::env::var("REBALANCER_PRIVATE_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            wormhole_api_url: std::env::var("WORMHOLE_API_URL").unwrap_or(defaults.wormhole_api_url),
            exit_proof_api_url: std::env::var("EXIT_PROOF_API_URL")
                .unwrap_or(defaults.exit_proof_api_url),
            proof_poll_attempts: env_parse("PROOF_POLL_ATTEMPTS")
                .unwrap_or(defaults.proof_poll_attempts),
            proof_poll_interval: env_parse("PROOF_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.proof_poll_interval),
            rebalance_interval: env_parse("REBALANCE_INTERVAL_SECS")
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs),
            network,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Steps the rebalancer can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    SendTvlFromL1,
    ReceiveTvlInL2,
    ReceiveFundInL1,
    TriggerTransferFromL1,
    ClearFundsFromL2Escrow,
    /// Pays queued emergency withdrawals; runs outside the rebalance cycle.
    ProcessWithdrawalQueue,
}

impl StepKind {
    /// The rebalance cycle, in execution order.
    pub const ALL: [StepKind; 5] = [
        StepKind::SendTvlFromL1,
        StepKind::ReceiveTvlInL2,
        StepKind::ReceiveFundInL1,
        StepKind::TriggerTransferFromL1,
        StepKind::ClearFundsFromL2Escrow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::SendTvlFromL1 => "send_tvl_from_l1",
            StepKind::ReceiveTvlInL2 => "receive_tvl_in_l2",
            StepKind::ReceiveFundInL1 => "receive_fund_in_l1",
            StepKind::TriggerTransferFromL1 => "trigger_transfer_from_l1",
            StepKind::ClearFundsFromL2Escrow => "clear_funds_from_l2_escrow",
            StepKind::ProcessWithdrawalQueue => "process_withdrawal_queue",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a step did or did not submit a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
    Submitted { tx_hash: TxHash },
    PreconditionNotMet,
    ProofUnavailable,
    TransactionReverted,
    NetworkFailure,
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepStatus {
    pub step: StepKind,
    pub success: bool,
    pub message: String,
    pub outcome: StepOutcome,
}

impl StepStatus {
    pub fn submitted(step: StepKind, tx_hash: TxHash, message: impl Into<String>) -> Self {
        Self {
            step,
            success: true,
            message: message.into(),
            outcome: StepOutcome::Submitted { tx_hash },
        }
    }

    pub fn skipped(step: StepKind, outcome: StepOutcome, message: impl Into<String>) -> Self {
        Self {
            step,
            success: false,
            message: message.into(),
            outcome,
        }
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        match self.outcome {
            StepOutcome::Submitted { tx_hash } => Some(tx_hash),
            _ => None,
        }
    }
}

/// One pass over all five steps.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepStatus>,
}

impl RunReport {
    pub fn submitted(&self) -> usize {
        self.steps.iter().filter(|s| s.success).count()
    }

    pub fn step(&self, kind: StepKind) -> Option<&StepStatus> {
        self.steps.iter().find(|s| s.step == kind)
    }
}
