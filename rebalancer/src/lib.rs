//! Alpine rebalancer
//!
//! Off-chain orchestrator that keeps the L1 and L2 vaults near their target
//! split. It relays TVL reports, fund requests and fund transfer reports
//! between the chains by fetching guardian-signed messages and native-bridge
//! exit proofs, and exposes a small HTTP control surface.

pub mod chains;
pub mod error;
pub mod rebalancer;
pub mod routes;
pub mod services;
pub mod types;

pub use error::{ChainError, RebalancerError, ServiceError};
pub use rebalancer::Rebalancer;
pub use routes::{app, AppState};
pub use types::{Config, NetworkMode, RunReport, StepKind, StepOutcome, StepStatus};
