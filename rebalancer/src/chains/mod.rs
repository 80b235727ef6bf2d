//! Read and write access to the vault contracts on each chain.
//!
//! The rebalancer only sees these traits. [`evm`] talks JSON-RPC to deployed
//! contracts, [`local`] drives the in-process devnet from `alp-vault`.

pub mod evm;
pub mod local;

use std::sync::Arc;

use alp_vault::{EmitterAddress, TxHash};
use async_trait::async_trait;

use crate::error::ChainError;

pub type ChainResult<T> = std::result::Result<T, ChainError>;

/// Ethereum side: L1 vault and its router.
#[async_trait]
pub trait L1Contracts: Send + Sync {
    /// Emitter id of the L1 router on the guardian network.
    fn router_emitter(&self) -> EmitterAddress;

    /// Sequence the messaging core will assign to the router's next message.
    async fn router_sequence(&self) -> ChainResult<u64>;

    /// Next L2 message sequence the L1 router accepts.
    async fn next_valid_nonce(&self) -> ChainResult<u64>;

    /// Whether L1 cleared L2 funds that no TVL report has acknowledged yet.
    async fn received(&self) -> ChainResult<bool>;

    async fn send_tvl(&self) -> ChainResult<TxHash>;

    async fn receive_fund_request(&self, vaa: &[u8]) -> ChainResult<TxHash>;

    async fn receive_funds(&self, vaa: &[u8], exit_proof: &[u8]) -> ChainResult<TxHash>;
}

/// Polygon side: L2 vault, its router and escrow.
#[async_trait]
pub trait L2Contracts: Send + Sync {
    fn router_emitter(&self) -> EmitterAddress;

    async fn router_sequence(&self) -> ChainResult<u64>;

    async fn next_valid_nonce(&self) -> ChainResult<u64>;

    async fn can_transfer_to_l1(&self) -> ChainResult<bool>;

    async fn can_request_from_l1(&self) -> ChainResult<bool>;

    /// Asset balance held by the L2 bridge escrow.
    async fn escrow_balance(&self) -> ChainResult<u64>;

    /// Transaction of the most recent `TransferToL1` event, if any.
    async fn latest_transfer_to_l1_tx(&self) -> ChainResult<Option<TxHash>>;

    async fn receive_tvl(&self, vaa: &[u8]) -> ChainResult<TxHash>;

    async fn receive_funds(&self, vaa: &[u8]) -> ChainResult<TxHash>;

    /// Emergency withdrawal requests waiting for liquidity.
    async fn withdrawal_queue_size(&self) -> ChainResult<u64>;

    /// Pays up to `batch` queued withdrawals; reverts when none can be paid.
    async fn dequeue_withdrawals(&self, batch: u64) -> ChainResult<TxHash>;
}

/// Both chains as seen by the rebalancer.
#[derive(Clone)]
pub struct Contracts {
    pub l1: Arc<dyn L1Contracts>,
    pub l2: Arc<dyn L2Contracts>,
}

/// Whether `sequence` (next to be assigned by the sender) is ahead of the
/// receiver's `nonce`, i.e. a message is waiting to be delivered.
pub fn message_pending(sequence: u64, nonce: u64) -> bool {
    sequence > nonce
}
