//! In-process devnet backend.
//!
//! Wraps an [`alp_vault::Network`] behind an async mutex so each call is one
//! atomic transaction, and exposes the guardian and checkpoint actors as the
//! proof services the rebalancer polls.

use std::{sync::Arc, time::Duration};

use alp_vault::{ChainId, Deployment, EmitterAddress, Network, TxHash};
use async_trait::async_trait;
use tokio::{
    sync::{Mutex, MutexGuard},
    task::JoinHandle,
};
use tracing::{debug, warn};

use super::{ChainResult, Contracts, L1Contracts, L2Contracts};
use crate::{
    error::ServiceError,
    services::{ExitProofSource, VaaSource},
};

#[derive(Clone)]
pub struct LocalNetwork {
    network: Arc<Mutex<Network>>,
    deployment: Deployment,
}

impl LocalNetwork {
    pub fn new(network: Network) -> Self {
        let deployment = network.deployment;
        Self {
            network: Arc::new(Mutex::new(network)),
            deployment,
        }
    }

    pub fn deployment(&self) -> Deployment {
        self.deployment
    }

    pub async fn lock(&self) -> MutexGuard<'_, Network> {
        self.network.lock().await
    }

    pub fn contracts(&self) -> Contracts {
        Contracts {
            l1: Arc::new(LocalL1(self.clone())),
            l2: Arc::new(LocalL2(self.clone())),
        }
    }

    /// Runs guardians, state sync and checkpointing every `period`.
    pub fn spawn_actors(&self, period: Duration) -> JoinHandle<()> {
        let network = self.network.clone();
        let period = period.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = network.lock().await.settle() {
                    warn!(error = %e, "Devnet actors failed to settle");
                }
            }
        })
    }
}

pub struct LocalL1(LocalNetwork);

pub struct LocalL2(LocalNetwork);

#[async_trait]
impl L1Contracts for LocalL1 {
    fn router_emitter(&self) -> EmitterAddress {
        self.0.deployment.l1_router.to_emitter()
    }

    async fn router_sequence(&self) -> ChainResult<u64> {
        let net = self.0.lock().await;
        Ok(net.l1.core.next_sequence(net.deployment.l1_router))
    }

    async fn next_valid_nonce(&self) -> ChainResult<u64> {
        Ok(self.0.lock().await.l1.router.next_valid_nonce())
    }

    async fn received(&self) -> ChainResult<bool> {
        Ok(self.0.lock().await.l1.side.vault.received)
    }

    async fn send_tvl(&self) -> ChainResult<TxHash> {
        let receipt = self.0.lock().await.l1.send_tvl()?;
        debug!(tx = %receipt.tx_hash, block = receipt.block, "L1 sendTVL mined");
        Ok(receipt.tx_hash)
    }

    async fn receive_fund_request(&self, vaa: &[u8]) -> ChainResult<TxHash> {
        let receipt = self.0.lock().await.l1.receive_fund_request(vaa)?;
        debug!(tx = %receipt.tx_hash, block = receipt.block, "L1 receiveFundRequest mined");
        Ok(receipt.tx_hash)
    }

    async fn receive_funds(&self, vaa: &[u8], exit_proof: &[u8]) -> ChainResult<TxHash> {
        let receipt = self.0.lock().await.l1.receive_funds(vaa, exit_proof)?;
        debug!(tx = %receipt.tx_hash, block = receipt.block, "L1 receiveFunds mined");
        Ok(receipt.tx_hash)
    }
}

#[async_trait]
impl L2Contracts for LocalL2 {
    fn router_emitter(&self) -> EmitterAddress {
        self.0.deployment.l2_router.to_emitter()
    }

    async fn router_sequence(&self) -> ChainResult<u64> {
        let net = self.0.lock().await;
        Ok(net.l2.core.next_sequence(net.deployment.l2_router))
    }

    async fn next_valid_nonce(&self) -> ChainResult<u64> {
        Ok(self.0.lock().await.l2.router.next_valid_nonce())
    }

    async fn can_transfer_to_l1(&self) -> ChainResult<bool> {
        Ok(self.0.lock().await.l2.side.vault.lock.can_transfer_to_l1())
    }

    async fn can_request_from_l1(&self) -> ChainResult<bool> {
        Ok(self.0.lock().await.l2.side.vault.lock.can_request_from_l1())
    }

    async fn escrow_balance(&self) -> ChainResult<u64> {
        let net = self.0.lock().await;
        Ok(net.l2.escrow.balance(&net.l2.ledger))
    }

    async fn latest_transfer_to_l1_tx(&self) -> ChainResult<Option<TxHash>> {
        Ok(self.0.lock().await.l2.latest_transfer_to_l1_tx())
    }

    async fn receive_tvl(&self, vaa: &[u8]) -> ChainResult<TxHash> {
        let receipt = self.0.lock().await.l2.receive_tvl(vaa)?;
        debug!(tx = %receipt.tx_hash, block = receipt.block, "L2 receiveTVL mined");
        Ok(receipt.tx_hash)
    }

    async fn receive_funds(&self, vaa: &[u8]) -> ChainResult<TxHash> {
        let receipt = self.0.lock().await.l2.receive_funds(vaa)?;
        debug!(tx = %receipt.tx_hash, block = receipt.block, "L2 receiveFunds mined");
        Ok(receipt.tx_hash)
    }

    async fn withdrawal_queue_size(&self) -> ChainResult<u64> {
        Ok(self.0.lock().await.l2.vault().withdrawal_queue_size())
    }

    async fn dequeue_withdrawals(&self, batch: u64) -> ChainResult<TxHash> {
        let receipt = self.0.lock().await.l2.process_withdrawal_queue(batch)?;
        debug!(tx = %receipt.tx_hash, block = receipt.block, "L2 dequeue mined");
        Ok(receipt.tx_hash)
    }
}

#[async_trait]
impl VaaSource for LocalNetwork {
    async fn signed_vaa(
        &self,
        chain: ChainId,
        emitter: EmitterAddress,
        sequence: u64,
    ) -> Result<Option<Vec<u8>>, ServiceError> {
        Ok(self.lock().await.signed_vaa(chain, emitter, sequence))
    }
}

#[async_trait]
impl ExitProofSource for LocalNetwork {
    async fn exit_payload(
        &self,
        tx_hash: TxHash,
        event_signature: &str,
    ) -> Result<Option<Vec<u8>>, ServiceError> {
        Ok(self.lock().await.exit_payload(tx_hash, event_signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_reflect_devnet_state() {
        let local = LocalNetwork::new(Network::devnet());
        let contracts = local.contracts();
        assert_eq!(contracts.l1.router_sequence().await.unwrap(), 0);
        assert!(contracts.l2.can_transfer_to_l1().await.unwrap());
        assert!(contracts.l2.can_request_from_l1().await.unwrap());

        contracts.l1.send_tvl().await.unwrap();
        assert_eq!(contracts.l1.router_sequence().await.unwrap(), 1);
        assert_eq!(contracts.l2.next_valid_nonce().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reverts_map_to_chain_errors() {
        let local = LocalNetwork::new(Network::devnet());
        let contracts = local.contracts();
        let err = contracts.l2.receive_tvl(&[0u8; 4]).await.unwrap_err();
        assert!(matches!(err, crate::error::ChainError::Reverted(_)));
    }
}
