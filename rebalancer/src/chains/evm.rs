//! Ethereum / Polygon backend over JSON-RPC.

use std::sync::Arc;

use alp_vault::{Address, EmitterAddress, TxHash};
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::{
    contract::{abigen, ContractCall, ContractError},
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Bytes, H160, U256, U64},
};
use tracing::{debug, info};

use super::{ChainResult, L1Contracts, L2Contracts};
use crate::error::ChainError;

/// How far back to look for the latest `TransferToL1` before scanning all history.
const LOG_LOOKBACK_BLOCKS: u64 = 10_000;

abigen!(
    L1VaultContract,
    r#"[
        function received() external view returns (bool)
        function wormholeRouter() external view returns (address)
        function sendTVL() external
    ]"#
);

abigen!(
    L2VaultContract,
    r#"[
        function canTransferToL1() external view returns (bool)
        function canRequestFromL1() external view returns (bool)
        function wormholeRouter() external view returns (address)
        function bridgeEscrow() external view returns (address)
        function asset() external view returns (address)
        function emergencyWithdrawalQueue() external view returns (address)
        event TransferToL1(uint256 amount)
    ]"#
);

abigen!(
    WithdrawalQueueContract,
    r#"[
        function size() external view returns (uint256)
        function dequeue(uint256 batchSize) external
    ]"#
);

abigen!(
    L1RouterContract,
    r#"[
        function wormhole() external view returns (address)
        function nextValidNonce() external view returns (uint256)
        function receiveFundRequest(bytes message) external
        function receiveFunds(bytes message, bytes exitProof) external
    ]"#
);

abigen!(
    L2RouterContract,
    r#"[
        function wormhole() external view returns (address)
        function nextValidNonce() external view returns (uint256)
        function receiveTVL(bytes message) external
        function receiveFunds(bytes message) external
    ]"#
);

abigen!(
    WormholeCoreContract,
    r#"[
        function nextSequence(address emitter) external view returns (uint64)
    ]"#
);

abigen!(
    Erc20Contract,
    r#"[
        function balanceOf(address account) external view returns (uint256)
    ]"#
);

type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

async fn signer_client(rpc_url: &str, private_key: &str) -> Result<Arc<Client>> {
    let provider =
        Provider::<Http>::try_from(rpc_url).context("Failed to create HTTP provider")?;
    let chain_id = provider
        .get_chainid()
        .await
        .with_context(|| format!("Failed to fetch chain id from {rpc_url}"))?;
    let wallet = private_key
        .parse::<LocalWallet>()
        .context("Invalid private key")?
        .with_chain_id(chain_id.as_u64());
    info!(chain_id = %chain_id, signer = ?wallet.address(), "Connected signer");
    Ok(Arc::new(SignerMiddleware::new(provider, wallet)))
}

fn h160(address: Address) -> H160 {
    H160::from(address.0)
}

fn to_u64(value: U256) -> ChainResult<u64> {
    if value > U256::from(u64::MAX) {
        return Err(ChainError::Network(format!("{value} does not fit in u64")));
    }
    Ok(value.low_u64())
}

fn read_error(e: impl std::fmt::Display) -> ChainError {
    ChainError::Network(e.to_string())
}

fn send_error(e: ContractError<Client>) -> ChainError {
    if e.is_revert() {
        ChainError::Reverted(e.to_string())
    } else {
        ChainError::Network(e.to_string())
    }
}

/// Sends `call` and waits for one confirmation.
async fn submit(call: ContractCall<Client, ()>) -> ChainResult<TxHash> {
    let pending = call.send().await.map_err(send_error)?;
    let tx_hash = pending.tx_hash();
    debug!(tx = ?tx_hash, "Transaction submitted");
    let receipt = pending
        .await
        .map_err(read_error)?
        .ok_or_else(|| ChainError::Network(format!("{tx_hash:?} dropped from mempool")))?;
    if receipt.status == Some(U64::zero()) {
        return Err(ChainError::Reverted(format!("{tx_hash:?} reverted")));
    }
    Ok(TxHash(receipt.transaction_hash.0))
}

pub struct EvmL1 {
    vault: L1VaultContract<Client>,
    router: L1RouterContract<Client>,
    core: WormholeCoreContract<Client>,
    router_address: H160,
}

impl EvmL1 {
    /// Connects to the L1 vault and discovers its router and messaging core.
    pub async fn connect(rpc_url: &str, private_key: &str, vault: Address) -> Result<Self> {
        let client = signer_client(rpc_url, private_key).await?;
        let vault = L1VaultContract::new(h160(vault), client.clone());
        let router_address = vault
            .wormhole_router()
            .call()
            .await
            .context("Failed to read L1 vault router")?;
        let router = L1RouterContract::new(router_address, client.clone());
        let core_address = router
            .wormhole()
            .call()
            .await
            .context("Failed to read L1 messaging core")?;
        info!(router = ?router_address, core = ?core_address, "L1 contracts resolved");
        Ok(Self {
            vault,
            router,
            core: WormholeCoreContract::new(core_address, client),
            router_address,
        })
    }
}

#[async_trait]
impl L1Contracts for EvmL1 {
    fn router_emitter(&self) -> EmitterAddress {
        Address(self.router_address.0).to_emitter()
    }

    async fn router_sequence(&self) -> ChainResult<u64> {
        self.core
            .next_sequence(self.router_address)
            .call()
            .await
            .map_err(read_error)
    }

    async fn next_valid_nonce(&self) -> ChainResult<u64> {
        to_u64(self.router.next_valid_nonce().call().await.map_err(read_error)?)
    }

    async fn received(&self) -> ChainResult<bool> {
        self.vault.received().call().await.map_err(read_error)
    }

    async fn send_tvl(&self) -> ChainResult<TxHash> {
        submit(self.vault.send_tvl()).await
    }

    async fn receive_fund_request(&self, vaa: &[u8]) -> ChainResult<TxHash> {
        submit(self.router.receive_fund_request(Bytes::from(vaa.to_vec()))).await
    }

    async fn receive_funds(&self, vaa: &[u8], exit_proof: &[u8]) -> ChainResult<TxHash> {
        submit(self.router.receive_funds(
            Bytes::from(vaa.to_vec()),
            Bytes::from(exit_proof.to_vec()),
        ))
        .await
    }
}

pub struct EvmL2 {
    client: Arc<Client>,
    vault: L2VaultContract<Client>,
    router: L2RouterContract<Client>,
    core: WormholeCoreContract<Client>,
    asset: Erc20Contract<Client>,
    withdrawal_queue: WithdrawalQueueContract<Client>,
    router_address: H160,
    escrow_address: H160,
}

impl EvmL2 {
    /// Connects to the L2 vault and discovers its router, escrow, asset and messaging core.
    pub async fn connect(rpc_url: &str, private_key: &str, vault: Address) -> Result<Self> {
        let client = signer_client(rpc_url, private_key).await?;
        let vault = L2VaultContract::new(h160(vault), client.clone());
        let router_address = vault
            .wormhole_router()
            .call()
            .await
            .context("Failed to read L2 vault router")?;
        let escrow_address = vault
            .bridge_escrow()
            .call()
            .await
            .context("Failed to read L2 vault escrow")?;
        let asset_address = vault.asset().call().await.context("Failed to read L2 asset")?;
        let queue_address = vault
            .emergency_withdrawal_queue()
            .call()
            .await
            .context("Failed to read L2 withdrawal queue")?;
        let router = L2RouterContract::new(router_address, client.clone());
        let core_address = router
            .wormhole()
            .call()
            .await
            .context("Failed to read L2 messaging core")?;
        info!(
            router = ?router_address,
            escrow = ?escrow_address,
            asset = ?asset_address,
            withdrawal_queue = ?queue_address,
            core = ?core_address,
            "L2 contracts resolved"
        );
        Ok(Self {
            vault,
            router,
            core: WormholeCoreContract::new(core_address, client.clone()),
            asset: Erc20Contract::new(asset_address, client.clone()),
            withdrawal_queue: WithdrawalQueueContract::new(queue_address, client.clone()),
            client,
            router_address,
            escrow_address,
        })
    }

    async fn transfer_to_l1_events_since(&self, from_block: U64) -> ChainResult<Option<TxHash>> {
        let events = self
            .vault
            .event::<TransferToL1Filter>()
            .from_block(from_block)
            .query_with_meta()
            .await
            .map_err(read_error)?;
        Ok(events
            .into_iter()
            .max_by_key(|(_, meta)| (meta.block_number, meta.log_index))
            .map(|(_, meta)| TxHash(meta.transaction_hash.0)))
    }
}

#[async_trait]
impl L2Contracts for EvmL2 {
    fn router_emitter(&self) -> EmitterAddress {
        Address(self.router_address.0).to_emitter()
    }

    async fn router_sequence(&self) -> ChainResult<u64> {
        self.core
            .next_sequence(self.router_address)
            .call()
            .await
            .map_err(read_error)
    }

    async fn next_valid_nonce(&self) -> ChainResult<u64> {
        to_u64(self.router.next_valid_nonce().call().await.map_err(read_error)?)
    }

    async fn can_transfer_to_l1(&self) -> ChainResult<bool> {
        self.vault.can_transfer_to_l1().call().await.map_err(read_error)
    }

    async fn can_request_from_l1(&self) -> ChainResult<bool> {
        self.vault.can_request_from_l1().call().await.map_err(read_error)
    }

    async fn escrow_balance(&self) -> ChainResult<u64> {
        to_u64(
            self.asset
                .balance_of(self.escrow_address)
                .call()
                .await
                .map_err(read_error)?,
        )
    }

    async fn latest_transfer_to_l1_tx(&self) -> ChainResult<Option<TxHash>> {
        let head = self.client.get_block_number().await.map_err(read_error)?;
        let recent = head.saturating_sub(U64::from(LOG_LOOKBACK_BLOCKS));
        match self.transfer_to_l1_events_since(recent).await? {
            Some(tx_hash) => Ok(Some(tx_hash)),
            None => self.transfer_to_l1_events_since(U64::zero()).await,
        }
    }

    async fn receive_tvl(&self, vaa: &[u8]) -> ChainResult<TxHash> {
        submit(self.router.receive_tvl(Bytes::from(vaa.to_vec()))).await
    }

    async fn receive_funds(&self, vaa: &[u8]) -> ChainResult<TxHash> {
        submit(self.router.receive_funds(Bytes::from(vaa.to_vec()))).await
    }

    async fn withdrawal_queue_size(&self) -> ChainResult<u64> {
        to_u64(self.withdrawal_queue.size().call().await.map_err(read_error)?)
    }

    async fn dequeue_withdrawals(&self, batch: u64) -> ChainResult<TxHash> {
        submit(self.withdrawal_queue.dequeue(U256::from(batch))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_u64_rejects_wide_values() {
        assert_eq!(to_u64(U256::from(42u64)).unwrap(), 42);
        assert_eq!(to_u64(U256::from(u64::MAX)).unwrap(), u64::MAX);
        assert!(to_u64(U256::from(u64::MAX) + 1).is_err());
    }

    #[test]
    fn test_emitter_matches_devnet_padding() {
        let router = Address([0x5a; 20]);
        assert_eq!(Address(h160(router).0).to_emitter(), router.to_emitter());
    }
}
