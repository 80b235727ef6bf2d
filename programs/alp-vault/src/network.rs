//! Both chains plus the off-chain actors that connect them: the guardian
//! network, the state-sync relayer and the checkpoint authority.

use tracing::debug;

use crate::{
    chain::{Chain, L1Chain, L1Side, L2Chain, L2Side, TxReceipt},
    constants::{
        ASSET_DECIMALS, CHAIN_ID_ETH, CHAIN_ID_POLYGON, CHECKPOINT_KEY_CONTEXT,
        ERC20_TRANSFER_EVENT_SIG,
    },
    error::Result,
    escrow::BridgeEscrow,
    pos_bridge::{Checkpointer, ChildChainManager, RootChainManager},
    router::MessageRouter,
    state::{L1Vault, L2Vault, Vault},
    token::TokenLedger,
    types::{Address, ChainId, EmitterAddress, TxHash},
    wormhole::{GuardianSet, Guardians, WormholeCore},
};

/// Addresses of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub governance: Address,
    pub l1_vault: Address,
    pub l1_router: Address,
    pub l1_escrow: Address,
    pub l1_predicate: Address,
    pub l2_vault: Address,
    pub l2_router: Address,
    pub l2_escrow: Address,
}

impl Deployment {
    /// Deterministic addresses derived from `label`.
    pub fn derive(label: &str) -> Self {
        let at = |name: &str| Address::derive(&format!("{label}/{name}"));
        Self {
            governance: at("governance"),
            l1_vault: at("l1/vault"),
            l1_router: at("l1/router"),
            l1_escrow: at("l1/escrow"),
            l1_predicate: at("l1/erc20-predicate"),
            l2_vault: at("l2/vault"),
            l2_router: at("l2/router"),
            l2_escrow: at("l2/escrow"),
        }
    }
}

#[derive(Debug)]
pub struct Network {
    pub deployment: Deployment,
    pub l1: L1Chain,
    pub l2: L2Chain,
    pub guardians: Guardians,
    pub checkpointer: Checkpointer,
}

impl Network {
    /// Fresh two-chain deployment with a single guardian.
    pub fn devnet() -> Self {
        Self::deploy(Deployment::derive("devnet"), GuardianSet::devnet(1))
    }

    pub fn deploy(deployment: Deployment, guardian_set: GuardianSet) -> Self {
        let d = deployment;
        let checkpoint_key = blake3::derive_key(CHECKPOINT_KEY_CONTEXT, d.l1_predicate.as_bytes());

        let l1 = Chain::new(
            CHAIN_ID_ETH,
            TokenLedger::new("USDC", ASSET_DECIMALS),
            WormholeCore::new(CHAIN_ID_ETH, guardian_set.clone()),
            MessageRouter::new(d.l1_router, CHAIN_ID_POLYGON, d.l2_router),
            BridgeEscrow::new(d.l1_escrow, d.l1_vault),
            L1Side {
                vault: L1Vault::new(Vault::new(d.l1_vault, d.governance)),
                root: RootChainManager::new(d.l1_predicate, checkpoint_key),
                l2_escrow: d.l2_escrow,
            },
        );
        let l2 = Chain::new(
            CHAIN_ID_POLYGON,
            TokenLedger::new("USDC", ASSET_DECIMALS),
            WormholeCore::new(CHAIN_ID_POLYGON, guardian_set.clone()),
            MessageRouter::new(d.l2_router, CHAIN_ID_ETH, d.l1_router),
            BridgeEscrow::new(d.l2_escrow, d.l2_vault),
            L2Side {
                vault: L2Vault::new(Vault::new(d.l2_vault, d.governance).with_withdrawal_queue()),
                child: ChildChainManager::default(),
                l1_escrow: d.l1_escrow,
            },
        );

        Self {
            deployment: d,
            l1,
            l2,
            guardians: Guardians::new(guardian_set),
            checkpointer: Checkpointer::new(checkpoint_key),
        }
    }

    /// Credits `owner` on L2 with funds backed by the L1 predicate, as if bridged in earlier.
    pub fn mint_bridged(&mut self, owner: Address, amount: u64) -> Result<()> {
        self.l1.mint(self.deployment.l1_predicate, amount)?;
        self.l2.mint(owner, amount)
    }

    /// Seeds the treasury with a share-minting L2 deposit by `owner`; rebalancing
    /// moves the L1 portion across.
    pub fn fund_treasury(&mut self, owner: Address, amount: u64) -> Result<TxReceipt> {
        self.mint_bridged(owner, amount)?;
        self.l2.deposit(owner, amount)
    }

    /// Guardians sign everything published on both chains so far.
    pub fn observe(&mut self) -> usize {
        self.guardians.observe(&self.l1.core) + self.guardians.observe(&self.l2.core)
    }

    /// Relays pending L1 deposits to L2.
    pub fn sync_state(&mut self) -> Result<usize> {
        let syncs = self.l1.side.root.drain_state_syncs();
        let count = syncs.len();
        for sync in syncs {
            self.l2.apply_state_sync(sync)?;
        }
        Ok(count)
    }

    /// Checkpoints every L2 block mined so far.
    pub fn checkpoint(&mut self) {
        self.checkpointer.checkpoint(self.l2.block());
        debug!(l2_block = self.l2.block(), "L2 checkpointed");
    }

    /// Lets every off-chain actor catch up.
    pub fn settle(&mut self) -> Result<()> {
        self.sync_state()?;
        self.checkpoint();
        self.observe();
        Ok(())
    }

    pub fn signed_vaa(
        &self,
        chain: ChainId,
        emitter: EmitterAddress,
        sequence: u64,
    ) -> Option<Vec<u8>> {
        self.guardians.signed_vaa(chain, emitter, sequence)
    }

    /// Exit payload for the burn in L2 transaction `tx_hash`, once checkpointed.
    pub fn exit_payload(&self, tx_hash: TxHash, event_signature: &str) -> Option<Vec<u8>> {
        if !event_signature.eq_ignore_ascii_case(ERC20_TRANSFER_EVENT_SIG) {
            return None;
        }
        let burn = self.l2.side.child.burn(tx_hash)?;
        self.checkpointer.exit_proof(burn)
    }

    pub fn transaction_count(&self) -> usize {
        self.l1.receipts().len() + self.l2.receipts().len()
    }
}
