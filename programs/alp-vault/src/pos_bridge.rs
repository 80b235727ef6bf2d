//! Native token bridge between the two chains.
//!
//! L1 -> L2 deposits lock funds in a predicate on L1 and are minted on L2
//! once the state sync is relayed. L2 -> L1 withdrawals burn on L2 and are
//! released on L1 against an exit proof, which the checkpoint authority only
//! issues after the burn's block has been checkpointed.

use std::collections::HashSet;

use constant_time_eq::constant_time_eq_32;
use serde::Serialize;
use tracing::debug;

use crate::{
    error::{Result, VaultError},
    escrow::InboundBridge,
    token::TokenLedger,
    types::{Address, TransferDescriptor, TxHash},
};

/// Deposit locked on L1, to be minted to `recipient` on L2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSync {
    pub id: u64,
    pub recipient: Address,
    pub amount: u64,
    pub l1_block: u64,
}

/// Withdrawal burned on L2, claimable by `recipient` on L1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BurnRecord {
    pub tx_hash: TxHash,
    pub block: u64,
    pub from: Address,
    pub recipient: Address,
    pub amount: u64,
}

impl BurnRecord {
    const LEN: usize = 32 + 8 + 20 + 20 + 8;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.extend_from_slice(self.tx_hash.as_bytes());
        out.extend_from_slice(&self.block.to_be_bytes());
        out.extend_from_slice(self.from.as_bytes());
        out.extend_from_slice(self.recipient.as_bytes());
        out.extend_from_slice(&self.amount.to_be_bytes());
        out
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::LEN {
            return None;
        }
        let (tx_hash, rest) = bytes.split_at(32);
        let (block, rest) = rest.split_at(8);
        let (from, rest) = rest.split_at(20);
        let (recipient, amount) = rest.split_at(20);
        Some(Self {
            tx_hash: TxHash::from_slice(tx_hash)?,
            block: u64::from_be_bytes(block.try_into().ok()?),
            from: Address::from_slice(from)?,
            recipient: Address::from_slice(recipient)?,
            amount: u64::from_be_bytes(amount.try_into().ok()?),
        })
    }
}

/// Signs inclusion proofs for burns in checkpointed L2 blocks.
#[derive(Debug, Clone)]
pub struct Checkpointer {
    key: [u8; 32],
    pub checkpointed_block: u64,
}

impl Checkpointer {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key,
            checkpointed_block: 0,
        }
    }

    pub fn checkpoint(&mut self, l2_block: u64) {
        self.checkpointed_block = self.checkpointed_block.max(l2_block);
    }

    /// Exit proof for `burn`, or `None` while its block is not yet checkpointed.
    pub fn exit_proof(&self, burn: &BurnRecord) -> Option<Vec<u8>> {
        if burn.block > self.checkpointed_block {
            return None;
        }
        let mut proof = burn.encode();
        proof.extend_from_slice(blake3::keyed_hash(&self.key, &burn.encode()).as_bytes());
        Some(proof)
    }
}

/// L1 side of the bridge.
#[derive(Debug, Clone)]
pub struct RootChainManager {
    /// Holds locked deposits and pays out exits
    pub predicate: Address,
    checkpoint_key: [u8; 32],
    next_sync_id: u64,
    outbox: Vec<StateSync>,
    processed_exits: HashSet<TxHash>,
}

impl RootChainManager {
    pub fn new(predicate: Address, checkpoint_key: [u8; 32]) -> Self {
        Self {
            predicate,
            checkpoint_key,
            next_sync_id: 0,
            outbox: Vec::new(),
            processed_exits: HashSet::new(),
        }
    }

    /// Locks `amount` from `from` and queues a mint to `recipient` on L2.
    pub fn deposit_for(
        &mut self,
        ledger: &mut TokenLedger,
        from: Address,
        recipient: Address,
        amount: u64,
        l1_block: u64,
    ) -> Result<u64> {
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }
        ledger.transfer(from, self.predicate, amount)?;
        let id = self.next_sync_id;
        self.next_sync_id += 1;
        self.outbox.push(StateSync {
            id,
            recipient,
            amount,
            l1_block,
        });
        debug!(%recipient, amount, l1_block, id, "Deposit locked for L2");
        Ok(id)
    }

    /// Hands pending state syncs to the relayer.
    pub fn drain_state_syncs(&mut self) -> Vec<StateSync> {
        std::mem::take(&mut self.outbox)
    }

    /// Verifies an exit proof and returns the burn it proves.
    pub fn verify_exit(&self, proof: &[u8]) -> Result<BurnRecord> {
        if proof.len() != BurnRecord::LEN + 32 {
            return Err(VaultError::InvalidProof);
        }
        let (body, mac) = proof.split_at(BurnRecord::LEN);
        let expected = blake3::keyed_hash(&self.checkpoint_key, body);
        let mut given = [0u8; 32];
        given.copy_from_slice(mac);
        if !constant_time_eq_32(expected.as_bytes(), &given) {
            return Err(VaultError::InvalidProof);
        }
        let burn = BurnRecord::decode(body).ok_or(VaultError::InvalidProof)?;
        if self.processed_exits.contains(&burn.tx_hash) {
            return Err(VaultError::ExitAlreadyProcessed);
        }
        Ok(burn)
    }

    /// Releases a proven burn from the predicate to its recipient.
    pub fn exit(&mut self, ledger: &mut TokenLedger, proof: &[u8]) -> Result<BurnRecord> {
        let burn = self.verify_exit(proof)?;
        ledger.transfer(self.predicate, burn.recipient, burn.amount)?;
        self.processed_exits.insert(burn.tx_hash);
        Ok(burn)
    }
}

impl InboundBridge for RootChainManager {
    fn claim(
        &mut self,
        ledger: &mut TokenLedger,
        recipient: Address,
        transfer: TransferDescriptor,
        proof: &[u8],
    ) -> Result<()> {
        let burn = self.verify_exit(proof)?;
        if burn.recipient != recipient {
            return Err(VaultError::InvalidProof);
        }
        if TransferDescriptor::new(burn.block, burn.amount) != transfer {
            return Err(VaultError::TransferMismatch);
        }
        self.exit(ledger, proof)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct SyncedDeposit {
    sync: StateSync,
    claimed: bool,
}

/// L2 side of the bridge.
#[derive(Debug, Clone, Default)]
pub struct ChildChainManager {
    synced: Vec<SyncedDeposit>,
    burns: Vec<BurnRecord>,
}

impl ChildChainManager {
    /// Mints a relayed L1 deposit to its recipient.
    pub fn on_state_sync(&mut self, ledger: &mut TokenLedger, sync: StateSync) -> Result<()> {
        ledger.mint(sync.recipient, sync.amount)?;
        self.synced.push(SyncedDeposit {
            sync,
            claimed: false,
        });
        Ok(())
    }

    /// Burns `amount` from `from` for release to `recipient` on L1.
    pub fn withdraw(
        &mut self,
        ledger: &mut TokenLedger,
        from: Address,
        recipient: Address,
        amount: u64,
        block: u64,
        tx_hash: TxHash,
    ) -> Result<BurnRecord> {
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }
        ledger.burn(from, amount)?;
        let burn = BurnRecord {
            tx_hash,
            block,
            from,
            recipient,
            amount,
        };
        self.burns.push(burn.clone());
        debug!(%tx_hash, amount, block, "Burned for L1 exit");
        Ok(burn)
    }

    pub fn burns(&self) -> &[BurnRecord] {
        &self.burns
    }

    pub fn burn(&self, tx_hash: TxHash) -> Option<&BurnRecord> {
        self.burns.iter().find(|burn| burn.tx_hash == tx_hash)
    }
}

impl InboundBridge for ChildChainManager {
    /// Funds were already minted by the state sync; claiming pins the
    /// transfer to a deposit that actually happened, once.
    fn claim(
        &mut self,
        ledger: &mut TokenLedger,
        recipient: Address,
        transfer: TransferDescriptor,
        _proof: &[u8],
    ) -> Result<()> {
        let deposit = self
            .synced
            .iter_mut()
            .find(|d| {
                !d.claimed
                    && d.sync.recipient == recipient
                    && d.sync.l1_block == transfer.block
                    && d.sync.amount == transfer.amount
            })
            .ok_or(VaultError::FundsNotArrived)?;
        if ledger.balance_of(recipient) < transfer.amount {
            return Err(VaultError::FundsNotArrived);
        }
        deposit.claimed = true;
        Ok(())
    }
}
