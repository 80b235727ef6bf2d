use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::{
    constants::{DEFAULT_L1_RATIO, DEFAULT_L2_RATIO, DEFAULT_REBALANCE_DELTA},
    escrow::BridgeLock,
    strategy::StrategyEntry,
    types::{Address, TransferDescriptor},
};

/// Share accounting and strategy debt common to both chains.
#[derive(Debug)]
pub struct Vault {
    pub address: Address,
    /// Sole caller allowed to manage strategies and liquidate
    pub governance: Address,
    /// Shares outstanding, including those parked in the withdrawal queue
    pub total_shares: u64,
    /// Sum of `current_debt` over registered strategies
    pub total_debt: u64,
    /// Most recent TVL reported by the paired vault (zero on L1)
    pub other_chain_tvl: u64,
    /// Last bridge transfer this vault sent, checked by the receiving escrow
    pub last_transfer: TransferDescriptor,
    pub(crate) share_balances: HashMap<Address, u64>,
    /// Registered strategies, in withdrawal order
    pub(crate) strategies: Vec<StrategyEntry>,
    pub(crate) withdrawal_queue: Option<WithdrawalQueue>,
}

impl Vault {
    pub fn new(address: Address, governance: Address) -> Self {
        Self {
            address,
            governance,
            total_shares: 0,
            total_debt: 0,
            other_chain_tvl: 0,
            last_transfer: TransferDescriptor::default(),
            share_balances: HashMap::new(),
            strategies: Vec::new(),
            withdrawal_queue: None,
        }
    }

    /// Enables queueing of withdrawals that exceed available liquidity.
    pub fn with_withdrawal_queue(mut self) -> Self {
        self.withdrawal_queue = Some(WithdrawalQueue::default());
        self
    }
}

/// Emergency withdrawal requests waiting for liquidity, served FIFO.
#[derive(Debug, Default)]
pub(crate) struct WithdrawalQueue {
    pub next_ticket: u64,
    pub pending: VecDeque<QueuedWithdrawal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedWithdrawal {
    pub ticket: u64,
    pub owner: Address,
    pub shares: u64,
}

/// Ethereum-side vault.
#[derive(Debug)]
pub struct L1Vault {
    pub vault: Vault,
    /// Set when the L1 escrow cleared an L2 -> L1 transfer; reported with the next TVL
    pub received: bool,
    /// Amount L2 asked for that L1 has not yet sent
    pub debt_to_l2: u64,
}

impl L1Vault {
    pub fn new(vault: Vault) -> Self {
        Self {
            vault,
            received: false,
            debt_to_l2: 0,
        }
    }

    /// Reads and clears the receipt flag for an outgoing TVL report.
    pub fn take_received(&mut self) -> bool {
        std::mem::take(&mut self.received)
    }
}

/// Polygon-side vault.
#[derive(Debug)]
pub struct L2Vault {
    pub vault: Vault,
    pub lock: BridgeLock,
    /// TVL L1 last reported
    pub l1_tvl: u64,
    /// Funds burned towards L1 that L1 has not yet acknowledged
    pub in_transit_to_l1: u64,
    pub l1_ratio: u64,
    pub l2_ratio: u64,
    /// Minimum imbalance that triggers a rebalance
    pub rebalance_delta: u64,
    pub last_tvl_report_block: u64,
}

impl L2Vault {
    pub fn new(vault: Vault) -> Self {
        Self {
            vault,
            lock: BridgeLock::default(),
            l1_tvl: 0,
            in_transit_to_l1: 0,
            l1_ratio: DEFAULT_L1_RATIO,
            l2_ratio: DEFAULT_L2_RATIO,
            rebalance_delta: DEFAULT_REBALANCE_DELTA,
            last_tvl_report_block: 0,
        }
    }

    /// Keeps the base vault's view of remote TVL equal to reported plus in-flight funds.
    pub(crate) fn sync_other_chain_tvl(&mut self) {
        self.vault.other_chain_tvl = self.l1_tvl.saturating_add(self.in_transit_to_l1);
    }
}
