use serde::Serialize;

use crate::types::{Address, EmitterAddress};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deposit {
    pub vault: Address,
    pub owner: Address,
    pub assets: u64,
    pub shares: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Withdraw {
    pub vault: Address,
    pub owner: Address,
    pub assets: u64,
    pub shares: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawalQueued {
    pub vault: Address,
    pub owner: Address,
    pub ticket: u64,
    pub shares: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyAdded {
    pub strategy: Address,
    pub version: u32,
    pub debt_ratio: u64,
    pub min_debt_per_harvest: u64,
    pub max_debt_per_harvest: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyRemoved {
    pub strategy: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyDebtRatioUpdated {
    pub strategy: Address,
    pub debt_ratio: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawalQueueUpdated {
    pub queue: Vec<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyReported {
    pub strategy: Address,
    pub gain: u64,
    pub loss: u64,
    pub debt_paid: u64,
    pub credit: u64,
    pub current_debt: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Liquidation {
    pub vault: Address,
    pub requested: u64,
    pub freed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessagePublished {
    pub emitter: EmitterAddress,
    pub sequence: u64,
    pub kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageConsumed {
    pub router: Address,
    pub sequence: u64,
    pub kind: &'static str,
}

/// L1 published its TVL together with the pending receipt acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendTvl {
    pub tvl: u64,
    pub received: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiveTvl {
    pub tvl: u64,
    pub received: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestFromL1 {
    pub amount: u64,
}

/// L2 burned `amount` on the native bridge towards the L1 escrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferToL1 {
    pub amount: u64,
    pub block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundRequestReceived {
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferToL2 {
    pub amount: u64,
    pub block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundsCleared {
    pub escrow: Address,
    pub block: u64,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum Event {
    Deposit(Deposit),
    Withdraw(Withdraw),
    WithdrawalQueued(WithdrawalQueued),
    StrategyAdded(StrategyAdded),
    StrategyRemoved(StrategyRemoved),
    StrategyDebtRatioUpdated(StrategyDebtRatioUpdated),
    WithdrawalQueueUpdated(WithdrawalQueueUpdated),
    StrategyReported(StrategyReported),
    Liquidation(Liquidation),
    MessagePublished(MessagePublished),
    MessageConsumed(MessageConsumed),
    SendTvl(SendTvl),
    ReceiveTvl(ReceiveTvl),
    RequestFromL1(RequestFromL1),
    TransferToL1(TransferToL1),
    FundRequestReceived(FundRequestReceived),
    TransferToL2(TransferToL2),
    FundsCleared(FundsCleared),
}

macro_rules! impl_from_event {
    ($($name:ident),* $(,)?) => {
        $(
            impl From<$name> for Event {
                fn from(event: $name) -> Self {
                    Event::$name(event)
                }
            }
        )*
    };
}

impl_from_event!(
    Deposit,
    Withdraw,
    WithdrawalQueued,
    StrategyAdded,
    StrategyRemoved,
    StrategyDebtRatioUpdated,
    WithdrawalQueueUpdated,
    StrategyReported,
    Liquidation,
    MessagePublished,
    MessageConsumed,
    SendTvl,
    ReceiveTvl,
    RequestFromL1,
    TransferToL1,
    FundRequestReceived,
    TransferToL2,
    FundsCleared,
);
