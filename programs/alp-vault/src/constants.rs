use crate::types::ChainId;

/// Basis-point denominator for strategy debt ratios.
pub const MAX_BPS: u64 = 10_000;

/// Wormhole chain ids of the two deployments.
pub const CHAIN_ID_ETH: ChainId = 2;
pub const CHAIN_ID_POLYGON: ChainId = 5;

pub const ASSET_DECIMALS: u8 = 6;

/// Default target split: L1 holds 9 parts, L2 holds 1.
pub const DEFAULT_L1_RATIO: u64 = 9;
pub const DEFAULT_L2_RATIO: u64 = 1;
pub const DEFAULT_REBALANCE_DELTA: u64 = 0;

/// Most queued withdrawals settled by one dequeue transaction.
pub const DEQUEUE_BATCH_SIZE: u64 = 100;

pub const VAA_VERSION: u8 = 1;
pub const CONSISTENCY_LEVEL_FINALIZED: u8 = 1;
pub const GUARDIAN_SIGNATURE_LEN: usize = 65;

/// keccak256("Transfer(address,address,uint256)"), the event the exit-proof service indexes burns by.
pub const ERC20_TRANSFER_EVENT_SIG: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

pub const GUARDIAN_KEY_CONTEXT: &str = "alp-vault 2022-06 guardian signing key";
pub const CHECKPOINT_KEY_CONTEXT: &str = "alp-vault 2022-06 checkpoint signing key";
