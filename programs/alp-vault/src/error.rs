use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Arithmetic overflow")]
    MathOverflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Insufficient shares balance")]
    InsufficientShares,

    #[error("Insufficient token balance")]
    InsufficientBalance,

    #[error("Insufficient liquidity to cover withdrawal")]
    InsufficientLiquidity,

    #[error("Deposit amount too small to mint shares")]
    DepositTooSmall,

    #[error("Vault holds assets that no shares own")]
    UnownedAssets,

    #[error("Unauthorized - caller is not {0}")]
    Unauthorized(&'static str),

    #[error("Strategy already registered")]
    StrategyAlreadyAdded,

    #[error("Unknown strategy")]
    UnknownStrategy,

    #[error("Total debt ratio would exceed 10000 bps")]
    DebtRatioExceeded,

    #[error("Strategy still holds debt")]
    StrategyHasDebt,

    #[error("Minimum debt per harvest exceeds maximum")]
    InvalidHarvestBounds,

    #[error("Reported loss exceeds strategy debt")]
    LossExceedsDebt,

    #[error("Withdrawal queue must list every strategy exactly once")]
    InvalidWithdrawalQueue,

    #[error("Bridge locked: {0}")]
    BridgeLocked(&'static str),

    #[error("Invalid guardian signatures")]
    InvalidSignature,

    #[error("Malformed VAA: {0}")]
    MalformedVaa(&'static str),

    #[error("Message emitted by an unexpected chain or contract")]
    UnexpectedEmitter,

    #[error("Invalid sequence: expected {expected}, got {got}")]
    InvalidSequence { expected: u64, got: u64 },

    #[error("Malformed message payload")]
    MalformedPayload,

    #[error("Unexpected payload: expected {expected}, got {got}")]
    UnexpectedPayload {
        expected: &'static str,
        got: &'static str,
    },

    #[error("Transfer does not match the sender vault's last transfer")]
    TransferMismatch,

    #[error("Transfer already cleared")]
    StaleTransfer,

    #[error("Invalid exit proof")]
    InvalidProof,

    #[error("Exit already processed")]
    ExitAlreadyProcessed,

    #[error("Bridged funds have not arrived")]
    FundsNotArrived,
}

pub type Result<T> = std::result::Result<T, VaultError>;
