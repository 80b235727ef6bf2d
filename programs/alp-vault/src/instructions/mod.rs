pub mod deposit;
pub mod governance;
pub mod rebalance;
pub mod report;
pub mod view;
pub mod withdraw;

pub use rebalance::RebalanceAction;
pub use report::ReportOutcome;
pub use withdraw::WithdrawOutcome;
