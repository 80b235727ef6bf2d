use crate::{
    constants::ASSET_DECIMALS,
    error::{Result, VaultError},
    math::{bps_of, convert_to_assets, convert_to_shares, Rounding},
    state::{QueuedWithdrawal, Vault},
    strategy::StrategyParams,
    token::TokenLedger,
    types::Address,
};

impl Vault {
    /// Idle assets held at the vault address.
    pub fn local_balance(&self, ledger: &TokenLedger) -> u64 {
        ledger.balance_of(self.address)
    }

    /// Assets on this chain: idle balance plus debt lent to strategies.
    pub fn vault_tvl(&self, ledger: &TokenLedger) -> Result<u64> {
        self.local_balance(ledger)
            .checked_add(self.total_debt)
            .ok_or(VaultError::MathOverflow)
    }

    /// Assets backing this vault's shares, including the paired chain's report.
    pub fn global_tvl(&self, ledger: &TokenLedger) -> Result<u64> {
        self.vault_tvl(ledger)?
            .checked_add(self.other_chain_tvl)
            .ok_or(VaultError::MathOverflow)
    }

    pub fn balance_of(&self, owner: Address) -> u64 {
        self.share_balances.get(&owner).copied().unwrap_or(0)
    }

    /// Assets redeemable for one whole share (10^decimals units).
    pub fn share_price(&self, ledger: &TokenLedger) -> Result<u64> {
        let one = 10u64.pow(ASSET_DECIMALS as u32);
        if self.total_shares == 0 {
            return Ok(one);
        }
        convert_to_assets(one, self.global_tvl(ledger)?, self.total_shares, Rounding::Floor)
    }

    pub fn preview_deposit(&self, ledger: &TokenLedger, assets: u64) -> Result<u64> {
        convert_to_shares(
            assets,
            self.global_tvl(ledger)?,
            self.total_shares,
            Rounding::Floor,
        )
    }

    pub fn preview_withdraw(&self, ledger: &TokenLedger, shares: u64) -> Result<u64> {
        if shares == 0 {
            return Ok(0);
        }
        convert_to_assets(
            shares,
            self.global_tvl(ledger)?,
            self.total_shares,
            Rounding::Floor,
        )
    }

    /// Assets the vault can pay out now: idle balance plus liquid strategy debt.
    pub fn available_liquidity(&self, ledger: &TokenLedger) -> Result<u64> {
        self.strategies
            .iter()
            .map(|entry| {
                entry
                    .params
                    .current_debt
                    .min(entry.adapter.liquid_assets(ledger))
            })
            .try_fold(self.local_balance(ledger), |acc, liquid| {
                acc.checked_add(liquid).ok_or(VaultError::MathOverflow)
            })
    }

    pub fn total_debt_ratio(&self) -> u64 {
        self.strategies.iter().map(|s| s.params.debt_ratio).sum()
    }

    pub fn strategy_params(&self, strategy: Address) -> Option<&StrategyParams> {
        self.strategies
            .iter()
            .find(|entry| entry.address() == strategy)
            .map(|entry| &entry.params)
    }

    pub fn strategy_version(&self, strategy: Address) -> Option<u32> {
        self.strategies
            .iter()
            .find(|entry| entry.address() == strategy)
            .map(|entry| entry.adapter.version())
    }

    /// Registered strategies in the order withdrawals draw from them.
    pub fn withdrawal_order(&self) -> Vec<Address> {
        self.strategies.iter().map(|entry| entry.address()).collect()
    }

    /// max(0, vaultTVL × debtRatio / MAX_BPS − currentDebt)
    pub fn credit_available(&self, ledger: &TokenLedger, strategy: Address) -> Result<u64> {
        let params = &self.strategies[self.strategy_index(strategy)?].params;
        let limit = bps_of(self.vault_tvl(ledger)?, params.debt_ratio)?;
        Ok(limit.saturating_sub(params.current_debt))
    }

    /// Debt a strategy holds above its allowance; all of it once the ratio is zero.
    pub fn debt_outstanding(&self, ledger: &TokenLedger, strategy: Address) -> Result<u64> {
        let params = &self.strategies[self.strategy_index(strategy)?].params;
        if params.debt_ratio == 0 {
            return Ok(params.current_debt);
        }
        let limit = bps_of(self.vault_tvl(ledger)?, params.debt_ratio)?;
        Ok(params.current_debt.saturating_sub(limit))
    }

    pub fn withdrawal_queue_size(&self) -> u64 {
        self.withdrawal_queue
            .as_ref()
            .map_or(0, |queue| queue.pending.len() as u64)
    }

    pub fn queued_withdrawals(&self) -> Vec<QueuedWithdrawal> {
        self.withdrawal_queue
            .as_ref()
            .map(|queue| queue.pending.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn strategy_index(&self, strategy: Address) -> Result<usize> {
        self.strategies
            .iter()
            .position(|entry| entry.address() == strategy)
            .ok_or(VaultError::UnknownStrategy)
    }
}
