use tracing::{debug, warn};

use crate::{
    error::{Result, VaultError},
    math::{convert_to_assets, Rounding},
    state::{QueuedWithdrawal, Vault},
    token::TokenLedger,
    types::Address,
};

/// How a withdrawal request was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawOutcome {
    Paid { assets: u64 },
    Queued { ticket: u64 },
}

impl Vault {
    /// Burn shares for their pro-rata share of global TVL (floor rounding - protects vault)
    ///
    /// Payment comes from idle funds first, then strategies in withdrawal
    /// order. When that is not enough the request is queued if the vault has
    /// a withdrawal queue, and rejected otherwise.
    pub fn withdraw(
        &mut self,
        ledger: &mut TokenLedger,
        owner: Address,
        shares: u64,
    ) -> Result<WithdrawOutcome> {
        if shares == 0 {
            return Err(VaultError::ZeroAmount);
        }
        let balance = self.balance_of(owner);
        if balance < shares {
            return Err(VaultError::InsufficientShares);
        }

        let assets = convert_to_assets(
            shares,
            self.global_tvl(ledger)?,
            self.total_shares,
            Rounding::Floor,
        )?;

        if assets > self.available_liquidity(ledger)? {
            let Some(queue) = self.withdrawal_queue.as_mut() else {
                return Err(VaultError::InsufficientLiquidity);
            };
            let ticket = queue.next_ticket;
            queue.next_ticket += 1;
            queue.pending.push_back(QueuedWithdrawal {
                ticket,
                owner,
                shares,
            });
            self.share_balances.insert(owner, balance - shares);
            warn!(vault = %self.address, %owner, shares, ticket, "Withdrawal queued for liquidity");
            return Ok(WithdrawOutcome::Queued { ticket });
        }

        self.pay_out(ledger, owner, shares, assets)?;
        self.share_balances.insert(owner, balance - shares);
        Ok(WithdrawOutcome::Paid { assets })
    }

    /// Settles up to `limit` queued withdrawals in FIFO order, stopping early
    /// when liquidity runs out.
    ///
    /// Each request is priced at the TVL current when it is served.
    pub fn process_withdrawal_queue(
        &mut self,
        ledger: &mut TokenLedger,
        limit: u64,
    ) -> Result<Vec<(QueuedWithdrawal, u64)>> {
        let mut settled = Vec::new();
        while (settled.len() as u64) < limit {
            let Some(next) = self
                .withdrawal_queue
                .as_ref()
                .and_then(|queue| queue.pending.front().cloned())
            else {
                break;
            };

            let assets = convert_to_assets(
                next.shares,
                self.global_tvl(ledger)?,
                self.total_shares,
                Rounding::Floor,
            )?;
            if assets > self.available_liquidity(ledger)? {
                break;
            }

            self.pay_out(ledger, next.owner, next.shares, assets)?;
            if let Some(queue) = self.withdrawal_queue.as_mut() {
                queue.pending.pop_front();
            }
            debug!(vault = %self.address, ticket = next.ticket, assets, "Queued withdrawal settled");
            settled.push((next, assets));
        }
        Ok(settled)
    }

    /// Pulls idle funds up to `amount` out of strategies, in withdrawal order.
    ///
    /// Returns the idle balance made available, capped at `amount`.
    pub fn free_funds(&mut self, ledger: &mut TokenLedger, amount: u64) -> Result<u64> {
        let local = self.local_balance(ledger);
        if local >= amount {
            return Ok(amount);
        }

        let mut needed = amount - local;
        for entry in self.strategies.iter_mut() {
            if needed == 0 {
                break;
            }
            let wanted = needed.min(entry.params.current_debt);
            if wanted == 0 {
                continue;
            }
            let freed = entry.adapter.divest(ledger, self.address, wanted)?;
            entry.params.current_debt -= freed;
            self.total_debt = self
                .total_debt
                .checked_sub(freed)
                .ok_or(VaultError::MathOverflow)?;
            needed -= freed;
        }
        Ok(amount - needed)
    }

    /// Burns `shares` (already removed from the owner) and sends `assets`.
    fn pay_out(
        &mut self,
        ledger: &mut TokenLedger,
        owner: Address,
        shares: u64,
        assets: u64,
    ) -> Result<()> {
        let total_shares = self
            .total_shares
            .checked_sub(shares)
            .ok_or(VaultError::MathOverflow)?;
        if self.free_funds(ledger, assets)? < assets {
            return Err(VaultError::InsufficientLiquidity);
        }
        ledger.transfer(self.address, owner, assets)?;
        self.total_shares = total_shares;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::HoldingStrategy;

    struct Setup {
        vault: Vault,
        ledger: TokenLedger,
        user: Address,
        strategy: Address,
    }

    fn setup(queue: bool) -> Setup {
        let governance = Address::derive("governance");
        let user = Address::derive("user");
        let strategy = Address::derive("strategy");
        let mut ledger = TokenLedger::new("USDC", 6);
        ledger.mint(user, 1_000).unwrap();
        let mut vault = Vault::new(Address::derive("vault"), governance);
        if queue {
            vault = vault.with_withdrawal_queue();
        }
        vault.deposit(&mut ledger, user, 1_000).unwrap();
        vault
            .add_strategy(
                governance,
                Box::new(HoldingStrategy::new(strategy, 1).with_locked(300)),
                8_000,
                0,
                u64::MAX,
                1,
            )
            .unwrap();
        vault.report(&mut ledger, strategy, 0, 0, 0, 2).unwrap();
        Setup {
            vault,
            ledger,
            user,
            strategy,
        }
    }

    #[test]
    fn test_withdraw_draws_from_strategies_when_idle_is_short() {
        let Setup {
            mut vault,
            mut ledger,
            user,
            strategy,
            ..
        } = setup(false);
        assert_eq!(vault.local_balance(&ledger), 200);

        let outcome = vault.withdraw(&mut ledger, user, 500).unwrap();
        assert_eq!(outcome, WithdrawOutcome::Paid { assets: 500 });
        assert_eq!(ledger.balance_of(user), 500);
        assert_eq!(vault.strategy_params(strategy).unwrap().current_debt, 500);
        assert_eq!(vault.total_debt, 500);
        assert_eq!(vault.total_shares, 500);
    }

    #[test]
    fn test_withdraw_beyond_liquidity_is_rejected() {
        let Setup {
            mut vault,
            mut ledger,
            user,
            ..
        } = setup(false);
        // 200 idle + 500 liquid in the strategy; 300 is locked.
        assert_eq!(vault.available_liquidity(&ledger).unwrap(), 700);
        assert_eq!(
            vault.withdraw(&mut ledger, user, 800),
            Err(VaultError::InsufficientLiquidity)
        );
        assert_eq!(vault.balance_of(user), 1_000);
        assert_eq!(vault.total_debt, 800);
    }

    #[test]
    fn test_withdraw_more_shares_than_owned_fails() {
        let Setup {
            mut vault,
            mut ledger,
            user,
            ..
        } = setup(false);
        assert_eq!(
            vault.withdraw(&mut ledger, user, 1_001),
            Err(VaultError::InsufficientShares)
        );
    }

    #[test]
    fn test_queued_withdrawal_is_settled_once_liquid() {
        let Setup {
            mut vault,
            mut ledger,
            user,
            strategy,
            ..
        } = setup(true);

        let outcome = vault.withdraw(&mut ledger, user, 800).unwrap();
        assert_eq!(outcome, WithdrawOutcome::Queued { ticket: 0 });
        assert_eq!(vault.balance_of(user), 200);
        assert_eq!(vault.total_shares, 1_000);
        assert!(vault.process_withdrawal_queue(&mut ledger, 10).unwrap().is_empty());

        // Funds arrive from the paired chain: TVL 1600, liquidity 800 idle + 500.
        ledger.mint(vault.address, 600).unwrap();
        let settled = vault.process_withdrawal_queue(&mut ledger, 10).unwrap();
        assert_eq!(settled.len(), 1);
        // 800 of 1000 shares over a TVL of 1600
        assert_eq!(settled[0].1, 1_280);
        assert_eq!(ledger.balance_of(user), 1_280);
        assert_eq!(vault.total_shares, 200);
        assert_eq!(vault.strategy_params(strategy).unwrap().current_debt, 320);
        assert!(vault.queued_withdrawals().is_empty());
    }

    #[test]
    fn test_queue_processing_respects_batch_limit() {
        let Setup {
            mut vault,
            mut ledger,
            user,
            ..
        } = setup(true);
        for _ in 0..3 {
            let outcome = vault.withdraw(&mut ledger, user, 250).unwrap();
            assert!(matches!(outcome, WithdrawOutcome::Queued { .. }));
        }
        assert_eq!(vault.withdrawal_queue_size(), 3);

        ledger.mint(vault.address, 2_000).unwrap();
        let settled = vault.process_withdrawal_queue(&mut ledger, 2).unwrap();
        let tickets: Vec<u64> = settled.iter().map(|(request, _)| request.ticket).collect();
        assert_eq!(tickets, vec![0, 1]);
        assert_eq!(vault.withdrawal_queue_size(), 1);
        assert_eq!(vault.process_withdrawal_queue(&mut ledger, 0).unwrap(), vec![]);
    }
}
