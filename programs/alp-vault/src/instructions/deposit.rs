use crate::{
    error::{Result, VaultError},
    math::{convert_to_shares, Rounding},
    state::Vault,
    token::TokenLedger,
    types::Address,
};

impl Vault {
    /// Deposit assets, minting shares at the global TVL (floor rounding - protects vault)
    pub fn deposit(&mut self, ledger: &mut TokenLedger, owner: Address, assets: u64) -> Result<u64> {
        if assets == 0 {
            return Err(VaultError::ZeroAmount);
        }

        let shares = convert_to_shares(
            assets,
            self.global_tvl(ledger)?,
            self.total_shares,
            Rounding::Floor,
        )?;
        if shares == 0 {
            return Err(VaultError::DepositTooSmall);
        }

        let total_shares = self
            .total_shares
            .checked_add(shares)
            .ok_or(VaultError::MathOverflow)?;
        let balance = self
            .balance_of(owner)
            .checked_add(shares)
            .ok_or(VaultError::MathOverflow)?;

        ledger.transfer(owner, self.address, assets)?;

        self.total_shares = total_shares;
        self.share_balances.insert(owner, balance);
        Ok(shares)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Vault, TokenLedger, Address) {
        let user = Address::derive("user");
        let mut ledger = TokenLedger::new("USDC", 6);
        ledger.mint(user, 10_000).unwrap();
        let vault = Vault::new(Address::derive("vault"), Address::derive("governance"));
        (vault, ledger, user)
    }

    #[test]
    fn test_first_deposit_mints_one_to_one() {
        let (mut vault, mut ledger, user) = setup();
        assert_eq!(vault.deposit(&mut ledger, user, 1_000).unwrap(), 1_000);
        assert_eq!(vault.balance_of(user), 1_000);
        assert_eq!(vault.local_balance(&ledger), 1_000);
    }

    #[test]
    fn test_deposit_prices_against_remote_tvl() {
        let (mut vault, mut ledger, user) = setup();
        vault.deposit(&mut ledger, user, 1_000).unwrap();
        // Paired chain reports 1000: global TVL is now 2000 for 1000 shares.
        vault.other_chain_tvl = 1_000;
        assert_eq!(vault.deposit(&mut ledger, user, 1_000).unwrap(), 500);
        assert_eq!(vault.total_shares, 1_500);
    }

    #[test]
    fn test_rejected_deposit_leaves_state_untouched() {
        let (mut vault, mut ledger, user) = setup();
        assert_eq!(vault.deposit(&mut ledger, user, 0), Err(VaultError::ZeroAmount));
        assert_eq!(
            vault.deposit(&mut ledger, user, 20_000),
            Err(VaultError::InsufficientBalance)
        );
        assert_eq!(vault.total_shares, 0);
        assert_eq!(ledger.balance_of(user), 10_000);
    }

    #[test]
    fn test_deposit_against_unowned_remote_tvl_is_rejected() {
        let (mut vault, mut ledger, user) = setup();
        vault.other_chain_tvl = 900;
        assert_eq!(
            vault.deposit(&mut ledger, user, 1_000),
            Err(VaultError::UnownedAssets)
        );
        assert_eq!(vault.total_shares, 0);
        assert_eq!(ledger.balance_of(user), 10_000);
    }

    #[test]
    fn test_dust_deposit_is_rejected() {
        let (mut vault, mut ledger, user) = setup();
        vault.deposit(&mut ledger, user, 10).unwrap();
        vault.other_chain_tvl = 1_000;
        assert_eq!(vault.deposit(&mut ledger, user, 50), Err(VaultError::DepositTooSmall));
    }
}
