use std::collections::HashMap;

use crate::{
    error::{Result, VaultError},
    types::Address,
};

/// Balances of the stablecoin on one chain.
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    pub symbol: String,
    pub decimals: u8,
    balances: HashMap<Address, u64>,
    total_supply: u64,
}

impl TokenLedger {
    pub fn new(symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            ..Default::default()
        }
    }

    pub fn balance_of(&self, owner: Address) -> u64 {
        self.balances.get(&owner).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    pub fn mint(&mut self, to: Address, amount: u64) -> Result<()> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(VaultError::MathOverflow)?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(VaultError::MathOverflow)?;
        self.total_supply = supply;
        self.balances.insert(to, balance);
        Ok(())
    }

    pub fn burn(&mut self, from: Address, amount: u64) -> Result<()> {
        let balance = self
            .balance_of(from)
            .checked_sub(amount)
            .ok_or(VaultError::InsufficientBalance)?;
        self.total_supply = self
            .total_supply
            .checked_sub(amount)
            .ok_or(VaultError::MathOverflow)?;
        self.balances.insert(from, balance);
        Ok(())
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: u64) -> Result<()> {
        if from == to {
            return if self.balance_of(from) >= amount {
                Ok(())
            } else {
                Err(VaultError::InsufficientBalance)
            };
        }
        let from_balance = self
            .balance_of(from)
            .checked_sub(amount)
            .ok_or(VaultError::InsufficientBalance)?;
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(VaultError::MathOverflow)?;
        self.balances.insert(from, from_balance);
        self.balances.insert(to, to_balance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_moves_balance_and_keeps_supply() {
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        let mut ledger = TokenLedger::new("USDC", 6);
        ledger.mint(alice, 100).unwrap();
        ledger.transfer(alice, bob, 40).unwrap();
        assert_eq!(ledger.balance_of(alice), 60);
        assert_eq!(ledger.balance_of(bob), 40);
        assert_eq!(ledger.total_supply(), 100);
    }

    #[test]
    fn test_overdraft_leaves_balances_untouched() {
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        let mut ledger = TokenLedger::new("USDC", 6);
        ledger.mint(alice, 10).unwrap();
        assert_eq!(
            ledger.transfer(alice, bob, 11),
            Err(VaultError::InsufficientBalance)
        );
        assert_eq!(ledger.burn(bob, 1), Err(VaultError::InsufficientBalance));
        assert_eq!(ledger.balance_of(alice), 10);
        assert_eq!(ledger.balance_of(bob), 0);
    }
}
