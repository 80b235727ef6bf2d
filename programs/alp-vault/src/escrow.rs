use serde::Serialize;
use tracing::debug;

use crate::{
    error::{Result, VaultError},
    token::TokenLedger,
    types::{Address, TransferDescriptor},
};

/// Side of the native bridge that releases funds addressed to an escrow.
pub trait InboundBridge {
    /// Credits `recipient` with the bridged `transfer`, consuming `proof`.
    ///
    /// Fails if the transfer cannot be proven or has already been claimed.
    fn claim(
        &mut self,
        ledger: &mut TokenLedger,
        recipient: Address,
        transfer: TransferDescriptor,
        proof: &[u8],
    ) -> Result<()>;
}

/// Receiving end of cross-chain transfers for one vault.
///
/// Funds land here from the native bridge and are only released into the
/// paired vault once they match the sending vault's last transfer record.
#[derive(Debug, Clone)]
pub struct BridgeEscrow {
    pub address: Address,
    pub vault: Address,
    pub last_cleared: Option<TransferDescriptor>,
}

impl BridgeEscrow {
    pub fn new(address: Address, vault: Address) -> Self {
        Self {
            address,
            vault,
            last_cleared: None,
        }
    }

    pub fn balance(&self, ledger: &TokenLedger) -> u64 {
        ledger.balance_of(self.address)
    }

    /// Clears `transfer` into the vault.
    ///
    /// `transfer` is the sending vault's last transfer as carried by the
    /// verified cross-chain message; the bridge claim proves the escrow
    /// actually received it.
    pub fn clear_fund(
        &mut self,
        ledger: &mut TokenLedger,
        bridge: &mut dyn InboundBridge,
        transfer: TransferDescriptor,
        proof: &[u8],
    ) -> Result<()> {
        if transfer.amount == 0 {
            return Err(VaultError::ZeroAmount);
        }
        if let Some(last) = self.last_cleared {
            if transfer.block <= last.block {
                return Err(VaultError::StaleTransfer);
            }
        }

        bridge.claim(ledger, self.address, transfer, proof)?;
        ledger.transfer(self.address, self.vault, transfer.amount)?;
        self.last_cleared = Some(transfer);

        debug!(
            escrow = %self.address,
            block_num = transfer.block,
            amount = transfer.amount,
            "Cleared bridged funds"
        );
        Ok(())
    }
}

/// Which rebalance direction, if any, is in flight on L2.
///
/// The two directions are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeLock {
    #[default]
    Idle,
    /// L2 burned funds towards L1 and waits for L1 to acknowledge receipt
    TransferToL1,
    /// L2 asked L1 for funds and waits for them to be cleared
    RequestFromL1,
}

impl BridgeLock {
    /// Lock state behind the two flags a deployed L2 vault exposes; `None`
    /// when both are false.
    pub fn from_flags(can_transfer_to_l1: bool, can_request_from_l1: bool) -> Option<Self> {
        match (can_transfer_to_l1, can_request_from_l1) {
            (true, true) => Some(BridgeLock::Idle),
            (false, true) => Some(BridgeLock::TransferToL1),
            (true, false) => Some(BridgeLock::RequestFromL1),
            (false, false) => None,
        }
    }

    pub fn can_transfer_to_l1(self) -> bool {
        self != BridgeLock::TransferToL1
    }

    pub fn can_request_from_l1(self) -> bool {
        self != BridgeLock::RequestFromL1
    }

    pub fn is_idle(self) -> bool {
        self == BridgeLock::Idle
    }

    pub fn begin_transfer_to_l1(&mut self) -> Result<()> {
        self.begin(BridgeLock::TransferToL1)
    }

    pub fn begin_request_from_l1(&mut self) -> Result<()> {
        self.begin(BridgeLock::RequestFromL1)
    }

    /// Releases a transfer-to-L1 lock; returns whether one was held.
    pub fn acknowledge_transfer_to_l1(&mut self) -> bool {
        if *self == BridgeLock::TransferToL1 {
            *self = BridgeLock::Idle;
            true
        } else {
            false
        }
    }

    pub fn complete_request_from_l1(&mut self) -> Result<()> {
        if *self != BridgeLock::RequestFromL1 {
            return Err(VaultError::BridgeLocked("no L1 -> L2 rebalance in progress"));
        }
        *self = BridgeLock::Idle;
        Ok(())
    }

    fn begin(&mut self, next: BridgeLock) -> Result<()> {
        if !self.is_idle() {
            return Err(VaultError::BridgeLocked("rebalance already in progress"));
        }
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bridge that releases from a fixed stash anything up to `limit`.
    struct StashBridge {
        stash: Address,
        claims: usize,
        limit: u64,
    }

    impl InboundBridge for StashBridge {
        fn claim(
            &mut self,
            ledger: &mut TokenLedger,
            recipient: Address,
            transfer: TransferDescriptor,
            _proof: &[u8],
        ) -> Result<()> {
            if transfer.amount > self.limit {
                return Err(VaultError::TransferMismatch);
            }
            self.claims += 1;
            ledger.transfer(self.stash, recipient, transfer.amount)
        }
    }

    fn setup() -> (TokenLedger, BridgeEscrow, StashBridge) {
        let stash = Address::derive("stash");
        let mut ledger = TokenLedger::new("USDC", 6);
        ledger.mint(stash, 1_000).unwrap();
        let escrow = BridgeEscrow::new(Address::derive("escrow"), Address::derive("vault"));
        (
            ledger,
            escrow,
            StashBridge {
                stash,
                claims: 0,
                limit: 100,
            },
        )
    }

    #[test]
    fn test_clear_fund_moves_funds_into_vault() {
        let (mut ledger, mut escrow, mut bridge) = setup();
        escrow
            .clear_fund(&mut ledger, &mut bridge, TransferDescriptor::new(7, 100), &[])
            .unwrap();
        assert_eq!(ledger.balance_of(escrow.vault), 100);
        assert_eq!(escrow.balance(&ledger), 0);
        assert_eq!(escrow.last_cleared, Some(TransferDescriptor::new(7, 100)));
    }

    #[test]
    fn test_clear_fund_keeps_state_when_bridge_rejects_claim() {
        let (mut ledger, mut escrow, mut bridge) = setup();
        let result = escrow.clear_fund(&mut ledger, &mut bridge, TransferDescriptor::new(7, 101), &[]);
        assert_eq!(result, Err(VaultError::TransferMismatch));
        assert_eq!(bridge.claims, 0);
        assert_eq!(escrow.last_cleared, None);
        assert_eq!(ledger.balance_of(escrow.vault), 0);
    }

    #[test]
    fn test_clear_fund_rejects_stale_transfer() {
        let (mut ledger, mut escrow, mut bridge) = setup();
        let record = TransferDescriptor::new(7, 100);
        escrow.clear_fund(&mut ledger, &mut bridge, record, &[]).unwrap();
        let result = escrow.clear_fund(&mut ledger, &mut bridge, record, &[]);
        assert_eq!(result, Err(VaultError::StaleTransfer));
        assert_eq!(ledger.balance_of(escrow.vault), 100);
    }

    #[test]
    fn test_bridge_lock_directions_are_exclusive() {
        let mut lock = BridgeLock::default();
        assert!(lock.can_transfer_to_l1() && lock.can_request_from_l1());

        lock.begin_transfer_to_l1().unwrap();
        assert!(!lock.can_transfer_to_l1());
        assert!(lock.can_request_from_l1());
        assert!(lock.begin_request_from_l1().is_err());

        assert!(lock.acknowledge_transfer_to_l1());
        assert!(!lock.acknowledge_transfer_to_l1());

        lock.begin_request_from_l1().unwrap();
        assert!(lock.begin_transfer_to_l1().is_err());
        lock.complete_request_from_l1().unwrap();
        assert!(lock.complete_request_from_l1().is_err());
    }

    #[test]
    fn test_bridge_lock_from_flags() {
        for lock in [
            BridgeLock::Idle,
            BridgeLock::TransferToL1,
            BridgeLock::RequestFromL1,
        ] {
            let flags = (lock.can_transfer_to_l1(), lock.can_request_from_l1());
            assert_eq!(BridgeLock::from_flags(flags.0, flags.1), Some(lock));
        }
        assert_eq!(BridgeLock::from_flags(false, false), None);
    }
}
