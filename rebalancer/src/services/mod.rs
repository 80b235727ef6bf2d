//! External services the rebalancer pulls proofs and addresses from.

pub mod address_book;
pub mod exit_proof;
pub mod poll;
pub mod wormhole;

use alp_vault::{ChainId, EmitterAddress, TxHash};
use async_trait::async_trait;

use crate::error::ServiceError;

pub use address_book::AddressBook;
pub use exit_proof::ExitProofApi;
pub use poll::Poller;
pub use wormhole::GuardianApi;

/// Source of guardian-signed messages.
#[async_trait]
pub trait VaaSource: Send + Sync {
    /// `Ok(None)` while the guardians have not signed the message yet.
    async fn signed_vaa(
        &self,
        chain: ChainId,
        emitter: EmitterAddress,
        sequence: u64,
    ) -> Result<Option<Vec<u8>>, ServiceError>;
}

/// Source of native-bridge exit proofs for L2 burns.
#[async_trait]
pub trait ExitProofSource: Send + Sync {
    /// `Ok(None)` until the burn is checkpointed on L1.
    async fn exit_payload(
        &self,
        tx_hash: TxHash,
        event_signature: &str,
    ) -> Result<Option<Vec<u8>>, ServiceError>;
}
