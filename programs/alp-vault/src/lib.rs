//! Alpine cross-chain stablecoin vaults.
//!
//! A behavioural model of the vault contracts deployed on Ethereum (L1) and
//! Polygon (L2), together with the bridge and messaging infrastructure that
//! links them:
//!
//! - [`state::Vault`]: share accounting against a TVL that spans both chains,
//!   plus a strategy registry with debt ratios and harvest reports
//! - [`escrow::BridgeEscrow`]: releases bridged funds only when they match the
//!   sending vault's last transfer
//! - [`router::MessageRouter`]: accepts guardian-attested messages from its
//!   peer strictly in order
//! - [`chain`] and [`network`]: the deployed contract set per chain, its
//!   transaction entry points, and the off-chain actors (guardians, state
//!   sync relayer, checkpoint authority)

pub mod chain;
pub mod constants;
pub mod error;
pub mod escrow;
pub mod events;
pub mod instructions;
pub mod math;
pub mod message;
pub mod network;
pub mod pos_bridge;
pub mod router;
pub mod state;
pub mod strategy;
pub mod token;
pub mod types;
pub mod wormhole;

pub use chain::{L1Chain, L2Chain, TxReceipt};
pub use error::{Result, VaultError};
pub use escrow::BridgeLock;
pub use events::Event;
pub use message::Payload;
pub use network::{Deployment, Network};
pub use types::{Address, ChainId, EmitterAddress, TransferDescriptor, TxHash};
