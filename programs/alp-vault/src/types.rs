use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wormhole chain id.
pub type ChainId = u16;

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                <[u8; $len]>::try_from(bytes).ok().map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self, f)
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix("0x").unwrap_or(s);
                let mut bytes = [0u8; $len];
                hex::decode_to_slice(raw, &mut bytes)?;
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// 20-byte account or contract address.
    Address,
    20,
    "0x"
);

fixed_bytes!(
    /// 32-byte emitter id as used by the guardian network; rendered without a prefix.
    EmitterAddress,
    32,
    ""
);

fixed_bytes!(TxHash, 32, "0x");

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    /// Deterministic address for a labelled deployment or test account.
    pub fn derive(label: &str) -> Self {
        let hash = blake3::hash(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash.as_bytes()[..20]);
        Self(bytes)
    }

    /// Left-pads the address to the 32-byte emitter form.
    pub fn to_emitter(self) -> EmitterAddress {
        let mut bytes = [0u8; 32];
        bytes[12..].copy_from_slice(&self.0);
        EmitterAddress(bytes)
    }
}

/// `(block, amount)` pair identifying a cross-chain transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransferDescriptor {
    pub block: u64,
    pub amount: u64,
}

impl TransferDescriptor {
    pub fn new(block: u64, amount: u64) -> Self {
        Self { block, amount }
    }
}
