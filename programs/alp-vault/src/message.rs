use serde::Serialize;

use crate::error::{Result, VaultError};

const TAG_TVL_REPORT: u8 = 1;
const TAG_FUND_REQUEST: u8 = 2;
const TAG_FUND_TRANSFER_REPORT: u8 = 3;

const WORD: usize = 32;

/// Cross-chain message body: a tag byte followed by 32-byte big-endian words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Payload {
    /// L1 -> L2: L1's TVL and whether L1 cleared the last L2 -> L1 transfer.
    TvlReport { tvl: u64, received: bool },
    /// L2 -> L1: amount L2 wants moved to it.
    FundRequest { amount: u64 },
    /// Either direction: a bridge transfer the sender just made.
    FundTransferReport { amount: u64, block: u64 },
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::TvlReport { .. } => "tvl report",
            Payload::FundRequest { .. } => "fund request",
            Payload::FundTransferReport { .. } => "fund transfer report",
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let (tag, words): (u8, Vec<u64>) = match *self {
            Payload::TvlReport { tvl, received } => (TAG_TVL_REPORT, vec![tvl, received as u64]),
            Payload::FundRequest { amount } => (TAG_FUND_REQUEST, vec![amount]),
            Payload::FundTransferReport { amount, block } => {
                (TAG_FUND_TRANSFER_REPORT, vec![amount, block])
            }
        };
        let mut out = Vec::with_capacity(1 + words.len() * WORD);
        out.push(tag);
        for word in words {
            out.extend_from_slice(&[0u8; WORD - 8]);
            out.extend_from_slice(&word.to_be_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (&tag, body) = bytes.split_first().ok_or(VaultError::MalformedPayload)?;
        if body.len() % WORD != 0 {
            return Err(VaultError::MalformedPayload);
        }
        let words = body
            .chunks_exact(WORD)
            .map(decode_word)
            .collect::<Result<Vec<u64>>>()?;

        match (tag, words.as_slice()) {
            (TAG_TVL_REPORT, &[tvl, received]) if received <= 1 => Ok(Payload::TvlReport {
                tvl,
                received: received == 1,
            }),
            (TAG_FUND_REQUEST, &[amount]) => Ok(Payload::FundRequest { amount }),
            (TAG_FUND_TRANSFER_REPORT, &[amount, block]) => {
                Ok(Payload::FundTransferReport { amount, block })
            }
            _ => Err(VaultError::MalformedPayload),
        }
    }
}

fn decode_word(word: &[u8]) -> Result<u64> {
    let (high, low) = word.split_at(WORD - 8);
    if high.iter().any(|b| *b != 0) {
        return Err(VaultError::MalformedPayload);
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(low);
    Ok(u64::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tvl_report_layout() {
        let bytes = Payload::TvlReport {
            tvl: 1_000,
            received: true,
        }
        .encode();
        assert_eq!(bytes.len(), 65);
        assert_eq!(bytes[0], TAG_TVL_REPORT);
        assert_eq!(&bytes[31..33], &[0x03, 0xe8]);
        assert_eq!(bytes[64], 1);
    }

    #[test]
    fn test_decode_matches_encode() {
        let payload = Payload::FundTransferReport {
            amount: 100,
            block: 42,
        };
        assert_eq!(Payload::decode(&payload.encode()).unwrap(), payload);
    }

    #[test]
    fn test_decode_rejects_malformed_bodies() {
        assert!(Payload::decode(&[]).is_err());
        let mut bytes = Payload::FundRequest { amount: 5 }.encode();
        bytes.push(0);
        assert!(Payload::decode(&bytes).is_err());

        let mut bytes = Payload::FundRequest { amount: 5 }.encode();
        bytes[1] = 1;
        assert!(Payload::decode(&bytes).is_err());

        let mut bytes = Payload::TvlReport {
            tvl: 5,
            received: false,
        }
        .encode();
        bytes[64] = 2;
        assert!(Payload::decode(&bytes).is_err());

        let mut bytes = Payload::FundRequest { amount: 5 }.encode();
        bytes[0] = 9;
        assert!(Payload::decode(&bytes).is_err());
    }
}
