//! Generic messaging layer: per-emitter sequences, guardian attestation and
//! the VAA wire envelope.
//!
//! Guardians attest with keyed blake3 MACs in place of secp256k1 signatures;
//! the envelope layout otherwise follows the v1 VAA format so that bytes
//! fetched from a guardian API and bytes produced here parse the same way.

use std::collections::{BTreeMap, HashMap};

use constant_time_eq::constant_time_eq_32;
use tracing::trace;

use crate::{
    constants::{GUARDIAN_KEY_CONTEXT, GUARDIAN_SIGNATURE_LEN, VAA_VERSION},
    error::{Result, VaultError},
    types::{Address, ChainId, EmitterAddress},
};

/// Signed portion of a VAA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaaBody {
    pub timestamp: u32,
    pub nonce: u32,
    pub emitter_chain: ChainId,
    pub emitter_address: EmitterAddress,
    pub sequence: u64,
    pub consistency_level: u8,
    pub payload: Vec<u8>,
}

impl VaaBody {
    const HEADER_LEN: usize = 4 + 4 + 2 + 32 + 8 + 1;

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.nonce.to_be_bytes());
        out.extend_from_slice(&self.emitter_chain.to_be_bytes());
        out.extend_from_slice(self.emitter_address.as_bytes());
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.push(self.consistency_level);
        out.extend_from_slice(&self.payload);
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        Ok(Self {
            timestamp: u32::from_be_bytes(reader.array()?),
            nonce: u32::from_be_bytes(reader.array()?),
            emitter_chain: u16::from_be_bytes(reader.array()?),
            emitter_address: EmitterAddress(reader.array()?),
            sequence: u64::from_be_bytes(reader.array()?),
            consistency_level: reader.array::<1>()?[0],
            payload: reader.rest().to_vec(),
        })
    }

    pub fn digest(&self) -> [u8; 32] {
        *blake3::hash(&self.encode()).as_bytes()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardianSignature {
    pub guardian_index: u8,
    pub signature: [u8; GUARDIAN_SIGNATURE_LEN],
}

/// Verified action approval: a message body attested by a guardian quorum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vaa {
    pub guardian_set_index: u32,
    pub signatures: Vec<GuardianSignature>,
    pub body: VaaBody,
}

impl Vaa {
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = vec![VAA_VERSION];
        out.extend_from_slice(&self.guardian_set_index.to_be_bytes());
        out.push(self.signatures.len() as u8);
        for sig in &self.signatures {
            out.push(sig.guardian_index);
            out.extend_from_slice(&sig.signature);
        }
        out.extend_from_slice(&self.body.encode());
        out
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let [version] = reader.array::<1>()?;
        if version != VAA_VERSION {
            return Err(VaultError::MalformedVaa("unsupported version"));
        }
        let guardian_set_index = u32::from_be_bytes(reader.array()?);
        let [count] = reader.array::<1>()?;
        let mut signatures = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let [guardian_index] = reader.array::<1>()?;
            signatures.push(GuardianSignature {
                guardian_index,
                signature: reader.array()?,
            });
        }
        Ok(Self {
            guardian_set_index,
            signatures,
            body: VaaBody::decode(reader.rest())?,
        })
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        if self.bytes.len() < N {
            return Err(VaultError::MalformedVaa("truncated"));
        }
        let (head, tail) = self.bytes.split_at(N);
        self.bytes = tail;
        let mut out = [0u8; N];
        out.copy_from_slice(head);
        Ok(out)
    }

    fn rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.bytes)
    }
}

/// The guardian keys trusted for one guardian set index.
#[derive(Debug, Clone)]
pub struct GuardianSet {
    pub index: u32,
    keys: Vec<[u8; 32]>,
}

impl GuardianSet {
    pub fn new(index: u32, keys: Vec<[u8; 32]>) -> Self {
        Self { index, keys }
    }

    /// Deterministic set of `size` guardians for local networks.
    pub fn devnet(size: u8) -> Self {
        let keys = (0..size)
            .map(|i| blake3::derive_key(GUARDIAN_KEY_CONTEXT, &[i]))
            .collect();
        Self::new(0, keys)
    }

    /// Two thirds plus one.
    pub fn quorum(&self) -> usize {
        self.keys.len() * 2 / 3 + 1
    }

    pub fn sign(&self, body: VaaBody) -> Vaa {
        let digest = body.digest();
        let signatures = self
            .keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let mut signature = [0u8; GUARDIAN_SIGNATURE_LEN];
                signature[..32].copy_from_slice(blake3::keyed_hash(key, &digest).as_bytes());
                GuardianSignature {
                    guardian_index: i as u8,
                    signature,
                }
            })
            .collect();
        Vaa {
            guardian_set_index: self.index,
            signatures,
            body,
        }
    }

    /// Checks that a quorum of distinct guardians attested the VAA body.
    pub fn verify(&self, vaa: &Vaa) -> Result<()> {
        if vaa.guardian_set_index != self.index {
            return Err(VaultError::InvalidSignature);
        }
        let digest = vaa.body.digest();
        let mut last_index: Option<u8> = None;
        let mut valid = 0usize;
        for sig in &vaa.signatures {
            // Signatures must be sorted by guardian index without repeats.
            if last_index.is_some_and(|last| sig.guardian_index <= last) {
                return Err(VaultError::InvalidSignature);
            }
            last_index = Some(sig.guardian_index);

            let key = self
                .keys
                .get(sig.guardian_index as usize)
                .ok_or(VaultError::InvalidSignature)?;
            let expected = blake3::keyed_hash(key, &digest);
            let mut mac = [0u8; 32];
            mac.copy_from_slice(&sig.signature[..32]);
            if !constant_time_eq_32(expected.as_bytes(), &mac) {
                return Err(VaultError::InvalidSignature);
            }
            valid += 1;
        }
        if valid < self.quorum() {
            return Err(VaultError::InvalidSignature);
        }
        Ok(())
    }
}

/// Message published on a chain's messaging core, awaiting attestation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub body: VaaBody,
    pub block: u64,
}

/// On-chain messaging core of one chain.
#[derive(Debug, Clone)]
pub struct WormholeCore {
    pub chain_id: ChainId,
    guardian_set: GuardianSet,
    sequences: HashMap<EmitterAddress, u64>,
    published: Vec<PublishedMessage>,
}

impl WormholeCore {
    pub fn new(chain_id: ChainId, guardian_set: GuardianSet) -> Self {
        Self {
            chain_id,
            guardian_set,
            sequences: HashMap::new(),
            published: Vec::new(),
        }
    }

    /// Sequence the next message from `emitter` will carry.
    pub fn next_sequence(&self, emitter: Address) -> u64 {
        self.sequences
            .get(&emitter.to_emitter())
            .copied()
            .unwrap_or(0)
    }

    pub fn publish_message(
        &mut self,
        emitter: Address,
        nonce: u32,
        payload: Vec<u8>,
        consistency_level: u8,
        block: u64,
        timestamp: u32,
    ) -> u64 {
        let emitter_address = emitter.to_emitter();
        let counter = self.sequences.entry(emitter_address).or_insert(0);
        let sequence = *counter;
        *counter += 1;

        trace!(chain = self.chain_id, %emitter, sequence, "Message published");
        self.published.push(PublishedMessage {
            body: VaaBody {
                timestamp,
                nonce,
                emitter_chain: self.chain_id,
                emitter_address,
                sequence,
                consistency_level,
                payload,
            },
            block,
        });
        sequence
    }

    pub fn published(&self) -> &[PublishedMessage] {
        &self.published
    }

    pub fn parse_and_verify_vm(&self, bytes: &[u8]) -> Result<Vaa> {
        let vaa = Vaa::parse(bytes)?;
        self.guardian_set.verify(&vaa)?;
        Ok(vaa)
    }
}

/// Off-chain guardian network: observes published messages and serves signed VAAs.
#[derive(Debug, Clone)]
pub struct Guardians {
    set: GuardianSet,
    signed: BTreeMap<(ChainId, EmitterAddress, u64), Vec<u8>>,
    observed: HashMap<ChainId, usize>,
}

impl Guardians {
    pub fn new(set: GuardianSet) -> Self {
        Self {
            set,
            signed: BTreeMap::new(),
            observed: HashMap::new(),
        }
    }

    pub fn set(&self) -> &GuardianSet {
        &self.set
    }

    /// Signs every message published on `core` since the last observation.
    pub fn observe(&mut self, core: &WormholeCore) -> usize {
        let seen = self.observed.entry(core.chain_id).or_insert(0);
        let fresh = &core.published()[*seen..];
        for message in fresh {
            let body = &message.body;
            let key = (body.emitter_chain, body.emitter_address, body.sequence);
            self.signed
                .insert(key, self.set.sign(body.clone()).serialize());
        }
        *seen += fresh.len();
        fresh.len()
    }

    pub fn signed_vaa(
        &self,
        chain: ChainId,
        emitter: EmitterAddress,
        sequence: u64,
    ) -> Option<Vec<u8>> {
        self.signed.get(&(chain, emitter, sequence)).cloned()
    }
}
