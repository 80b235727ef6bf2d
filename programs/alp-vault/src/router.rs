use tracing::debug;

use crate::{
    constants::CONSISTENCY_LEVEL_FINALIZED,
    error::{Result, VaultError},
    message::Payload,
    types::{Address, ChainId, EmitterAddress},
    wormhole::WormholeCore,
};

/// A verified message from the paired router that has not been consumed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundMessage {
    pub sequence: u64,
    pub payload: Payload,
}

/// Sends messages to, and accepts messages from, exactly one peer router.
///
/// Inbound messages must arrive in the peer's publication order: each
/// accepted message consumes `next_valid_nonce`, so a VAA cannot be replayed
/// and none can be skipped.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    pub address: Address,
    pub peer_chain: ChainId,
    pub peer: EmitterAddress,
    next_valid_nonce: u64,
}

impl MessageRouter {
    pub fn new(address: Address, peer_chain: ChainId, peer: Address) -> Self {
        Self {
            address,
            peer_chain,
            peer: peer.to_emitter(),
            next_valid_nonce: 0,
        }
    }

    pub fn next_valid_nonce(&self) -> u64 {
        self.next_valid_nonce
    }

    /// Publishes `payload` on the local core and returns its sequence.
    pub fn send(
        &self,
        core: &mut WormholeCore,
        payload: &Payload,
        block: u64,
        timestamp: u32,
    ) -> u64 {
        core.publish_message(
            self.address,
            0,
            payload.encode(),
            CONSISTENCY_LEVEL_FINALIZED,
            block,
            timestamp,
        )
    }

    /// Verifies that `vaa` is the peer's next message. Does not consume it.
    pub fn check(&self, core: &WormholeCore, vaa: &[u8]) -> Result<InboundMessage> {
        let vm = core.parse_and_verify_vm(vaa)?;
        if vm.body.emitter_chain != self.peer_chain || vm.body.emitter_address != self.peer {
            return Err(VaultError::UnexpectedEmitter);
        }
        if vm.body.sequence != self.next_valid_nonce {
            return Err(VaultError::InvalidSequence {
                expected: self.next_valid_nonce,
                got: vm.body.sequence,
            });
        }
        Ok(InboundMessage {
            sequence: vm.body.sequence,
            payload: Payload::decode(&vm.body.payload)?,
        })
    }

    /// Marks a checked message as consumed.
    pub fn consume(&mut self, message: &InboundMessage) -> Result<()> {
        if message.sequence != self.next_valid_nonce {
            return Err(VaultError::InvalidSequence {
                expected: self.next_valid_nonce,
                got: message.sequence,
            });
        }
        self.next_valid_nonce += 1;
        debug!(router = %self.address, sequence = message.sequence, "Message consumed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wormhole::{GuardianSet, Guardians};

    struct Pair {
        l1_core: WormholeCore,
        l2_core: WormholeCore,
        guardians: Guardians,
        l1: MessageRouter,
        l2: MessageRouter,
    }

    fn pair() -> Pair {
        let set = GuardianSet::devnet(1);
        let l1_address = Address::derive("l1-router");
        let l2_address = Address::derive("l2-router");
        Pair {
            l1_core: WormholeCore::new(2, set.clone()),
            l2_core: WormholeCore::new(5, set.clone()),
            guardians: Guardians::new(set),
            l1: MessageRouter::new(l1_address, 5, l2_address),
            l2: MessageRouter::new(l2_address, 2, l1_address),
        }
    }

    fn signed(pair: &mut Pair, sequence: u64) -> Vec<u8> {
        pair.guardians.observe(&pair.l1_core);
        pair.guardians
            .signed_vaa(2, pair.l1.address.to_emitter(), sequence)
            .unwrap()
    }

    #[test]
    fn test_messages_are_consumed_in_order_once() {
        let mut p = pair();
        for tvl in [10, 20] {
            p.l1.send(&mut p.l1_core, &Payload::TvlReport { tvl, received: false }, 1, 1);
        }
        let first = signed(&mut p, 0);
        let second = signed(&mut p, 1);

        assert_eq!(
            p.l2.check(&p.l2_core, &second),
            Err(VaultError::InvalidSequence { expected: 0, got: 1 })
        );

        let message = p.l2.check(&p.l2_core, &first).unwrap();
        // Checking does not consume.
        assert_eq!(p.l2.next_valid_nonce(), 0);
        p.l2.consume(&message).unwrap();
        assert_eq!(p.l2.next_valid_nonce(), 1);

        assert!(p.l2.check(&p.l2_core, &first).is_err());
        assert!(p.l2.consume(&message).is_err());
        let message = p.l2.check(&p.l2_core, &second).unwrap();
        assert_eq!(
            message.payload,
            Payload::TvlReport {
                tvl: 20,
                received: false
            }
        );
    }

    #[test]
    fn test_foreign_emitter_is_rejected() {
        let mut p = pair();
        let stranger = Address::derive("stranger");
        p.l1_core.publish_message(
            stranger,
            0,
            Payload::FundRequest { amount: 1 }.encode(),
            1,
            1,
            1,
        );
        p.guardians.observe(&p.l1_core);
        let vaa = p.guardians.signed_vaa(2, stranger.to_emitter(), 0).unwrap();
        assert_eq!(p.l2.check(&p.l2_core, &vaa), Err(VaultError::UnexpectedEmitter));
    }
}
