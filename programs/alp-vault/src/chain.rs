//! Deployed contract set on each chain and its transaction entry points.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    error::{Result, VaultError},
    escrow::BridgeEscrow,
    events::{self, Event},
    instructions::{RebalanceAction, WithdrawOutcome},
    message::Payload,
    pos_bridge::{ChildChainManager, RootChainManager, StateSync},
    router::{InboundMessage, MessageRouter},
    state::{L1Vault, L2Vault, Vault},
    strategy::Strategy,
    token::TokenLedger,
    types::{Address, ChainId, TransferDescriptor, TxHash},
    wormhole::WormholeCore,
};

const GENESIS_TIMESTAMP: u32 = 1_650_000_000;
const BLOCK_TIME_SECS: u32 = 12;

/// Result of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block: u64,
    pub events: Vec<Event>,
}

/// Execution context handed to a transaction body.
#[derive(Debug)]
pub struct TxContext {
    pub tx_hash: TxHash,
    pub block: u64,
    pub timestamp: u32,
    events: Vec<Event>,
}

impl TxContext {
    pub fn emit(&mut self, event: impl Into<Event>) {
        self.events.push(event.into());
    }
}

/// Chain-specific contracts around the shared vault logic.
pub trait ChainSide {
    fn vault(&self) -> &Vault;
    fn vault_mut(&mut self) -> &mut Vault;
}

#[derive(Debug)]
pub struct L1Side {
    pub vault: L1Vault,
    pub root: RootChainManager,
    /// Escrow on L2 that receives L1 -> L2 deposits
    pub l2_escrow: Address,
}

impl ChainSide for L1Side {
    fn vault(&self) -> &Vault {
        &self.vault.vault
    }

    fn vault_mut(&mut self) -> &mut Vault {
        &mut self.vault.vault
    }
}

#[derive(Debug)]
pub struct L2Side {
    pub vault: L2Vault,
    pub child: ChildChainManager,
    /// Escrow on L1 that receives L2 -> L1 exits
    pub l1_escrow: Address,
}

impl ChainSide for L2Side {
    fn vault(&self) -> &Vault {
        &self.vault.vault
    }

    fn vault_mut(&mut self) -> &mut Vault {
        &mut self.vault.vault
    }
}

/// One chain: its asset ledger, messaging core and the vault's contracts.
///
/// A failing transaction mines no block, emits nothing and leaves no receipt.
/// [`Chain::transact`] does not roll state back, so every entry point
/// validates its inputs before the first mutation.
#[derive(Debug)]
pub struct Chain<S> {
    pub chain_id: ChainId,
    pub ledger: TokenLedger,
    pub core: WormholeCore,
    pub router: MessageRouter,
    pub escrow: BridgeEscrow,
    pub side: S,
    block: u64,
    tx_count: u64,
    receipts: Vec<TxReceipt>,
}

pub type L1Chain = Chain<L1Side>;
pub type L2Chain = Chain<L2Side>;

impl<S: ChainSide> Chain<S> {
    pub fn new(
        chain_id: ChainId,
        ledger: TokenLedger,
        core: WormholeCore,
        router: MessageRouter,
        escrow: BridgeEscrow,
        side: S,
    ) -> Self {
        Self {
            chain_id,
            ledger,
            core,
            router,
            escrow,
            side,
            block: 0,
            tx_count: 0,
            receipts: Vec::new(),
        }
    }

    pub fn block(&self) -> u64 {
        self.block
    }

    pub fn receipts(&self) -> &[TxReceipt] {
        &self.receipts
    }

    pub fn vault(&self) -> &Vault {
        self.side.vault()
    }

    /// Credits `to` with freshly issued asset (faucet).
    pub fn mint(&mut self, to: Address, amount: u64) -> Result<()> {
        self.ledger.mint(to, amount)
    }

    pub fn vault_tvl(&self) -> Result<u64> {
        self.side.vault().vault_tvl(&self.ledger)
    }

    /// Runs `body` as one transaction in the next block.
    pub fn transact(
        &mut self,
        body: impl FnOnce(&mut Self, &mut TxContext) -> Result<()>,
    ) -> Result<TxReceipt> {
        let block = self.block + 1;
        let mut seed = Vec::with_capacity(18);
        seed.extend_from_slice(&self.chain_id.to_be_bytes());
        seed.extend_from_slice(&self.tx_count.to_be_bytes());
        seed.extend_from_slice(&block.to_be_bytes());
        let mut ctx = TxContext {
            tx_hash: TxHash(*blake3::hash(&seed).as_bytes()),
            block,
            timestamp: GENESIS_TIMESTAMP.wrapping_add((block as u32).wrapping_mul(BLOCK_TIME_SECS)),
            events: Vec::new(),
        };

        body(self, &mut ctx)?;

        self.block = block;
        self.tx_count += 1;
        let receipt = TxReceipt {
            tx_hash: ctx.tx_hash,
            block,
            events: ctx.events,
        };
        self.receipts.push(receipt.clone());
        Ok(receipt)
    }

    pub fn deposit(&mut self, owner: Address, assets: u64) -> Result<TxReceipt> {
        self.transact(|chain, ctx| {
            let vault = chain.side.vault_mut();
            let shares = vault.deposit(&mut chain.ledger, owner, assets)?;
            ctx.emit(events::Deposit {
                vault: vault.address,
                owner,
                assets,
                shares,
            });
            Ok(())
        })
    }

    pub fn withdraw(&mut self, owner: Address, shares: u64) -> Result<TxReceipt> {
        self.transact(|chain, ctx| {
            let vault = chain.side.vault_mut();
            match vault.withdraw(&mut chain.ledger, owner, shares)? {
                WithdrawOutcome::Paid { assets } => ctx.emit(events::Withdraw {
                    vault: vault.address,
                    owner,
                    assets,
                    shares,
                }),
                WithdrawOutcome::Queued { ticket } => ctx.emit(events::WithdrawalQueued {
                    vault: vault.address,
                    owner,
                    ticket,
                    shares,
                }),
            }
            Ok(())
        })
    }

    /// Settles up to `limit` queued withdrawals; reverts if none can be paid.
    pub fn process_withdrawal_queue(&mut self, limit: u64) -> Result<TxReceipt> {
        self.transact(|chain, ctx| {
            let vault = chain.side.vault_mut();
            let queued = vault.withdrawal_queue_size();
            let settled = vault.process_withdrawal_queue(&mut chain.ledger, limit)?;
            if queued > 0 && settled.is_empty() {
                return Err(VaultError::InsufficientLiquidity);
            }
            for (request, assets) in settled {
                ctx.emit(events::Withdraw {
                    vault: vault.address,
                    owner: request.owner,
                    assets,
                    shares: request.shares,
                });
            }
            Ok(())
        })
    }

    pub fn add_strategy(
        &mut self,
        caller: Address,
        adapter: Box<dyn Strategy>,
        debt_ratio: u64,
        min_debt_per_harvest: u64,
        max_debt_per_harvest: u64,
    ) -> Result<TxReceipt> {
        self.transact(|chain, ctx| {
            let event = events::StrategyAdded {
                strategy: adapter.address(),
                version: adapter.version(),
                debt_ratio,
                min_debt_per_harvest,
                max_debt_per_harvest,
            };
            chain.side.vault_mut().add_strategy(
                caller,
                adapter,
                debt_ratio,
                min_debt_per_harvest,
                max_debt_per_harvest,
                ctx.block,
            )?;
            ctx.emit(event);
            Ok(())
        })
    }

    pub fn remove_strategy(&mut self, caller: Address, strategy: Address) -> Result<TxReceipt> {
        self.transact(|chain, ctx| {
            chain.side.vault_mut().remove_strategy(caller, strategy)?;
            ctx.emit(events::StrategyRemoved { strategy });
            Ok(())
        })
    }

    pub fn update_strategy_debt_ratio(
        &mut self,
        caller: Address,
        strategy: Address,
        debt_ratio: u64,
    ) -> Result<TxReceipt> {
        self.update_many_strategy_debt_ratios(caller, &[(strategy, debt_ratio)])
    }

    pub fn update_many_strategy_debt_ratios(
        &mut self,
        caller: Address,
        updates: &[(Address, u64)],
    ) -> Result<TxReceipt> {
        self.transact(|chain, ctx| {
            chain
                .side
                .vault_mut()
                .update_many_strategy_debt_ratios(caller, updates)?;
            for (strategy, debt_ratio) in updates {
                ctx.emit(events::StrategyDebtRatioUpdated {
                    strategy: *strategy,
                    debt_ratio: *debt_ratio,
                });
            }
            Ok(())
        })
    }

    pub fn set_withdrawal_queue(&mut self, caller: Address, order: &[Address]) -> Result<TxReceipt> {
        self.transact(|chain, ctx| {
            chain.side.vault_mut().set_withdrawal_queue(caller, order)?;
            ctx.emit(events::WithdrawalQueueUpdated {
                queue: order.to_vec(),
            });
            Ok(())
        })
    }

    pub fn liquidate(&mut self, caller: Address, amount: u64) -> Result<TxReceipt> {
        self.transact(|chain, ctx| {
            let vault = chain.side.vault_mut();
            let freed = vault.liquidate(caller, &mut chain.ledger, amount)?;
            ctx.emit(events::Liquidation {
                vault: vault.address,
                requested: amount,
                freed,
            });
            Ok(())
        })
    }

    /// Strategy harvest; `strategy` is the caller.
    pub fn report(
        &mut self,
        strategy: Address,
        gain: u64,
        loss: u64,
        debt_payment: u64,
    ) -> Result<TxReceipt> {
        self.transact(|chain, ctx| {
            let outcome = chain.side.vault_mut().report(
                &mut chain.ledger,
                strategy,
                gain,
                loss,
                debt_payment,
                ctx.block,
            )?;
            ctx.emit(events::StrategyReported {
                strategy,
                gain: outcome.gain,
                loss: outcome.loss,
                debt_paid: outcome.debt_paid,
                credit: outcome.credit,
                current_debt: outcome.current_debt,
            });
            Ok(())
        })
    }

    fn publish(&mut self, ctx: &mut TxContext, payload: Payload) -> u64 {
        let sequence = self
            .router
            .send(&mut self.core, &payload, ctx.block, ctx.timestamp);
        ctx.emit(events::MessagePublished {
            emitter: self.router.address.to_emitter(),
            sequence,
            kind: payload.kind(),
        });
        sequence
    }

    fn consume(&mut self, ctx: &mut TxContext, message: &InboundMessage) -> Result<()> {
        self.router.consume(message)?;
        ctx.emit(events::MessageConsumed {
            router: self.router.address,
            sequence: message.sequence,
            kind: message.payload.kind(),
        });
        Ok(())
    }
}

fn unexpected(expected: &'static str, got: &Payload) -> VaultError {
    VaultError::UnexpectedPayload {
        expected,
        got: got.kind(),
    }
}

impl Chain<L1Side> {
    /// Publishes L1's TVL for L2, carrying and clearing the receipt flag.
    pub fn send_tvl(&mut self) -> Result<TxReceipt> {
        self.transact(|chain, ctx| {
            let tvl = chain.side.vault.vault.vault_tvl(&chain.ledger)?;
            let received = chain.side.vault.take_received();
            chain.publish(ctx, Payload::TvlReport { tvl, received });
            ctx.emit(events::SendTvl { tvl, received });
            info!(tvl, received, "L1 TVL sent");
            Ok(())
        })
    }

    /// Serves an L2 fund request: divests as needed and bridges the funds to the L2 escrow.
    pub fn receive_fund_request(&mut self, vaa: &[u8]) -> Result<TxReceipt> {
        self.transact(|chain, ctx| {
            let message = chain.router.check(&chain.core, vaa)?;
            let Payload::FundRequest { amount } = message.payload else {
                return Err(unexpected("fund request", &message.payload));
            };
            if amount == 0 {
                return Err(VaultError::ZeroAmount);
            }
            if chain.side.vault.vault.available_liquidity(&chain.ledger)? == 0 {
                return Err(VaultError::InsufficientLiquidity);
            }

            chain.side.vault.debt_to_l2 = amount;
            ctx.emit(events::FundRequestReceived { amount });

            let vault_address = chain.side.vault.vault.address;
            let sent = chain.side.vault.vault.free_funds(&mut chain.ledger, amount)?;
            if sent < amount {
                warn!(requested = amount, sent, "L1 could only partially serve fund request");
            }
            chain.side.root.deposit_for(
                &mut chain.ledger,
                vault_address,
                chain.side.l2_escrow,
                sent,
                ctx.block,
            )?;
            chain.side.vault.vault.last_transfer = TransferDescriptor::new(ctx.block, sent);
            chain.publish(
                ctx,
                Payload::FundTransferReport {
                    amount: sent,
                    block: ctx.block,
                },
            );
            ctx.emit(events::TransferToL2 {
                amount: sent,
                block: ctx.block,
            });
            chain.consume(ctx, &message)
        })
    }

    /// Clears an L2 -> L1 transfer reported by `vaa` using the bridge exit proof.
    pub fn receive_funds(&mut self, vaa: &[u8], exit_proof: &[u8]) -> Result<TxReceipt> {
        self.transact(|chain, ctx| {
            let message = chain.router.check(&chain.core, vaa)?;
            let Payload::FundTransferReport { amount, block } = message.payload else {
                return Err(unexpected("fund transfer report", &message.payload));
            };
            chain.escrow.clear_fund(
                &mut chain.ledger,
                &mut chain.side.root,
                TransferDescriptor::new(block, amount),
                exit_proof,
            )?;
            chain.side.vault.received = true;
            ctx.emit(events::FundsCleared {
                escrow: chain.escrow.address,
                block,
                amount,
            });
            info!(amount, l2_block = block, "L2 funds cleared into L1 vault");
            chain.consume(ctx, &message)
        })
    }
}

impl Chain<L2Side> {
    /// Records L1's TVL and, when no rebalance is in flight, starts one if needed.
    pub fn receive_tvl(&mut self, vaa: &[u8]) -> Result<TxReceipt> {
        self.transact(|chain, ctx| {
            let message = chain.router.check(&chain.core, vaa)?;
            let Payload::TvlReport { tvl, received } = message.payload else {
                return Err(unexpected("tvl report", &message.payload));
            };

            let lock = chain.side.vault.lock;
            let unlocked = lock.is_idle() || (received && !lock.can_transfer_to_l1());
            let action = if unlocked {
                chain.side.vault.plan_rebalance(&chain.ledger, tvl)?
            } else {
                RebalanceAction::None
            };

            chain.side.vault.record_l1_tvl(tvl, received, ctx.block);
            ctx.emit(events::ReceiveTvl { tvl, received });

            match action {
                RebalanceAction::None => {}
                RebalanceAction::RequestFromL1(amount) => {
                    chain.side.vault.lock.begin_request_from_l1()?;
                    chain.publish(ctx, Payload::FundRequest { amount });
                    ctx.emit(events::RequestFromL1 { amount });
                    info!(amount, "Requested funds from L1");
                }
                RebalanceAction::TransferToL1(amount) => chain.transfer_to_l1(ctx, amount)?,
            }
            chain.consume(ctx, &message)
        })
    }

    fn transfer_to_l1(&mut self, ctx: &mut TxContext, amount: u64) -> Result<()> {
        let vault_address = self.side.vault.vault.address;
        let sent = self.side.vault.vault.free_funds(&mut self.ledger, amount)?;
        if sent == 0 {
            warn!(amount, "No liquid funds to transfer to L1");
            return Ok(());
        }
        self.side.child.withdraw(
            &mut self.ledger,
            vault_address,
            self.side.l1_escrow,
            sent,
            ctx.block,
            ctx.tx_hash,
        )?;
        self.side.vault.vault.last_transfer = TransferDescriptor::new(ctx.block, sent);
        self.side.vault.record_transfer_to_l1(sent)?;
        self.publish(
            ctx,
            Payload::FundTransferReport {
                amount: sent,
                block: ctx.block,
            },
        );
        ctx.emit(events::TransferToL1 {
            amount: sent,
            block: ctx.block,
        });
        info!(amount = sent, "Transferred funds to L1");
        Ok(())
    }

    /// Clears an L1 -> L2 transfer into the vault and ends the request.
    pub fn receive_funds(&mut self, vaa: &[u8]) -> Result<TxReceipt> {
        self.transact(|chain, ctx| {
            let message = chain.router.check(&chain.core, vaa)?;
            let Payload::FundTransferReport { amount, block } = message.payload else {
                return Err(unexpected("fund transfer report", &message.payload));
            };
            if chain.side.vault.lock.can_request_from_l1() {
                return Err(VaultError::BridgeLocked("no L1 -> L2 rebalance in progress"));
            }
            chain.escrow.clear_fund(
                &mut chain.ledger,
                &mut chain.side.child,
                TransferDescriptor::new(block, amount),
                &[],
            )?;
            chain.side.vault.record_funds_from_l1(amount)?;
            ctx.emit(events::FundsCleared {
                escrow: chain.escrow.address,
                block,
                amount,
            });
            info!(amount, l1_block = block, "L1 funds cleared into L2 vault");
            chain.consume(ctx, &message)
        })
    }

    /// Mints a relayed L1 deposit; executed by the bridge, not by users.
    pub fn apply_state_sync(&mut self, sync: StateSync) -> Result<()> {
        debug!(id = sync.id, amount = sync.amount, "State sync applied");
        self.side.child.on_state_sync(&mut self.ledger, sync)
    }

    /// Hash of the most recent transaction that burned funds towards L1.
    pub fn latest_transfer_to_l1_tx(&self) -> Option<TxHash> {
        self.receipts
            .iter()
            .rev()
            .find(|receipt| {
                receipt
                    .events
                    .iter()
                    .any(|event| matches!(event, Event::TransferToL1(_)))
            })
            .map(|receipt| receipt.tx_hash)
    }
}
