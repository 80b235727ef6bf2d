//! The five-step rebalancing state machine.
//!
//! Every step reads on-chain state, bails out without side effects when its
//! precondition does not hold, fetches whatever proofs it needs (reporting
//! "not ready" if they never show up) and submits at most one transaction.
//! Correctness rests entirely on on-chain checks, so [`Rebalancer::run`] can be
//! invoked at any frequency, including by overlapping callers.

use std::sync::Arc;

use alp_vault::{
    constants::{CHAIN_ID_ETH, CHAIN_ID_POLYGON, DEQUEUE_BATCH_SIZE, ERC20_TRANSFER_EVENT_SIG},
    wormhole::Vaa,
    BridgeLock, Payload, TxHash,
};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    chains::{message_pending, ChainResult, Contracts},
    error::ChainError,
    services::{ExitProofSource, Poller, VaaSource},
    types::{RunReport, StepKind, StepOutcome, StepStatus},
};

pub struct Rebalancer {
    contracts: Contracts,
    vaas: Arc<dyn VaaSource>,
    exit_proofs: Arc<dyn ExitProofSource>,
    poller: Poller,
}

/// Maps a transaction result onto a step status.
fn submitted(
    step: StepKind,
    result: ChainResult<TxHash>,
    success: &str,
    failure: &str,
) -> StepStatus {
    match result {
        Ok(tx_hash) => StepStatus::submitted(step, tx_hash, success),
        Err(ChainError::Reverted(e)) => StepStatus::skipped(
            step,
            StepOutcome::TransactionReverted,
            format!("{failure}. Error: {e}"),
        ),
        Err(ChainError::Network(e)) => StepStatus::skipped(
            step,
            StepOutcome::NetworkFailure,
            format!("{failure}. Error: {e}"),
        ),
    }
}

/// Whether L2 can act on a fresh TVL report in lock state `lock`.
fn tvl_report_due(lock: Option<BridgeLock>, received: bool) -> bool {
    match lock {
        Some(BridgeLock::Idle) => true,
        // Only a report carrying the receipt releases the lock.
        Some(BridgeLock::TransferToL1) => received,
        Some(BridgeLock::RequestFromL1) | None => false,
    }
}

fn precondition(step: StepKind, message: &str) -> StepStatus {
    StepStatus::skipped(step, StepOutcome::PreconditionNotMet, message)
}

fn not_ready(step: StepKind, message: impl Into<String>) -> StepStatus {
    StepStatus::skipped(step, StepOutcome::ProofUnavailable, message)
}

impl Rebalancer {
    pub fn new(
        contracts: Contracts,
        vaas: Arc<dyn VaaSource>,
        exit_proofs: Arc<dyn ExitProofSource>,
        poller: Poller,
    ) -> Self {
        Self {
            contracts,
            vaas,
            exit_proofs,
            poller,
        }
    }

    /// Runs every step once, in order; no step failure stops the others.
    pub async fn run(&self) -> RunReport {
        let started_at = Utc::now();
        let mut steps = Vec::with_capacity(StepKind::ALL.len());
        for kind in StepKind::ALL {
            let status = self.step(kind).await;
            log_status(&status);
            steps.push(status);
        }
        RunReport {
            started_at,
            finished_at: Utc::now(),
            steps,
        }
    }

    /// Drains the L2 emergency withdrawal queue as far as liquidity allows.
    pub async fn process_withdrawal_queue(&self) -> StepStatus {
        let status = self.step(StepKind::ProcessWithdrawalQueue).await;
        log_status(&status);
        status
    }

    pub async fn step(&self, kind: StepKind) -> StepStatus {
        let result = match kind {
            StepKind::SendTvlFromL1 => self.try_sending_tvl_from_l1().await,
            StepKind::ReceiveTvlInL2 => self.try_receiving_tvl_in_l2().await,
            StepKind::ReceiveFundInL1 => self.try_receiving_fund_in_l1().await,
            StepKind::TriggerTransferFromL1 => self.try_triggering_transfer_from_l1().await,
            StepKind::ClearFundsFromL2Escrow => self.try_clearing_funds_from_l2_escrow().await,
            StepKind::ProcessWithdrawalQueue => self.try_processing_withdrawal_queue().await,
        };
        result.unwrap_or_else(|e| {
            warn!(step = %kind, error = %e, "Reading chain state failed");
            StepStatus::skipped(
                kind,
                StepOutcome::NetworkFailure,
                format!("Reading chain state failed: {e}"),
            )
        })
    }

    async fn l1_message_pending(&self) -> ChainResult<(bool, u64)> {
        let (sequence, nonce) = futures::try_join!(
            self.contracts.l1.router_sequence(),
            self.contracts.l2.next_valid_nonce()
        )?;
        Ok((message_pending(sequence, nonce), nonce))
    }

    async fn l2_message_pending(&self) -> ChainResult<(bool, u64)> {
        let (sequence, nonce) = futures::try_join!(
            self.contracts.l2.router_sequence(),
            self.contracts.l1.next_valid_nonce()
        )?;
        Ok((message_pending(sequence, nonce), nonce))
    }

    async fn l1_vaa(&self, poller: Poller, sequence: u64) -> Option<Vec<u8>> {
        let emitter = self.contracts.l1.router_emitter();
        poller
            .poll("L1 router VAA", || {
                self.vaas.signed_vaa(CHAIN_ID_ETH, emitter, sequence)
            })
            .await
    }

    async fn l2_vaa(&self, sequence: u64) -> Option<Vec<u8>> {
        let emitter = self.contracts.l2.router_emitter();
        self.poller
            .poll("L2 router VAA", || {
                self.vaas.signed_vaa(CHAIN_ID_POLYGON, emitter, sequence)
            })
            .await
    }

    /// Step 1: L1 publishes its TVL when no rebalance needs the message stream
    /// and L2 has consumed everything L1 sent before.
    async fn try_sending_tvl_from_l1(&self) -> ChainResult<StepStatus> {
        let step = StepKind::SendTvlFromL1;
        let (can_transfer_to_l1, can_request_from_l1, received) = futures::try_join!(
            self.contracts.l2.can_transfer_to_l1(),
            self.contracts.l2.can_request_from_l1(),
            self.contracts.l1.received()
        )?;
        let lock = BridgeLock::from_flags(can_transfer_to_l1, can_request_from_l1);
        if !tvl_report_due(lock, received) {
            return Ok(precondition(step, "Rebalance in progress, no need to send TVL"));
        }

        let (pending, _) = self.l1_message_pending().await?;
        if pending {
            return Ok(precondition(step, "Previous TVLs are yet to be received by L2"));
        }

        Ok(submitted(
            step,
            self.contracts.l1.send_tvl().await,
            "Sent TVL to L2 from L1",
            "Sending TVL Failed",
        ))
    }

    /// Step 2: L2 consumes the pending L1 TVL report.
    ///
    /// While L2 waits on an L1 -> L2 transfer it only accepts a pending TVL
    /// report (recorded without rebalancing); anything else stays for step 5.
    async fn try_receiving_tvl_in_l2(&self) -> ChainResult<StepStatus> {
        let step = StepKind::ReceiveTvlInL2;
        let (pending, nonce) = self.l1_message_pending().await?;
        if !pending {
            return Ok(precondition(step, "No L1 TVL to be received"));
        }

        if !self.contracts.l2.can_request_from_l1().await? {
            let stale_tvl = self
                .l1_vaa(self.poller.once(), nonce)
                .await
                .filter(|vaa| is_tvl_report(vaa));
            let Some(vaa) = stale_tvl else {
                return Ok(precondition(
                    step,
                    "L1 -> L2 rebalance happening, TVL is not expected by L2 at the moment",
                ));
            };
            return Ok(submitted(
                step,
                self.contracts.l2.receive_tvl(&vaa).await,
                "Received stale TVL from L1 during L1 -> L2 rebalance",
                "Receiving TVL from L1 failed",
            ));
        }

        let Some(vaa) = self.l1_vaa(self.poller, nonce).await else {
            return Ok(not_ready(
                step,
                "Receiving TVL from L1 failed as wormhole VAA is not ready",
            ));
        };
        Ok(submitted(
            step,
            self.contracts.l2.receive_tvl(&vaa).await,
            "Received TVL from L1",
            "Receiving TVL from L1 failed",
        ))
    }

    /// Step 3: L1 clears funds L2 burned towards it, using the exit proof.
    async fn try_receiving_fund_in_l1(&self) -> ChainResult<StepStatus> {
        let step = StepKind::ReceiveFundInL1;
        if self.contracts.l2.can_transfer_to_l1().await? {
            return Ok(precondition(step, "No L2 -> L1 rebalance happening"));
        }
        let (pending, nonce) = self.l2_message_pending().await?;
        if !pending {
            return Ok(precondition(step, "No fund to be received in L1"));
        }

        let vaa = self.l2_vaa(nonce).await;
        let proof = match self.contracts.l2.latest_transfer_to_l1_tx().await? {
            Some(tx_hash) => {
                self.poller
                    .poll("exit proof", || {
                        self.exit_proofs
                            .exit_payload(tx_hash, ERC20_TRANSFER_EVENT_SIG)
                    })
                    .await
            }
            None => None,
        };
        let (vaa, proof) = match (vaa, proof) {
            (Some(vaa), Some(proof)) => (vaa, proof),
            (vaa, proof) => {
                let mut missing = Vec::new();
                if vaa.is_none() {
                    missing.push("L2 fund transfer report VAA not yet available");
                }
                if proof.is_none() {
                    missing.push("L2 fund transfer message proof not yet available");
                }
                return Ok(not_ready(step, missing.join(", ")));
            }
        };

        Ok(submitted(
            step,
            self.contracts.l1.receive_funds(&vaa, &proof).await,
            "L2 fund received in L1",
            "Something went wrong receiving L2 fund in L1",
        ))
    }

    /// Step 4: L1 serves the pending L2 fund request.
    async fn try_triggering_transfer_from_l1(&self) -> ChainResult<StepStatus> {
        let step = StepKind::TriggerTransferFromL1;
        if self.contracts.l2.can_request_from_l1().await? {
            return Ok(precondition(step, "No L1 -> L2 rebalance happening"));
        }
        let (pending, nonce) = self.l2_message_pending().await?;
        if !pending {
            return Ok(precondition(step, "No fund to be requested to L1"));
        }

        let Some(vaa) = self.l2_vaa(nonce).await else {
            return Ok(not_ready(step, "L2 fund request VAA not yet available"));
        };
        Ok(submitted(
            step,
            self.contracts.l1.receive_fund_request(&vaa).await,
            "Fund transfer from L1 to L2 was triggered",
            "Something went wrong triggering fund transfer from L1 to L2",
        ))
    }

    /// Step 5: L2 clears the bridged funds out of its escrow.
    async fn try_clearing_funds_from_l2_escrow(&self) -> ChainResult<StepStatus> {
        let step = StepKind::ClearFundsFromL2Escrow;
        if self.contracts.l2.can_request_from_l1().await? {
            return Ok(precondition(step, "No L1 -> L2 rebalance happening"));
        }
        let (pending, nonce) = self.l1_message_pending().await?;
        if !pending {
            return Ok(precondition(step, "No funds to be cleared in L2"));
        }
        if self.contracts.l2.escrow_balance().await? == 0 {
            return Ok(precondition(step, "Funds are not received by L2 escrow yet"));
        }

        let Some(vaa) = self.l1_vaa(self.poller, nonce).await else {
            return Ok(not_ready(step, "L1 fund transfer report VAA not yet available"));
        };
        Ok(submitted(
            step,
            self.contracts.l2.receive_funds(&vaa).await,
            "Funds cleared in L2 Escrow",
            "Something went wrong clearing funds from L2 Escrow",
        ))
    }

    /// Dequeues in batches until the queue is empty, stops shrinking, or a
    /// dequeue reverts.
    async fn try_processing_withdrawal_queue(&self) -> ChainResult<StepStatus> {
        let step = StepKind::ProcessWithdrawalQueue;
        let queued = self.contracts.l2.withdrawal_queue_size().await?;
        if queued == 0 {
            return Ok(precondition(step, "Withdrawal queue is empty"));
        }

        let mut tx_hash = match self
            .contracts
            .l2
            .dequeue_withdrawals(queued.min(DEQUEUE_BATCH_SIZE))
            .await
        {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                return Ok(submitted(
                    step,
                    Err(e),
                    "Withdrawal queue processed",
                    "Dequeuing withdrawals failed",
                ))
            }
        };
        let mut before = queued;
        let mut remaining = self.contracts.l2.withdrawal_queue_size().await?;
        while remaining > 0 && remaining < before {
            match self
                .contracts
                .l2
                .dequeue_withdrawals(remaining.min(DEQUEUE_BATCH_SIZE))
                .await
            {
                Ok(next) => tx_hash = next,
                Err(e) => {
                    debug!(error = %e, remaining, "Dequeue stopped");
                    break;
                }
            }
            before = remaining;
            remaining = self.contracts.l2.withdrawal_queue_size().await?;
        }

        Ok(StepStatus::submitted(
            step,
            tx_hash,
            format!(
                "Dequeued {} withdrawals, {remaining} still queued",
                queued.saturating_sub(remaining)
            ),
        ))
    }
}

fn log_status(status: &StepStatus) {
    info!(
        step = %status.step,
        success = status.success,
        outcome = ?status.outcome,
        message = %status.message,
        "Rebalance step finished"
    );
}

fn is_tvl_report(vaa: &[u8]) -> bool {
    Vaa::parse(vaa)
        .and_then(|vaa| Payload::decode(&vaa.body.payload))
        .is_ok_and(|payload| matches!(payload, Payload::TvlReport { .. }))
}
