//! End-to-end rebalancer runs against the in-process devnet.

use std::{sync::Arc, time::Duration};

use alp_rebalancer::{
    chains::local::LocalNetwork, services::Poller, Rebalancer, RunReport, StepKind, StepOutcome,
};
use alp_vault::{Address, BridgeLock, Network};

fn rebalancer(local: &LocalNetwork) -> Rebalancer {
    Rebalancer::new(
        local.contracts(),
        Arc::new(local.clone()),
        Arc::new(local.clone()),
        Poller::new(2, Duration::ZERO),
    )
}

fn owner() -> Address {
    Address::derive("treasury")
}

/// The treasury owner deposited `amount` into the L2 vault; L1 is empty.
fn treasury(amount: u64) -> LocalNetwork {
    let mut net = Network::devnet();
    net.fund_treasury(owner(), amount).unwrap();
    LocalNetwork::new(net)
}

async fn settle(local: &LocalNetwork) {
    local.lock().await.settle().unwrap();
}

/// Alternates rebalancer runs with the off-chain actors catching up.
async fn run_rounds(local: &LocalNetwork, rebalancer: &Rebalancer, rounds: usize) -> Vec<RunReport> {
    let mut reports = Vec::new();
    for _ in 0..rounds {
        reports.push(rebalancer.run().await);
        settle(local).await;
    }
    reports
}

/// A 1000 treasury split 900 / 100 with no message in flight.
async fn settled_treasury() -> (LocalNetwork, Rebalancer) {
    let local = treasury(1_000);
    let rebalancer = rebalancer(&local);
    run_rounds(&local, &rebalancer, 6).await;
    // The last round leaves a fresh TVL report in flight.
    rebalancer.step(StepKind::ReceiveTvlInL2).await;
    assert_split(&local, 900, 100).await;
    assert_no_message_in_flight(&local).await;
    (local, rebalancer)
}

/// Settled treasury after the owner withdrew 60: L2 drops below its tenth.
async fn l2_short_of_target() -> (LocalNetwork, Rebalancer) {
    let (local, rebalancer) = settled_treasury().await;
    local.lock().await.l2.withdraw(owner(), 60).unwrap();
    (local, rebalancer)
}

fn outcome(report: &RunReport, kind: StepKind) -> StepOutcome {
    report.step(kind).unwrap().outcome.clone()
}

async fn assert_split(local: &LocalNetwork, l1: u64, l2: u64) {
    let net = local.lock().await;
    assert_eq!(net.l1.vault_tvl().unwrap(), l1);
    assert_eq!(net.l2.vault_tvl().unwrap(), l2);
    assert_eq!(net.l2.side.vault.lock, BridgeLock::Idle);
    assert_eq!(net.l2.side.vault.l1_tvl, l1);
    assert_eq!(net.l2.vault().global_tvl(&net.l2.ledger).unwrap(), l1 + l2);
}

async fn assert_no_message_in_flight(local: &LocalNetwork) {
    let net = local.lock().await;
    assert_eq!(
        net.l2.router.next_valid_nonce(),
        net.l1.core.next_sequence(net.deployment.l1_router)
    );
    assert_eq!(
        net.l1.router.next_valid_nonce(),
        net.l2.core.next_sequence(net.deployment.l2_router)
    );
}

#[tokio::test]
async fn test_l2_deposits_rebalance_nine_tenths_to_l1() {
    let local = treasury(1_000);
    let rebalancer = rebalancer(&local);
    let reports = run_rounds(&local, &rebalancer, 6).await;

    // Round 1: TVL sent, guardians have not signed it yet.
    assert!(reports[0].step(StepKind::SendTvlFromL1).unwrap().success);
    assert_eq!(
        outcome(&reports[0], StepKind::ReceiveTvlInL2),
        StepOutcome::ProofUnavailable
    );
    assert!(reports[1].step(StepKind::ReceiveTvlInL2).unwrap().success);
    assert_eq!(
        reports[1].step(StepKind::ReceiveFundInL1).unwrap().message,
        "L2 fund transfer report VAA not yet available, L2 fund transfer message proof not yet available"
    );
    assert!(reports[2].step(StepKind::ReceiveFundInL1).unwrap().success);
    // The acknowledging TVL report goes out once L1 has received the funds.
    assert_eq!(
        reports[2].step(StepKind::SendTvlFromL1).unwrap().message,
        "Rebalance in progress, no need to send TVL"
    );
    assert!(reports[3].step(StepKind::SendTvlFromL1).unwrap().success);

    assert_split(&local, 900, 100).await;
    let net = local.lock().await;
    assert_eq!(net.l2.vault().balance_of(owner()), 1_000);
    assert_eq!(net.l2.vault().total_shares, 1_000);
}

#[tokio::test]
async fn test_l1_treasury_tops_up_l2_after_withdrawal() {
    let (local, rebalancer) = l2_short_of_target().await;
    let reports = run_rounds(&local, &rebalancer, 6).await;

    // Round 1: TVL sent, guardians have not signed it yet.
    assert!(reports[0].step(StepKind::SendTvlFromL1).unwrap().success);
    assert_eq!(
        outcome(&reports[0], StepKind::ReceiveTvlInL2),
        StepOutcome::ProofUnavailable
    );
    // Round 2: L2 requests funds.
    assert!(reports[1].step(StepKind::ReceiveTvlInL2).unwrap().success);
    // Round 3: L1 serves the request, the deposit has not been synced yet.
    assert!(reports[2].step(StepKind::TriggerTransferFromL1).unwrap().success);
    assert_eq!(
        reports[2].step(StepKind::ClearFundsFromL2Escrow).unwrap().message,
        "Funds are not received by L2 escrow yet"
    );
    // Round 4: escrow cleared.
    assert!(reports[3].step(StepKind::ClearFundsFromL2Escrow).unwrap().success);

    // 940 left: 846 / 94.
    assert_split(&local, 846, 94).await;
}

#[tokio::test]
async fn test_queued_withdrawal_is_paid_after_l1_transfer() {
    let (local, rebalancer) = l2_short_of_target().await;
    let status = rebalancer.process_withdrawal_queue().await;
    assert_eq!(status.step, StepKind::ProcessWithdrawalQueue);
    assert_eq!(status.outcome, StepOutcome::PreconditionNotMet);
    assert_eq!(status.message, "Withdrawal queue is empty");

    // 50 shares are worth 50, but L2 only holds 40.
    local.lock().await.l2.withdraw(owner(), 50).unwrap();
    assert_eq!(local.lock().await.l2.vault().withdrawal_queue_size(), 1);

    let transactions = local.lock().await.transaction_count();
    let status = rebalancer.process_withdrawal_queue().await;
    assert_eq!(status.outcome, StepOutcome::TransactionReverted);
    assert_eq!(local.lock().await.transaction_count(), transactions);

    run_rounds(&local, &rebalancer, 6).await;
    assert_split(&local, 846, 94).await;

    let status = rebalancer.process_withdrawal_queue().await;
    assert!(status.success, "{}", status.message);
    assert_eq!(status.message, "Dequeued 1 withdrawals, 0 still queued");

    let net = local.lock().await;
    assert_eq!(net.l2.vault().withdrawal_queue_size(), 0);
    assert_eq!(net.l2.ledger.balance_of(owner()), 110);
    assert_eq!(net.l2.vault_tvl().unwrap(), 44);
    assert_eq!(net.l2.vault().total_shares, 890);
}

#[tokio::test]
async fn test_missing_exit_proof_reports_not_ready_until_checkpoint() {
    let local = treasury(1_000);
    let rebalancer = rebalancer(&local);
    run_rounds(&local, &rebalancer, 1).await;
    rebalancer.run().await;
    {
        // Guardians and state sync keep up, the checkpoint does not.
        let mut net = local.lock().await;
        net.sync_state().unwrap();
        net.observe();
    }

    let transactions = local.lock().await.transaction_count();
    let status = rebalancer.step(StepKind::ReceiveFundInL1).await;
    assert_eq!(status.outcome, StepOutcome::ProofUnavailable);
    assert_eq!(status.message, "L2 fund transfer message proof not yet available");
    assert_eq!(local.lock().await.transaction_count(), transactions);

    local.lock().await.checkpoint();
    let status = rebalancer.step(StepKind::ReceiveFundInL1).await;
    assert!(status.success, "{}", status.message);
    assert!(local.lock().await.l1.side.vault.received);
}

#[tokio::test]
async fn test_repeated_runs_without_progress_submit_nothing() {
    let (local, rebalancer) = settled_treasury().await;
    let first = rebalancer.run().await;
    assert_eq!(first.submitted(), 1);

    let transactions = local.lock().await.transaction_count();
    for _ in 0..3 {
        let report = rebalancer.run().await;
        assert_eq!(report.submitted(), 0);
        assert_eq!(
            report.step(StepKind::SendTvlFromL1).unwrap().message,
            "Previous TVLs are yet to be received by L2"
        );
    }
    assert_eq!(local.lock().await.transaction_count(), transactions);
}

#[tokio::test]
async fn test_settled_vaults_stay_put() {
    let (local, rebalancer) = settled_treasury().await;

    let reports = run_rounds(&local, &rebalancer, 6).await;
    for report in &reports {
        for kind in [StepKind::TriggerTransferFromL1, StepKind::ReceiveFundInL1] {
            assert!(!report.step(kind).unwrap().success);
        }
    }
    let net = local.lock().await;
    assert_eq!(net.l1.vault_tvl().unwrap(), 900);
    assert_eq!(net.l2.vault_tvl().unwrap(), 100);
}

#[tokio::test]
async fn test_overlapping_runs_converge_without_creating_value() {
    let (local, first) = l2_short_of_target().await;
    let second = rebalancer(&local);

    for _ in 0..8 {
        let (a, b) = tokio::join!(first.run(), second.run());
        for status in a.steps.iter().chain(&b.steps) {
            assert_ne!(status.outcome, StepOutcome::NetworkFailure);
        }
        settle(&local).await;
    }
    run_rounds(&local, &first, 6).await;
    // Deliver a TVL report the last round may have left in flight.
    first.step(StepKind::ReceiveTvlInL2).await;

    assert_split(&local, 846, 94).await;
    assert_no_message_in_flight(&local).await;
    assert_eq!(local.lock().await.l2.vault().total_shares, 940);
}

#[tokio::test]
async fn test_duplicate_tvl_during_request_is_drained() {
    let (local, rebalancer) = l2_short_of_target().await;
    // Two TVL reports go out before L2 sees either.
    {
        let mut net = local.lock().await;
        net.l1.send_tvl().unwrap();
        net.l1.send_tvl().unwrap();
        net.observe();
    }
    let status = rebalancer.step(StepKind::ReceiveTvlInL2).await;
    assert!(status.success);
    assert_eq!(
        local.lock().await.l2.side.vault.lock,
        BridgeLock::RequestFromL1
    );

    let status = rebalancer.step(StepKind::ReceiveTvlInL2).await;
    assert_eq!(
        status.message,
        "Received stale TVL from L1 during L1 -> L2 rebalance"
    );

    run_rounds(&local, &rebalancer, 6).await;
    assert_split(&local, 846, 94).await;
}
