use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use deposit_engine::{
    payments::{SessionConfig, SessionOutcome, SessionState, SessionUpdate},
    BalanceSource,
    BalanceSourceError,
    DepositLedger,
    LedgerError,
    PaymentVerificationApi,
};
use kiosk_common::Won;
use mockall::{mock, Sequence};
use tokio::sync::mpsc;

mock! {
    pub Brokerage {}
    #[async_trait]
    impl BalanceSource for Brokerage {
        async fn fetch_balance(&self) -> Result<Won, BalanceSourceError>;
    }
}

fn balances(mock: &mut MockBrokerage, seq: &mut Sequence, values: &[i64]) {
    for v in values {
        let v = *v;
        mock.expect_fetch_balance().times(1).in_sequence(seq).returning(move || Ok(Won::from(v)));
    }
}

#[tokio::test]
async fn unreachable_brokerage_prevents_startup() {
    let mut mock = MockBrokerage::new();
    mock.expect_fetch_balance().times(1).returning(|| Err(BalanceSourceError::Unreachable("dns failure".into())));
    let err = DepositLedger::initialize(mock).await.err().expect("Expected the ledger to fail");
    assert_eq!(err, LedgerError::FetchError(BalanceSourceError::Unreachable("dns failure".into())));
}

#[tokio::test(start_paused = true)]
async fn rejected_inquiry_fails_the_payment_and_is_not_retried() {
    let mut mock = MockBrokerage::new();
    let mut seq = Sequence::new();
    // opening balance, resync, poll #1, poll #2
    balances(&mut mock, &mut seq, &[20_000, 20_000, 20_000]);
    mock.expect_fetch_balance()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Err(BalanceSourceError::Rejected("EGW00201 too many requests".into())));

    let ledger = Arc::new(DepositLedger::initialize(mock).await.unwrap());
    let api = PaymentVerificationApi::new(ledger, SessionConfig::new(Duration::from_millis(500), 5));
    let (tx, mut rx) = mpsc::channel(8);
    let handle = api.start_payment(Won::from(4_500), tx).unwrap();

    let mut statuses = 0;
    let result = loop {
        match rx.recv().await.expect("Session ended without a result") {
            SessionUpdate::Status(_) => statuses += 1,
            SessionUpdate::Finished(result) => break result,
        }
    };
    assert_eq!(statuses, 1);
    assert_eq!(result.state(), SessionState::Failed);
    assert!(matches!(result.outcome, SessionOutcome::Failed { attempt: 2, .. }));
    assert!(result.message().contains("EGW00201"));
    assert!(!result.is_success());
    assert_eq!(handle.task.await.unwrap(), result);
    // The mock panics on drop if anything was fetched after the failure
    assert_eq!(api.active_sessions(), 0);
    assert_eq!(api.current_balance().await, Won::from(20_000));
}

#[tokio::test(start_paused = true)]
async fn deltas_are_measured_from_the_previous_poll() {
    let mut mock = MockBrokerage::new();
    let mut seq = Sequence::new();
    balances(&mut mock, &mut seq, &[10_000, 10_000, 7_000, 10_000]);
    let ledger = Arc::new(DepositLedger::initialize(mock).await.unwrap());
    let api = PaymentVerificationApi::new(ledger, SessionConfig::new(Duration::from_secs(1), 3));
    let (tx, mut rx) = mpsc::channel(8);
    let _handle = api.start_payment(Won::from(3_000), tx).unwrap();

    let mut changes = Vec::new();
    let result = loop {
        match rx.recv().await.expect("Session ended without a result") {
            SessionUpdate::Status(status) => changes.push(status.actual_change.value()),
            SessionUpdate::Finished(result) => break result,
        }
    };
    // A withdrawal followed by a transfer that restores the balance still counts as the expected deposit
    assert_eq!(changes, vec![-3_000, 3_000]);
    assert_eq!(result.outcome, SessionOutcome::Confirmed { actual_change: Won::from(3_000), attempt: 2 });
}
