use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use deposit_engine::{
    payments::{SessionConfig, SessionUpdate, PAYMENT_LOG_TARGET},
    BalanceSource,
    BalanceSourceError,
    DepositLedger,
    PaymentVerificationApi,
};
use kiosk_common::Won;
use log::{Level, LevelFilter, Log, Metadata, Record};
use mockall::{mock, Sequence};
use tokio::sync::mpsc;

mock! {
    pub Brokerage {}
    #[async_trait]
    impl BalanceSource for Brokerage {
        async fn fetch_balance(&self) -> Result<Won, BalanceSourceError>;
    }
}

struct CapturingLogger {
    records: Mutex<Vec<(String, Level, String)>>,
}

impl Log for CapturingLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let entry = (record.target().to_string(), record.level(), record.args().to_string());
        self.records.lock().unwrap_or_else(|e| e.into_inner()).push(entry);
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger { records: Mutex::new(Vec::new()) };

fn payment_log() -> Vec<(Level, String)> {
    let records = LOGGER.records.lock().unwrap();
    records.iter().filter(|(target, ..)| target == PAYMENT_LOG_TARGET).map(|(_, l, m)| (*l, m.clone())).collect()
}

#[tokio::test(start_paused = true)]
async fn payment_lifecycle_is_written_to_the_payment_log() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let mut mock = MockBrokerage::new();
    let mut seq = Sequence::new();
    // opening balance, resync, poll #1, poll #2
    for v in [8_000, 8_000, 8_000, 12_500] {
        mock.expect_fetch_balance().times(1).in_sequence(&mut seq).returning(move || Ok(Won::from(v)));
    }
    let ledger = Arc::new(DepositLedger::initialize(mock).await.unwrap());
    let api = PaymentVerificationApi::new(ledger, SessionConfig::new(Duration::from_secs(1), 5));
    let (tx, mut rx) = mpsc::channel(8);
    let handle = api.start_payment(Won::from(4_500), tx).unwrap();
    while let Some(update) = rx.recv().await {
        if let SessionUpdate::Finished(result) = update {
            assert!(result.is_success());
        }
    }
    handle.task.await.unwrap();

    let id = handle.payment_id.to_string();
    let entries = payment_log();
    let for_this_payment = entries.iter().filter(|(_, m)| m.contains(&id)).collect::<Vec<_>>();
    assert_eq!(for_this_payment.len(), 4, "{entries:?}");
    assert!(for_this_payment[0].1.contains("started"));
    assert!(for_this_payment[1].1.contains("attempt #1/5"));
    assert!(for_this_payment[2].1.contains("attempt #2/5"));
    assert_eq!(for_this_payment[3].0, Level::Info);
    assert!(for_this_payment[3].1.contains("confirmed"));
}
