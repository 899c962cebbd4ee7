use std::sync::Arc;

use actix_web::{http::StatusCode, web};
use deposit_engine::{payments::SessionConfig, BalanceSourceError, DepositLedger, PaymentVerificationApi};
use kiosk_common::Won;
use serde_json::Value;

use super::helpers::get_request;
use crate::{
    endpoint_tests::mocks::MockBrokerage,
    routes::{DepositBalanceRoute, PaymentChannelRoute},
};

async fn api_with_balance(balance: i64) -> PaymentVerificationApi<MockBrokerage> {
    let mut mock = MockBrokerage::new();
    // Only the opening balance is ever fetched in these tests
    mock.expect_fetch_balance().times(1).returning(move || Ok(Won::from(balance)));
    let ledger = DepositLedger::initialize(mock).await.expect("Ledger should initialise");
    PaymentVerificationApi::new(Arc::new(ledger), SessionConfig::default())
}

#[actix_web::test]
async fn deposit_balance_is_served_from_the_cache() {
    let _ = env_logger::try_init().ok();
    let api = api_with_balance(52_000).await;
    let (status, body) = get_request("/deposit/balance", move |cfg| {
        cfg.app_data(web::Data::new(api)).service(DepositBalanceRoute::<MockBrokerage>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).expect("Body should be JSON");
    assert_eq!(value["balance"], 52_000);
    assert_eq!(value["active_sessions"], 0);
    assert!(value["last_synced_at"].is_string());
}

#[actix_web::test]
async fn ledger_needs_an_opening_balance() {
    let mut mock = MockBrokerage::new();
    mock.expect_fetch_balance().times(1).returning(|| Err(BalanceSourceError::Unreachable("no route".into())));
    assert!(DepositLedger::initialize(mock).await.is_err());
}

#[actix_web::test]
async fn payment_channel_requires_a_websocket_upgrade() {
    let _ = env_logger::try_init().ok();
    let api = api_with_balance(0).await;
    let (status, body) = get_request("/ws/payment", move |cfg| {
        cfg.app_data(web::Data::new(api)).service(PaymentChannelRoute::<MockBrokerage>::new());
    })
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Could not open the WebSocket"), "{body}");
}
