use std::fmt::Display;

use chrono::{DateTime, Utc};
use deposit_engine::{
    payments::{PaymentId, PaymentResult, PaymentStatus},
    LedgerSnapshot,
};
use kiosk_common::Won;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames a kiosk sends on the payment channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    PaymentRequest { amount: Won },
    CancelRequest { payment_id: PaymentId },
}

/// Frames the server sends on the payment channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    PaymentInitiated { payment_id: PaymentId, amount: Won, timestamp: DateTime<Utc> },
    PaymentStatus(PaymentStatus),
    PaymentResult { success: bool, message: String, details: Value },
    CancelResult { success: bool, payment_id: PaymentId, message: String },
    Error { error: String },
}

impl ServerMessage {
    pub fn error<S: Display>(error: S) -> Self {
        Self::Error { error: error.to_string() }
    }

    pub fn cancel_result(payment_id: PaymentId, success: bool) -> Self {
        let message = if success {
            "Cancellation requested".to_string()
        } else {
            "There is no active payment with that id. It may already have finished".to_string()
        };
        Self::CancelResult { success, payment_id, message }
    }
}

impl From<&PaymentResult> for ServerMessage {
    fn from(result: &PaymentResult) -> Self {
        Self::PaymentResult { success: result.is_success(), message: result.message(), details: result.details() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositBalance {
    pub balance: Won,
    pub last_synced_at: DateTime<Utc>,
    pub active_sessions: usize,
}

impl DepositBalance {
    pub fn new(snapshot: LedgerSnapshot, active_sessions: usize) -> Self {
        Self { balance: snapshot.balance, last_synced_at: snapshot.last_synced_at, active_sessions }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn client_messages() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"payment_request","payload":{"amount":4500}}"#).unwrap();
        assert_eq!(msg, ClientMessage::PaymentRequest { amount: Won::from(4500) });
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"cancel_request","payload":{"payment_id":"abc"}}"#).unwrap();
        assert_eq!(msg, ClientMessage::CancelRequest { payment_id: PaymentId::from("abc".to_string()) });
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"refund","payload":{}}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"payment_request","payload":{"amount":"a"}}"#)
            .is_err());
    }

    #[test]
    fn server_messages() {
        let status = ServerMessage::PaymentStatus(PaymentStatus {
            payment_id: PaymentId::from("p1".to_string()),
            attempt: 2,
            max_attempts: 180,
            actual_change: Won::from(0),
        });
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({
                "type": "payment_status",
                "payload": {"payment_id": "p1", "attempt": 2, "max_attempts": 180, "actual_change": 0}
            })
        );
        let cancel = ServerMessage::cancel_result(PaymentId::from("p1".to_string()), false);
        let value = serde_json::to_value(&cancel).unwrap();
        assert_eq!(value["type"], "cancel_result");
        assert_eq!(value["payload"]["success"], false);
        let err = serde_json::to_value(ServerMessage::error("bad")).unwrap();
        assert_eq!(err, json!({"type": "error", "payload": {"error": "bad"}}));
    }
}
