use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use kiosk_common::Won;
use log::*;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    ledger::{DepositLedger, LedgerSnapshot},
    payments::{
        CancelReason,
        PaymentId,
        PaymentResult,
        SessionConfig,
        SessionRegistry,
        SessionUpdate,
        VerificationSession,
    },
    pv_api::errors::PaymentError,
    traits::BalanceSource,
};

/// A payment that is being verified in the background.
pub struct PaymentHandle {
    pub payment_id: PaymentId,
    pub amount: Won,
    pub started_at: DateTime<Utc>,
    /// Resolves to the same result that is sent to the client as the final [`SessionUpdate`]
    pub task: JoinHandle<PaymentResult>,
}

pub struct PaymentVerificationApi<B> {
    ledger: Arc<DepositLedger<B>>,
    registry: Arc<SessionRegistry>,
    config: SessionConfig,
}

impl<B> Clone for PaymentVerificationApi<B> {
    fn clone(&self) -> Self {
        Self { ledger: Arc::clone(&self.ledger), registry: Arc::clone(&self.registry), config: self.config }
    }
}

impl<B> Debug for PaymentVerificationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentVerificationApi({:?})", self.config)
    }
}

impl<B> PaymentVerificationApi<B> {
    pub fn new(ledger: Arc<DepositLedger<B>>, config: SessionConfig) -> Self {
        Self { ledger, registry: Arc::new(SessionRegistry::new()), config }
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Asks the session verifying `payment_id` to stop. Returns `false` if there is nothing to cancel, either because
    /// the id is unknown or because the session has already finished.
    pub fn cancel_payment(&self, payment_id: &PaymentId) -> bool {
        let found = self.registry.request_cancel(payment_id, CancelReason::ClientRequest);
        if found {
            info!("💳️ Cancel requested for payment {payment_id}");
        }
        found
    }

    /// Stops the session verifying `payment_id` because the client that started it has gone away.
    pub fn abandon_payment(&self, payment_id: &PaymentId) -> bool {
        let found = self.registry.request_cancel(payment_id, CancelReason::ClientDisconnected);
        if found {
            info!("💳️ Payment {payment_id} abandoned by its client");
        }
        found
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.active_count()
    }
}

impl<B> PaymentVerificationApi<B>
where B: BalanceSource + 'static
{
    /// Starts verifying a deposit of `amount` and returns immediately.
    ///
    /// Progress reports and the final result are sent to `updates`, in order. Must be called from within a Tokio
    /// runtime.
    pub fn start_payment(
        &self,
        amount: Won,
        updates: mpsc::Sender<SessionUpdate>,
    ) -> Result<PaymentHandle, PaymentError> {
        if !amount.is_positive() {
            debug!("💳️ Rejecting payment request for {amount}");
            return Err(PaymentError::InvalidAmount(amount));
        }
        let payment_id = PaymentId::random();
        let (cancel_tx, cancel_rx) = mpsc::channel(1);
        let registration = self.registry.register(payment_id.clone(), cancel_tx)?;
        let session =
            VerificationSession::new(amount, self.config, Arc::clone(&self.ledger), registration, cancel_rx, updates);
        let task = tokio::spawn(session.run());
        debug!("💳️ Payment {payment_id} for {amount} spawned. {} active session(s)", self.active_sessions());
        Ok(PaymentHandle { payment_id, amount, started_at: Utc::now(), task })
    }

    pub async fn current_balance(&self) -> Won {
        self.ledger.current_balance().await
    }

    pub async fn ledger_snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot().await
    }
}
