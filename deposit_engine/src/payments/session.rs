//! # Verification session
//!
//! One session verifies one payment. It is a small state machine:
//!
//! ```text
//! Initiated ──► Polling ──► Confirmed | TimedOut | Cancelled | Failed
//!     │                          ▲
//!     └──────────────────────────┘  (resync failure → Failed)
//! ```
//!
//! Before the first poll the session re-reads the balance so that earlier deposits are not mistaken for this one. If
//! other sessions are registered, the change is left in the ledger for them and the first poll is pushed back by one
//! interval, giving every session that was already waiting a chance to claim it first.
//!
//! While polling, each iteration checks for a pending cancel, asks the ledger for the latest delta, reports progress
//! to the client and then waits for the poll interval *or* a cancel signal. The wait is the only suspension point
//! besides the ledger call, so a cancel is noticed within one interval.
//!
//! Whatever the terminal state, the registry entry is removed before the final result is sent. A client that
//! receives a result and then asks to cancel is told there is nothing to cancel. Conversely, a cancel that was
//! accepted while the entry existed always ends the session as `Cancelled`, even if the poll that was in flight at
//! the time found the deposit.
use std::{sync::Arc, time::Duration};

use chrono::Utc;
use kiosk_common::Won;
use log::*;
use tokio::{
    sync::mpsc::{self, error::TryRecvError},
    time::Instant,
};

use crate::{
    ledger::{DepositLedger, Resync},
    payments::{
        CancelReason,
        PaymentId,
        PaymentResult,
        PaymentStatus,
        RegistrationGuard,
        SessionConfig,
        SessionOutcome,
        SessionState,
        SessionUpdate,
        PAYMENT_LOG_TARGET,
    },
    traits::BalanceSource,
};

pub struct VerificationSession<B> {
    id: PaymentId,
    expected_amount: Won,
    attempt: u32,
    max_attempts: u32,
    poll_interval: Duration,
    state: SessionState,
    last_delta: Won,
    ledger: Arc<DepositLedger<B>>,
    cancel: mpsc::Receiver<CancelReason>,
    updates: mpsc::Sender<SessionUpdate>,
    registration: RegistrationGuard,
    started: Instant,
}

impl<B: BalanceSource> VerificationSession<B> {
    /// Creates a session in the `Initiated` state. The session should already be registered; `registration` is the
    /// proof of that and `cancel` the receiving end of the registered cancel signal.
    pub fn new(
        expected_amount: Won,
        config: SessionConfig,
        ledger: Arc<DepositLedger<B>>,
        registration: RegistrationGuard,
        cancel: mpsc::Receiver<CancelReason>,
        updates: mpsc::Sender<SessionUpdate>,
    ) -> Self {
        Self {
            id: registration.payment_id().clone(),
            expected_amount,
            attempt: 0,
            max_attempts: config.max_attempts.max(1),
            poll_interval: config.poll_interval,
            state: SessionState::Initiated,
            last_delta: Won::default(),
            ledger,
            cancel,
            updates,
            registration,
            started: Instant::now(),
        }
    }

    /// Drives the session to a terminal state and returns the result that was reported to the client.
    pub async fn run(mut self) -> PaymentResult {
        info!(
            target: PAYMENT_LOG_TARGET,
            "💳️ Payment {} started. Expecting a deposit of {} within {:?}",
            self.id,
            self.expected_amount,
            self.config().budget()
        );
        // Anything that arrived before this payment was requested belongs to the baseline, not to this payment. Unless
        // other payments are polling, in which case it may be theirs.
        let registration = &self.registration;
        let resync = self.ledger.resync_unless(|| registration.has_peers()).await;
        let postpone = match resync {
            Ok(Resync::InSync) => {
                trace!("💳️ Payment {}: ledger is in sync", self.id);
                false
            },
            Ok(Resync::Corrected(drift)) => {
                warn!("💳️ Payment {}: balance drifted by {} before polling started", self.id, drift.amount());
                false
            },
            Ok(Resync::Deferred(drift)) => {
                info!(
                    "💳️ Payment {}: {} arrived before polling started. Letting earlier payments claim it first",
                    self.id,
                    drift.amount()
                );
                true
            },
            Err(e) => {
                error!("💳️ Payment {}: could not confirm the starting balance. {e}", self.id);
                let outcome = SessionOutcome::Failed { error: e.to_string(), attempt: 0 };
                return self.finish(outcome).await;
            },
        };
        self.transition(SessionState::Polling);
        if postpone {
            if let Some(reason) = self.wait_for_next_poll().await {
                info!("💳️ Payment {} cancelled before its first poll ({reason:?})", self.id);
                let outcome = self.cancelled(reason);
                return self.finish(outcome).await;
            }
        }
        let outcome = self.poll().await;
        self.finish(outcome).await
    }

    fn config(&self) -> SessionConfig {
        SessionConfig { poll_interval: self.poll_interval, max_attempts: self.max_attempts }
    }

    async fn poll(&mut self) -> SessionOutcome {
        while self.attempt < self.max_attempts {
            self.attempt += 1;
            if let Some(reason) = self.cancel_pending() {
                info!("💳️ Payment {} cancelled before attempt #{} ({reason:?})", self.id, self.attempt);
                return self.cancelled(reason);
            }
            let check = match self.ledger.reconcile_and_check(self.expected_amount).await {
                Ok(check) => check,
                Err(e) => {
                    error!("💳️ Payment {}: attempt #{} failed. {e}", self.id, self.attempt);
                    return SessionOutcome::Failed { error: e.to_string(), attempt: self.attempt };
                },
            };
            self.last_delta = check.actual_delta;
            debug!(
                target: PAYMENT_LOG_TARGET,
                "💳️ Payment {} attempt #{}/{}: expected {}, observed {}, balance {}",
                self.id, self.attempt, self.max_attempts, self.expected_amount, check.actual_delta, check.current_balance
            );
            if check.actual_delta != Won::default() && !check.matched {
                warn!(
                    "💳️ Payment {}: balance changed by {}, which does not match the expected {}",
                    self.id, check.actual_delta, self.expected_amount
                );
            }
            let status = PaymentStatus {
                payment_id: self.id.clone(),
                attempt: self.attempt,
                max_attempts: self.max_attempts,
                actual_change: check.actual_delta,
            };
            let client_gone = self.updates.send(SessionUpdate::Status(status)).await.is_err();
            if check.matched {
                if client_gone {
                    warn!("💳️ Payment {} was confirmed, but the client has already disconnected", self.id);
                }
                return SessionOutcome::Confirmed { actual_change: check.actual_delta, attempt: self.attempt };
            }
            if client_gone {
                info!("💳️ Payment {}: client disconnected during attempt #{}", self.id, self.attempt);
                return self.cancelled(CancelReason::ClientDisconnected);
            }
            if self.attempt < self.max_attempts {
                if let Some(reason) = self.wait_for_next_poll().await {
                    info!("💳️ Payment {} cancelled while waiting after attempt #{} ({reason:?})", self.id, self.attempt);
                    return self.cancelled(reason);
                }
            }
        }
        SessionOutcome::TimedOut { actual_change: self.last_delta, attempt: self.attempt }
    }

    fn cancelled(&self, reason: CancelReason) -> SessionOutcome {
        SessionOutcome::Cancelled { reason, actual_change: self.last_delta, attempt: self.attempt }
    }

    fn cancel_pending(&mut self) -> Option<CancelReason> {
        match self.cancel.try_recv() {
            Ok(reason) => Some(reason),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Sleeps for one poll interval, unless a cancel signal arrives first.
    async fn wait_for_next_poll(&mut self) -> Option<CancelReason> {
        let sleep = tokio::time::sleep(self.poll_interval);
        tokio::pin!(sleep);
        let mut listening = true;
        loop {
            tokio::select! {
                biased;
                signal = self.cancel.recv(), if listening => match signal {
                    Some(reason) => return Some(reason),
                    // Every sender is gone, so no cancel can arrive any more. Sit out the rest of the interval.
                    None => listening = false,
                },
                _ = &mut sleep => return None,
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(!self.state.is_terminal(), "{} is a terminal state", self.state);
        trace!("💳️ Payment {}: {} -> {next}", self.id, self.state);
        self.state = next;
    }

    async fn finish(mut self, outcome: SessionOutcome) -> PaymentResult {
        self.registration.release();
        // Once the entry is gone no new cancel can be accepted, so anything in the channel now was accepted while
        // the session was still running, and wins over whatever the last poll found.
        let outcome = match outcome {
            SessionOutcome::Cancelled { .. } => outcome,
            other => match self.cancel_pending() {
                Some(reason) => {
                    info!("💳️ Payment {} was cancelled before it could finish as {}", self.id, other.state());
                    self.cancelled(reason)
                },
                None => other,
            },
        };
        self.cancel.close();
        self.transition(outcome.state());
        let result = PaymentResult {
            payment_id: self.id.clone(),
            expected_amount: self.expected_amount,
            outcome,
            max_attempts: self.max_attempts,
            poll_interval: self.poll_interval,
            finished_at: Utc::now(),
            elapsed: self.started.elapsed(),
        };
        match result.state() {
            SessionState::Confirmed => info!(
                target: PAYMENT_LOG_TARGET,
                "💳️ Payment {} confirmed: {} received after {} attempt(s) in {:?}",
                self.id,
                result.outcome.actual_change(),
                result.outcome.attempt(),
                result.elapsed
            ),
            SessionState::TimedOut => warn!(
                target: PAYMENT_LOG_TARGET,
                "💳️ Payment {} timed out after {} attempts. Expected {}, last change {}",
                self.id,
                result.outcome.attempt(),
                self.expected_amount,
                result.outcome.actual_change()
            ),
            state => info!(target: PAYMENT_LOG_TARGET, "💳️ Payment {} ended in state {state}", self.id),
        }
        if self.updates.send(SessionUpdate::Finished(result.clone())).await.is_err() {
            debug!("💳️ Payment {}: the client left before the result could be delivered", self.id);
        }
        result
    }
}
