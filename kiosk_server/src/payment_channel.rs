//! # Payment channel
//!
//! One WebSocket connection per kiosk. The kiosk asks for payments and cancellations; the server answers each request
//! and forwards every progress report and result of the sessions the kiosk started.
//!
//! [`PaymentChannel`] holds the per-connection state and does all the message handling. [`run_payment_channel`] is
//! the transport loop around it, which only moves frames between the socket and the channel.
use std::collections::HashSet;

use actix_ws::{Message, MessageStream, Session};
use chrono::Utc;
use deposit_engine::{
    payments::{PaymentId, SessionOutcome, SessionUpdate},
    BalanceSource,
    PaymentVerificationApi,
};
use futures::StreamExt;
use log::*;
use tokio::sync::mpsc;

use crate::data_objects::{ClientMessage, ServerMessage};

/// Status reports that may be waiting for the socket before sessions start to block on this connection.
pub const UPDATE_BUFFER_SIZE: usize = 32;

pub struct PaymentChannel<B> {
    api: PaymentVerificationApi<B>,
    updates: mpsc::Sender<SessionUpdate>,
    active: HashSet<PaymentId>,
}

impl<B> PaymentChannel<B>
where B: BalanceSource + 'static
{
    /// Creates the state for a new connection. Session updates for this connection arrive on the returned receiver.
    pub fn new(api: PaymentVerificationApi<B>) -> (Self, mpsc::Receiver<SessionUpdate>) {
        let (updates, rx) = mpsc::channel(UPDATE_BUFFER_SIZE);
        (Self { api, updates, active: HashSet::new() }, rx)
    }

    /// Payments started on this connection that have not reported a result yet.
    pub fn active_payments(&self) -> &HashSet<PaymentId> {
        &self.active
    }

    /// Handles one text frame from the kiosk and returns the immediate reply.
    pub fn handle_text(&mut self, text: &str) -> ServerMessage {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(msg) => self.handle_message(msg),
            Err(e) => {
                debug!("🔌️ Could not parse client message. {e}. {text}");
                ServerMessage::error(format!("Invalid message. {e}"))
            },
        }
    }

    pub fn handle_message(&mut self, msg: ClientMessage) -> ServerMessage {
        match msg {
            ClientMessage::PaymentRequest { amount } => match self.api.start_payment(amount, self.updates.clone()) {
                Ok(handle) => {
                    self.active.insert(handle.payment_id.clone());
                    ServerMessage::PaymentInitiated {
                        payment_id: handle.payment_id,
                        amount: handle.amount,
                        timestamp: handle.started_at,
                    }
                },
                Err(e) => {
                    info!("🔌️ Payment request for {amount} refused. {e}");
                    ServerMessage::error(e)
                },
            },
            ClientMessage::CancelRequest { payment_id } => {
                let success = self.api.cancel_payment(&payment_id);
                ServerMessage::cancel_result(payment_id, success)
            },
        }
    }

    /// Turns a session update into the frames that are sent to the kiosk.
    ///
    /// A failed session is reported with an `error` frame ahead of its result, so that a kiosk which only watches for
    /// errors notices that the bank could not be reached.
    pub fn handle_update(&mut self, update: SessionUpdate) -> Vec<ServerMessage> {
        match update {
            SessionUpdate::Status(status) => vec![ServerMessage::PaymentStatus(status)],
            SessionUpdate::Finished(result) => {
                self.active.remove(&result.payment_id);
                let mut frames = Vec::with_capacity(2);
                if let SessionOutcome::Failed { error, .. } = &result.outcome {
                    frames.push(ServerMessage::error(format!("Payment {} failed. {error}", result.payment_id)));
                }
                frames.push(ServerMessage::from(&result));
                frames
            },
        }
    }

    /// Stops every session this connection started and is still waiting on.
    pub fn close(&mut self) -> usize {
        let abandoned = self.active.drain().filter(|id| self.api.abandon_payment(id)).count();
        if abandoned > 0 {
            info!("🔌️ Payment channel closed with {abandoned} payment(s) in progress. They have been cancelled.");
        }
        abandoned
    }
}

impl<B> Drop for PaymentChannel<B> {
    fn drop(&mut self) {
        for id in self.active.drain() {
            self.api.abandon_payment(&id);
        }
    }
}

/// Serves one payment channel connection until either side closes it.
pub async fn run_payment_channel<B>(api: PaymentVerificationApi<B>, mut session: Session, mut messages: MessageStream)
where B: BalanceSource + 'static {
    let started = Utc::now();
    debug!("🔌️ Payment channel opened");
    let (mut channel, mut updates) = PaymentChannel::new(api);
    let close_reason = loop {
        tokio::select! {
            msg = messages.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let reply = channel.handle_text(&text);
                    if send(&mut session, &reply).await.is_err() {
                        break None;
                    }
                },
                Some(Ok(Message::Binary(_))) => {
                    let reply = ServerMessage::error("Binary frames are not supported. Send JSON text frames.");
                    if send(&mut session, &reply).await.is_err() {
                        break None;
                    }
                },
                Some(Ok(Message::Ping(bytes))) => {
                    if session.pong(&bytes).await.is_err() {
                        break None;
                    }
                },
                Some(Ok(Message::Close(reason))) => break reason,
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    warn!("🔌️ Payment channel protocol error. {e}");
                    break None;
                },
                None => break None,
            },
            Some(update) = updates.recv() => {
                let mut sent = true;
                for frame in channel.handle_update(update) {
                    if send(&mut session, &frame).await.is_err() {
                        sent = false;
                        break;
                    }
                }
                if !sent {
                    break None;
                }
            },
        }
    };
    channel.close();
    let _ = session.close(close_reason).await;
    debug!("🔌️ Payment channel closed after {}s", (Utc::now() - started).num_seconds());
}

async fn send(session: &mut Session, msg: &ServerMessage) -> Result<(), actix_ws::Closed> {
    let text = match serde_json::to_string(msg) {
        Ok(text) => text,
        Err(e) => {
            error!("🔌️ Could not serialize {msg:?}. {e}");
            return Ok(());
        },
    };
    session.text(text).await
}
