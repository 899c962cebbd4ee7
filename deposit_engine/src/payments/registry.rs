//! A routing table from payment ids to the cancel signal of the session that is verifying the payment.
//!
//! The registry has no lifecycle logic of its own. Sessions insert themselves when they start polling and remove
//! themselves, through their [`RegistrationGuard`], when they stop.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use log::*;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::payments::{CancelReason, PaymentId};

/// The sending half of a session's cancel signal. The channel has capacity 1; one pending cancel is all a session
/// ever needs.
pub type CancelSender = mpsc::Sender<CancelReason>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("A payment session with id {0} is already active")]
    DuplicatePaymentId(PaymentId),
}

#[derive(Default)]
pub struct SessionRegistry {
    entries: Mutex<HashMap<PaymentId, CancelSender>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PaymentId, CancelSender>> {
        self.entries.lock().unwrap_or_else(|e| {
            error!("💳️ The session registry lock was poisoned. Recovering the map as-is.");
            e.into_inner()
        })
    }

    /// Registers the cancel signal for a payment.
    ///
    /// Ids are unique, so a second registration under an active id is rejected rather than silently replacing the
    /// first session's entry. The returned guard removes the entry when it is released or dropped.
    pub fn register(self: &Arc<Self>, id: PaymentId, cancel: CancelSender) -> Result<RegistrationGuard, RegistryError> {
        let mut entries = self.entries();
        if entries.contains_key(&id) {
            warn!("💳️ Refusing to register payment {id} twice");
            return Err(RegistryError::DuplicatePaymentId(id));
        }
        entries.insert(id.clone(), cancel.clone());
        trace!("💳️ Payment {id} registered. {} active session(s)", entries.len());
        Ok(RegistrationGuard { registry: Arc::clone(self), id, cancel: Some(cancel) })
    }

    /// Delivers a cancel signal to the session verifying `id`, and removes its entry.
    ///
    /// Returns `false` if no such session is active. A session that already has a cancel pending still counts as
    /// found; the signal is never delivered twice.
    pub fn request_cancel(&self, id: &PaymentId, reason: CancelReason) -> bool {
        let mut entries = self.entries();
        let Some(cancel) = entries.remove(id) else {
            debug!("💳️ Cancel requested for {id}, but there is no active session with that id");
            return false;
        };
        match cancel.try_send(reason) {
            Ok(()) => debug!("💳️ Cancel signal ({reason:?}) delivered to payment {id}"),
            Err(TrySendError::Full(_)) => debug!("💳️ Payment {id} already has a cancel pending"),
            Err(TrySendError::Closed(_)) => debug!("💳️ Payment {id} is already shutting down"),
        }
        true
    }

    pub fn contains(&self, id: &PaymentId) -> bool {
        self.entries().contains_key(id)
    }

    pub fn active_count(&self) -> usize {
        self.entries().len()
    }

    /// The number of active sessions other than `id`.
    pub fn count_others(&self, id: &PaymentId) -> usize {
        let entries = self.entries();
        entries.len() - usize::from(entries.contains_key(id))
    }

    /// Removes the entry for `id`, but only if it still belongs to the channel `cancel` is part of.
    fn remove_if_owned(&self, id: &PaymentId, cancel: &CancelSender) -> bool {
        let mut entries = self.entries();
        match entries.get(id) {
            Some(entry) if entry.same_channel(cancel) => {
                entries.remove(id);
                true
            },
            _ => false,
        }
    }
}

/// Proof of registration held by a running session. Releasing it, explicitly or by dropping it, removes the
/// session's registry entry and lets go of the guard's handle on the cancel channel. This happens exactly once.
pub struct RegistrationGuard {
    registry: Arc<SessionRegistry>,
    id: PaymentId,
    cancel: Option<CancelSender>,
}

impl RegistrationGuard {
    pub fn payment_id(&self) -> &PaymentId {
        &self.id
    }

    /// True if any other session is registered right now.
    pub fn has_peers(&self) -> bool {
        self.registry.count_others(&self.id) > 0
    }

    pub fn is_released(&self) -> bool {
        self.cancel.is_none()
    }

    pub fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            if self.registry.remove_if_owned(&self.id, &cancel) {
                trace!("💳️ Payment {} deregistered", self.id);
            }
        }
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn id(s: &str) -> PaymentId {
        PaymentId::from(s.to_string())
    }

    #[test]
    fn register_and_cancel() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx, mut rx) = mpsc::channel(1);
        let _guard = registry.register(id("a"), tx).unwrap();
        assert!(registry.contains(&id("a")));
        assert!(registry.request_cancel(&id("a"), CancelReason::ClientRequest));
        assert_eq!(rx.try_recv(), Ok(CancelReason::ClientRequest));
        // The entry is gone after the first successful cancel
        assert!(!registry.contains(&id("a")));
        assert!(!registry.request_cancel(&id("a"), CancelReason::ClientRequest));
    }

    #[test]
    fn unknown_id_is_not_found() {
        let registry = SessionRegistry::new();
        assert!(!registry.request_cancel(&id("nope"), CancelReason::ClientRequest));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx1, mut rx1) = mpsc::channel(1);
        let (tx2, _rx2) = mpsc::channel(1);
        let _guard = registry.register(id("dup"), tx1).unwrap();
        let err = registry.register(id("dup"), tx2).err().expect("Expected an error");
        assert_eq!(err, RegistryError::DuplicatePaymentId(id("dup")));
        // The original session is still reachable
        assert!(registry.request_cancel(&id("dup"), CancelReason::ClientRequest));
        assert_eq!(rx1.try_recv(), Ok(CancelReason::ClientRequest));
    }

    #[test]
    fn pending_cancel_is_not_delivered_twice() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx, mut rx) = mpsc::channel(1);
        tx.try_send(CancelReason::ClientDisconnected).unwrap();
        let _guard = registry.register(id("busy"), tx).unwrap();
        assert!(registry.request_cancel(&id("busy"), CancelReason::ClientRequest));
        assert_eq!(rx.try_recv(), Ok(CancelReason::ClientDisconnected));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn peers_do_not_include_the_session_itself() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx_a, _rx_a) = mpsc::channel(1);
        let (tx_b, _rx_b) = mpsc::channel(1);
        let a = registry.register(id("a"), tx_a).unwrap();
        assert!(!a.has_peers());
        let b = registry.register(id("b"), tx_b).unwrap();
        assert!(a.has_peers());
        assert!(b.has_peers());
        drop(b);
        assert!(!a.has_peers());
        assert_eq!(registry.count_others(&id("nobody")), 1);
    }

    #[test]
    fn guard_cleans_up_exactly_once() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx, _rx) = mpsc::channel(1);
        let mut guard = registry.register(id("g"), tx).unwrap();
        assert_eq!(registry.active_count(), 1);
        guard.release();
        assert!(guard.is_released());
        assert_eq!(registry.active_count(), 0);
        guard.release();
        drop(guard);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn stale_guard_does_not_remove_a_newer_entry() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx1, _rx1) = mpsc::channel(1);
        let guard = registry.register(id("x"), tx1).unwrap();
        assert!(registry.request_cancel(&id("x"), CancelReason::ClientRequest));
        let (tx2, _rx2) = mpsc::channel(1);
        let _newer = registry.register(id("x"), tx2).unwrap();
        drop(guard);
        assert!(registry.contains(&id("x")));
    }

    #[test]
    fn dropping_the_guard_deregisters() {
        let registry = Arc::new(SessionRegistry::new());
        {
            let (tx, _rx) = mpsc::channel(1);
            let _guard = registry.register(id("scoped"), tx).unwrap();
            assert!(registry.contains(&id("scoped")));
        }
        assert!(!registry.contains(&id("scoped")));
    }
}
