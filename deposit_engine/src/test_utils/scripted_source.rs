use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
};

use async_trait::async_trait;
use kiosk_common::Won;

use crate::traits::{BalanceSource, BalanceSourceError};

/// An in-memory [`BalanceSource`].
///
/// By default every fetch returns the current balance, which tests move around with [`Self::deposit`] and
/// [`Self::set_balance`]. For exact, step-by-step scenarios, [`Self::script`] queues the results of the next fetches;
/// each fetch consumes one entry and scripted balances become the new current balance.
///
/// Clones share state, so a test can keep one copy and hand the other to a ledger.
#[derive(Clone, Default)]
pub struct ScriptedBalanceSource {
    balance: Arc<AtomicI64>,
    script: Arc<Mutex<VecDeque<Result<Won, BalanceSourceError>>>>,
    fetches: Arc<AtomicUsize>,
}

impl ScriptedBalanceSource {
    pub fn new(initial: i64) -> Self {
        let source = Self::default();
        source.set_balance(initial);
        source
    }

    pub fn set_balance(&self, balance: i64) {
        self.balance.store(balance, Ordering::SeqCst);
    }

    pub fn deposit(&self, amount: i64) {
        self.balance.fetch_add(amount, Ordering::SeqCst);
    }

    pub fn balance(&self) -> Won {
        Won::from(self.balance.load(Ordering::SeqCst))
    }

    pub fn script<I>(&self, results: I)
    where I: IntoIterator<Item = Result<i64, BalanceSourceError>> {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script.extend(results.into_iter().map(|r| r.map(Won::from)));
    }

    /// Makes the next fetch fail with the given error.
    pub fn fail_next_fetch(&self, error: BalanceSourceError) {
        self.script([Err(error)]);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceSource for ScriptedBalanceSource {
    async fn fetch_balance(&self) -> Result<Won, BalanceSourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match next {
            Some(Ok(balance)) => {
                self.set_balance(balance.value());
                Ok(balance)
            },
            Some(Err(e)) => Err(e),
            None => Ok(self.balance()),
        }
    }
}
