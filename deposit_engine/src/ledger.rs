//! # Deposit ledger
//!
//! The ledger is the only piece of state shared between payment sessions: the last balance we saw on the brokerage
//! account. A deposit is detected by fetching a fresh balance and comparing it with the cached one, so the
//! fetch-compare-store sequence must be atomic. Otherwise two sessions polling at the same time could both see the
//! same deposit, or both miss it.
//!
//! For that reason the write lock is held across the network call in [`DepositLedger::reconcile_and_check`]. This
//! serialises polls from concurrent sessions, which is the price of never double-counting a delta.
use chrono::{DateTime, Utc};
use kiosk_common::Won;
use log::*;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::traits::{BalanceSource, BalanceSourceError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Could not fetch the account balance. {0}")]
    FetchError(#[from] BalanceSourceError),
}

/// The result of a single poll against the balance source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositCheck {
    /// True iff `actual_delta` is exactly the expected amount
    pub matched: bool,
    /// The change in balance since the previous observation. Negative for withdrawals.
    pub actual_delta: Won,
    pub previous_balance: Won,
    pub current_balance: Won,
}

/// A discrepancy between the cached balance and the balance source that was found outside the polling path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drift {
    pub cached: Won,
    pub observed: Won,
}

impl Drift {
    pub fn amount(&self) -> Won {
        self.observed - self.cached
    }
}

/// What a [`DepositLedger::resync_unless`] call did with the balance it fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resync {
    InSync,
    Corrected(Drift),
    /// The balance moved, but the cache was left alone
    Deferred(Drift),
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LedgerSnapshot {
    pub balance: Won,
    pub last_synced_at: DateTime<Utc>,
}

struct LedgerState {
    cached_balance: Won,
    last_synced_at: DateTime<Utc>,
}

pub struct DepositLedger<B> {
    source: B,
    state: RwLock<LedgerState>,
}

impl<B: BalanceSource> DepositLedger<B> {
    /// Fetches the opening balance and creates the ledger. No payment can be verified without a baseline, so callers
    /// should treat an error here as fatal.
    pub async fn initialize(source: B) -> Result<Self, LedgerError> {
        let balance = source.fetch_balance().await.map_err(|e| {
            error!("🏦️ Could not fetch the opening balance. {e}");
            e
        })?;
        info!("🏦️ Deposit ledger initialised. Opening balance: {balance}");
        let state = LedgerState { cached_balance: balance, last_synced_at: Utc::now() };
        Ok(Self { source, state: RwLock::new(state) })
    }

    /// The last balance the ledger stored. This never goes to the network.
    pub async fn current_balance(&self) -> Won {
        self.state.read().await.cached_balance
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.read().await;
        LedgerSnapshot { balance: state.cached_balance, last_synced_at: state.last_synced_at }
    }

    /// Fetches a fresh balance, stores it, and reports how much it changed since the last observation.
    ///
    /// Fetch failures are returned to the caller untouched. The cached balance is only overwritten after a
    /// successful fetch.
    pub async fn reconcile_and_check(&self, expected_delta: Won) -> Result<DepositCheck, LedgerError> {
        let mut state = self.state.write().await;
        let fresh = self.source.fetch_balance().await?;
        let previous = state.cached_balance;
        let actual_delta = fresh - previous;
        state.cached_balance = fresh;
        state.last_synced_at = Utc::now();
        trace!("🏦️ Balance {previous} -> {fresh} ({actual_delta}). Expected change: {expected_delta}");
        Ok(DepositCheck {
            matched: actual_delta == expected_delta,
            actual_delta,
            previous_balance: previous,
            current_balance: fresh,
        })
    }

    /// Brings the cache in line with the balance source without attributing the difference to anyone.
    ///
    /// Returns the drift if the cached value was out of date. This is a correction, not an error: money that arrived
    /// while nobody was polling simply becomes part of the baseline.
    pub async fn resync(&self) -> Result<Option<Drift>, LedgerError> {
        match self.resync_unless(|| false).await? {
            Resync::Corrected(drift) => Ok(Some(drift)),
            Resync::InSync | Resync::Deferred(_) => Ok(None),
        }
    }

    /// Like [`DepositLedger::resync`], but a drift is left in place if `busy` returns true.
    ///
    /// `busy` is evaluated after the fetch and while the write lock is held. A change that might belong to a session
    /// that is already polling is then still reported by the next [`DepositLedger::reconcile_and_check`].
    pub async fn resync_unless<F>(&self, busy: F) -> Result<Resync, LedgerError>
    where F: FnOnce() -> bool {
        let mut state = self.state.write().await;
        let observed = self.source.fetch_balance().await?;
        let cached = state.cached_balance;
        state.last_synced_at = Utc::now();
        if observed == cached {
            trace!("🏦️ Cached balance is in sync: {cached}");
            return Ok(Resync::InSync);
        }
        let drift = Drift { cached, observed };
        if busy() {
            let amount = drift.amount();
            info!("🏦️ Balance moved by {amount} while other payments are polling. Leaving it for the next poll");
            return Ok(Resync::Deferred(drift));
        }
        state.cached_balance = observed;
        warn!("🏦️ Cached balance ({cached}) disagreed with the account ({observed}). Corrected by {}", drift.amount());
        Ok(Resync::Corrected(drift))
    }
}
