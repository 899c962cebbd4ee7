//! Kiosk Deposit Engine
//!
//! The deposit engine verifies kiosk payments by watching a brokerage account for incoming transfers. A customer is
//! shown an amount, sends it to the account, and the engine confirms the payment once the account balance has grown by
//! exactly that amount. It is provider-agnostic: anything that can report a balance implements [`BalanceSource`].
//!
//! The library is divided into these sections:
//! 1. The deposit ledger ([`mod@ledger`]). A cached balance that is reconciled against the balance source. All deposit
//!    detection happens here, under a single lock, so that a deposit is never attributed to two payments.
//! 2. Payment sessions ([`mod@payments`]). One polling task per payment, plus the registry that lets a client cancel a
//!    session it started.
//! 3. The payment verification API ([`mod@pv_api`]). The public face of the engine that the server calls into.
//!
//! The engine also carries an order event broadcaster ([`mod@events`]). Order events are published into a channel and
//! fanned out to every connected dashboard, each with its own bounded queue.
pub mod events;
pub mod ledger;
pub mod payments;
pub mod pv_api;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use ledger::{DepositCheck, DepositLedger, Drift, LedgerError, LedgerSnapshot, Resync};
pub use pv_api::{
    errors::PaymentError,
    payment_api::{PaymentHandle, PaymentVerificationApi},
};
pub use traits::{BalanceSource, BalanceSourceError};
