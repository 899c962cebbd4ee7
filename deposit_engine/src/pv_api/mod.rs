//! # Payment verification API
//!
//! [`PaymentVerificationApi`] is what the server talks to. It ties the [`DepositLedger`](crate::DepositLedger), the
//! [`SessionRegistry`](crate::payments::SessionRegistry) and the session configuration together, and spawns one
//! [`VerificationSession`](crate::payments::VerificationSession) task per payment.
//!
//! ```rust,ignore
//! let ledger = Arc::new(DepositLedger::initialize(my_balance_source).await?);
//! let api = PaymentVerificationApi::new(ledger, SessionConfig::default());
//! let (tx, mut rx) = tokio::sync::mpsc::channel(16);
//! let handle = api.start_payment(Won::from(4500), tx)?;
//! while let Some(update) = rx.recv().await {
//!     // forward to the client
//! }
//! ```
pub mod errors;
pub mod payment_api;
