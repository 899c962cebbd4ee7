use std::sync::Arc;

use async_trait::async_trait;
use kiosk_common::Won;
use thiserror::Error;

/// The authority on how much money is in the account. Typically a brokerage API, so every call is a network round
/// trip that can be slow or fail outright.
///
/// Implementations must be side-effect free from the caller's point of view: fetching the balance twice in a row
/// without any deposits in between returns the same value.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn fetch_balance(&self) -> Result<Won, BalanceSourceError>;
}

#[async_trait]
impl<T: BalanceSource + ?Sized> BalanceSource for Arc<T> {
    async fn fetch_balance(&self) -> Result<Won, BalanceSourceError> {
        (**self).fetch_balance().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceSourceError {
    #[error("The balance source is unreachable. {0}")]
    Unreachable(String),
    #[error("The balance source returned a malformed response. {0}")]
    MalformedResponse(String),
    #[error("The balance source rejected the request. {0}")]
    Rejected(String),
}
