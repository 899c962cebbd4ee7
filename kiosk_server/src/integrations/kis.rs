//! Wires the KIS Open API client into the deposit engine as its [`BalanceSource`].
use async_trait::async_trait;
use deposit_engine::{BalanceSource, BalanceSourceError};
use kiosk_common::Won;
use kis_tools::{KisApi, KisApiError};
use log::*;

#[derive(Clone)]
pub struct KisBalanceSource {
    api: KisApi,
}

impl KisBalanceSource {
    pub fn new(api: KisApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl BalanceSource for KisBalanceSource {
    async fn fetch_balance(&self) -> Result<Won, BalanceSourceError> {
        self.api.fetch_deposit_amount().await.map_err(|e| {
            debug!("🏦️ KIS balance inquiry failed. {e}");
            balance_source_error(e)
        })
    }
}

pub fn balance_source_error(e: KisApiError) -> BalanceSourceError {
    let message = e.to_string();
    match e {
        KisApiError::RestRequestError(_) | KisApiError::TokenError(_) => BalanceSourceError::Unreachable(message),
        KisApiError::QueryError { status, .. } if status >= 500 => BalanceSourceError::Unreachable(message),
        KisApiError::RestResponseError(_) |
        KisApiError::JsonError(_) |
        KisApiError::MissingDeposit |
        KisApiError::InvalidDepositAmount(_) => BalanceSourceError::MalformedResponse(message),
        KisApiError::Initialization(_) | KisApiError::QueryError { .. } | KisApiError::InquiryRejected { .. } => {
            BalanceSourceError::Rejected(message)
        },
    }
}
