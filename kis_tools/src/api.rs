use std::sync::Arc;

use chrono::{Duration, Utc};
use kiosk_common::{Secret, Won};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use tokio::sync::Mutex;

use crate::{
    config::KisConfig,
    data_objects::{AccessToken, BalanceResponse, TokenRequest, TokenResponse},
    KisApiError,
};

/// Tokens are nominally valid for 24 hours. Renew an hour early so that a request never races the expiry.
const TOKEN_LIFETIME_HOURS: i64 = 23;
/// Transaction id of the domestic stock balance inquiry (real account)
const BALANCE_INQUIRY_TR_ID: &str = "TTTC8434R";

#[derive(Clone)]
pub struct KisApi {
    config: KisConfig,
    client: Arc<Client>,
    token: Arc<Mutex<Option<AccessToken>>>,
}

impl KisApi {
    pub fn new(config: KisConfig) -> Result<Self, KisApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| KisApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), token: Arc::new(Mutex::new(None)) })
    }

    pub fn config(&self) -> &KisConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Requests a fresh OAuth access token and caches it for subsequent inquiries.
    pub async fn issue_access_token(&self) -> Result<AccessToken, KisApiError> {
        let mut cached = self.token.lock().await;
        let token = self.request_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn request_token(&self) -> Result<AccessToken, KisApiError> {
        let body = TokenRequest {
            grant_type: "client_credentials".to_string(),
            appkey: self.config.app_key.clone(),
            appsecret: self.config.app_secret.reveal().clone(),
        };
        let url = self.url("/oauth2/tokenP");
        trace!("Requesting access token from {url}");
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| KisApiError::TokenError(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(KisApiError::TokenError(format!("The token endpoint returned HTTP {status}")));
        }
        let token = response.json::<TokenResponse>().await.map_err(|e| KisApiError::JsonError(e.to_string()))?;
        if token.access_token.is_empty() {
            return Err(KisApiError::TokenError("The token endpoint returned an empty token".into()));
        }
        info!("Access token issued for account {}", self.config.account_no);
        Ok(AccessToken {
            token: Secret::new(token.access_token),
            expires_at: Utc::now() + Duration::hours(TOKEN_LIFETIME_HOURS),
        })
    }

    /// Returns the cached token, requesting a new one if there is none or it has expired.
    async fn valid_token(&self) -> Result<Secret<String>, KisApiError> {
        let mut cached = self.token.lock().await;
        match cached.as_ref() {
            Some(token) if token.is_valid_at(Utc::now()) => Ok(token.token.clone()),
            _ => {
                debug!("Access token is missing or expired. Renewing it.");
                let token = self.request_token().await?;
                let result = token.token.clone();
                *cached = Some(token);
                Ok(result)
            },
        }
    }

    pub async fn fetch_balance(&self) -> Result<BalanceResponse, KisApiError> {
        let token = self.valid_token().await?;
        let params = [
            ("CANO", self.config.account_no.as_str()),
            ("ACNT_PRDT_CD", self.config.account_product_code.as_str()),
            ("AFHR_FLPR_YN", "N"),
            ("OFL_YN", ""),
            ("INQR_DVSN", "02"),
            ("UNPR_DVSN", "01"),
            ("FUND_STTL_ICLD_YN", "N"),
            ("FNCG_AMT_AUTO_RDPT_YN", "N"),
            ("PRCS_DVSN", "00"),
            ("CTX_AREA_FK100", ""),
            ("CTX_AREA_NK100", ""),
        ];
        let url = self.url("/uapi/domestic-stock/v1/trading/inquire-balance");
        trace!("Sending balance inquiry: {url}");
        let response = self
            .client
            .get(url)
            .query(&params)
            .header("authorization", format!("Bearer {}", token.reveal()))
            .header("appkey", self.config.app_key.as_str())
            .header("appsecret", self.config.app_secret.reveal().as_str())
            .header("tr_id", BALANCE_INQUIRY_TR_ID)
            .send()
            .await
            .map_err(|e| KisApiError::RestRequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("Balance inquiry successful. {}", response.status());
            response.json::<BalanceResponse>().await.map_err(|e| KisApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| KisApiError::RestResponseError(e.to_string()))?;
            Err(KisApiError::QueryError { status, message })
        }
    }

    /// Fetches the total cash deposit of the configured account.
    pub async fn fetch_deposit_amount(&self) -> Result<Won, KisApiError> {
        let balance = self.fetch_balance().await?;
        let amount = balance.deposit_amount()?;
        trace!("Deposit for account {}: {amount}", self.config.account_no);
        Ok(amount)
    }
}
