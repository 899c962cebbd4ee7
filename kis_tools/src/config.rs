use log::*;
use kiosk_common::Secret;

use crate::KisApiError;

pub const DEFAULT_KIS_BASE_URL: &str = "https://openapi.koreainvestment.com:9443";
pub const DEFAULT_ACCOUNT_PRODUCT_CODE: &str = "01";

#[derive(Debug, Clone, Default)]
pub struct KisConfig {
    /// The root of the Open API, e.g. the production endpoint in [`DEFAULT_KIS_BASE_URL`].
    pub base_url: String,
    pub app_key: String,
    pub app_secret: Secret<String>,
    /// The first 8 digits of the account number (CANO)
    pub account_no: String,
    /// The last 2 digits of the account number (ACNT_PRDT_CD). Usually "01".
    pub account_product_code: String,
}

impl KisConfig {
    pub fn new(app_key: &str, app_secret: &str, account_no: &str) -> Self {
        Self {
            base_url: DEFAULT_KIS_BASE_URL.to_string(),
            app_key: app_key.to_string(),
            app_secret: Secret::new(app_secret.to_string()),
            account_no: account_no.to_string(),
            account_product_code: DEFAULT_ACCOUNT_PRODUCT_CODE.to_string(),
        }
    }

    /// Loads the credentials from `KIS_APP_KEY`, `KIS_APP_SECRET` and `KIS_ACCOUNT_NO`. These are mandatory: without
    /// them the kiosk cannot see its own account, so a missing value is an error rather than a default.
    ///
    /// `KIS_ACCOUNT_PROD_CODE` and `KIS_BASE_URL` are optional.
    pub fn try_from_env() -> Result<Self, KisApiError> {
        let required = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| KisApiError::Initialization(format!("{name} is not set")))
        };
        let app_key = required("KIS_APP_KEY")?;
        let app_secret = Secret::new(required("KIS_APP_SECRET")?);
        let account_no = required("KIS_ACCOUNT_NO")?;
        let account_product_code = std::env::var("KIS_ACCOUNT_PROD_CODE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| {
                info!("KIS_ACCOUNT_PROD_CODE not set, using {DEFAULT_ACCOUNT_PRODUCT_CODE} as default");
                DEFAULT_ACCOUNT_PRODUCT_CODE.to_string()
            });
        let base_url = std::env::var("KIS_BASE_URL").unwrap_or_else(|_| {
            debug!("KIS_BASE_URL not set, using the production endpoint");
            DEFAULT_KIS_BASE_URL.to_string()
        });
        Ok(Self { base_url, app_key, app_secret, account_no, account_product_code })
    }
}
