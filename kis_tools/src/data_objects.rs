use chrono::{DateTime, Utc};
use kiosk_common::{Secret, Won};
use serde::{Deserialize, Serialize};

use crate::KisApiError;

#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub appkey: String,
    pub appsecret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// A bearer token along with the time after which it must not be used any more.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: Secret<String>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.token.reveal().is_empty() && now < self.expires_at
    }
}

/// The subset of the `inquire-balance` response the kiosk cares about. `output1` (per-stock holdings) is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    pub rt_cd: String,
    #[serde(default)]
    pub msg1: String,
    #[serde(default)]
    pub output2: Vec<BalanceSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceSummary {
    /// Total cash deposit (예수금 총액), as a decimal string
    pub dnca_tot_amt: String,
}

impl BalanceResponse {
    /// Extracts the total deposit from a balance inquiry. The API signals success with `rt_cd == "0"`.
    pub fn deposit_amount(&self) -> Result<Won, KisApiError> {
        if self.rt_cd != "0" {
            return Err(KisApiError::InquiryRejected { code: self.rt_cd.clone(), message: self.msg1.clone() });
        }
        let summary = self.output2.first().ok_or(KisApiError::MissingDeposit)?;
        summary.dnca_tot_amt.parse::<Won>().map_err(|e| KisApiError::InvalidDepositAmount(e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn parse_successful_inquiry() {
        let json = r#"{
            "rt_cd": "0",
            "msg_cd": "KIOK0510",
            "msg1": "조회가 완료되었습니다",
            "output1": [],
            "output2": [{ "dnca_tot_amt": "1504500", "nxdy_excc_amt": "1504500" }]
        }"#;
        let response: BalanceResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.deposit_amount().unwrap(), Won::from(1_504_500));
    }

    #[test]
    fn rejected_inquiry() {
        let json = r#"{ "rt_cd": "1", "msg1": "초당 거래건수를 초과하였습니다" }"#;
        let response: BalanceResponse = serde_json::from_str(json).unwrap();
        let err = response.deposit_amount().unwrap_err();
        assert!(matches!(err, KisApiError::InquiryRejected { ref code, .. } if code == "1"));
    }

    #[test]
    fn missing_or_malformed_deposit() {
        let response: BalanceResponse = serde_json::from_str(r#"{ "rt_cd": "0", "output2": [] }"#).unwrap();
        assert!(matches!(response.deposit_amount(), Err(KisApiError::MissingDeposit)));
        let response: BalanceResponse =
            serde_json::from_str(r#"{ "rt_cd": "0", "output2": [{ "dnca_tot_amt": "12.5" }] }"#).unwrap();
        assert!(matches!(response.deposit_amount(), Err(KisApiError::InvalidDepositAmount(_))));
    }

    #[test]
    fn token_expiry() {
        let now = Utc::now();
        let token = AccessToken { token: Secret::new("abc".into()), expires_at: now + Duration::hours(23) };
        assert!(token.is_valid_at(now));
        assert!(!token.is_valid_at(now + Duration::hours(24)));
        let empty = AccessToken { token: Secret::default(), expires_at: now + Duration::hours(1) };
        assert!(!empty.is_valid_at(now));
    }
}
