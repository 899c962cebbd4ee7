//! # KIS tools
//!
//! A small client for the Korea Investment & Securities (KIS) Open API. The kiosk only needs two things from the
//! brokerage: an OAuth access token, and the total cash deposit (예수금 총액) of a single account. Everything else the
//! API offers is ignored.
mod api;
mod config;
mod data_objects;
mod error;

pub use api::KisApi;
pub use config::{KisConfig, DEFAULT_ACCOUNT_PRODUCT_CODE, DEFAULT_KIS_BASE_URL};
pub use data_objects::{AccessToken, BalanceResponse, BalanceSummary, TokenRequest, TokenResponse};
pub use error::KisApiError;
