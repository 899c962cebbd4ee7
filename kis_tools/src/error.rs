use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum KisApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Could not obtain an access token. {0}")]
    TokenError(String),
    #[error("The balance inquiry was rejected. [{code}] {message}")]
    InquiryRejected { code: String, message: String },
    #[error("The balance inquiry did not contain any deposit information")]
    MissingDeposit,
    #[error("Invalid deposit amount: {0}")]
    InvalidDepositAmount(String),
}
