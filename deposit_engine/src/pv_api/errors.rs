use kiosk_common::Won;
use thiserror::Error;

use crate::payments::RegistryError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("Payment amounts must be positive. {0} is not a valid amount")]
    InvalidAmount(Won),
    #[error("Could not register the payment session. {0}")]
    RegistrationError(#[from] RegistryError),
}
