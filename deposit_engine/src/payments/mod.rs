//! Deposit verification sessions and the registry that routes cancellations to them.
mod payment_objects;
mod registry;
mod session;

pub use payment_objects::{
    CancelReason,
    PaymentId,
    PaymentResult,
    PaymentStatus,
    SessionConfig,
    SessionOutcome,
    SessionState,
    SessionUpdate,
};
pub use registry::{CancelSender, RegistrationGuard, RegistryError, SessionRegistry};
pub use session::VerificationSession;

/// Log target for the payment audit trail: every payment request, poll and result. Route it with e.g.
/// `RUST_LOG=kiosk::payments=debug`.
pub const PAYMENT_LOG_TARGET: &str = "kiosk::payments";
