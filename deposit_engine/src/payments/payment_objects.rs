use std::{fmt::Display, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use kiosk_common::{helpers::format_elapsed, Won};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 180;

//--------------------------------------     PaymentId       ---------------------------------------------------------
/// An opaque, unguessable payment identifier. Freshly minted ids are random v4 UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PaymentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl FromStr for PaymentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            Err("Payment id cannot be empty".into())
        } else {
            Ok(Self(s.to_string()))
        }
    }
}

//--------------------------------------   SessionConfig     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long to wait between two balance polls
    pub poll_interval: Duration,
    /// The number of polls after which an unmatched session times out. Always at least 1.
    pub max_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { poll_interval: DEFAULT_POLL_INTERVAL, max_attempts: DEFAULT_MAX_ATTEMPTS }
    }
}

impl SessionConfig {
    pub fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        Self { poll_interval, max_attempts: max_attempts.max(1) }
    }

    /// The nominal time budget of a session, i.e. the time between the first and the last poll.
    pub fn budget(&self) -> Duration {
        self.poll_interval.checked_mul(self.max_attempts.saturating_sub(1)).unwrap_or(Duration::MAX)
    }
}

//--------------------------------------   SessionState      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Initiated,
    Polling,
    Confirmed,
    TimedOut,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Initiated | Self::Polling)
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initiated => "Initiated",
            Self::Polling => "Polling",
            Self::Confirmed => "Confirmed",
            Self::TimedOut => "TimedOut",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    ClientRequest,
    ClientDisconnected,
}

//--------------------------------------   SessionOutcome    ---------------------------------------------------------
/// How a verification session ended. `attempt` is the number of the last poll that was started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Confirmed { actual_change: Won, attempt: u32 },
    TimedOut { actual_change: Won, attempt: u32 },
    Cancelled { reason: CancelReason, actual_change: Won, attempt: u32 },
    Failed { error: String, attempt: u32 },
}

impl SessionOutcome {
    pub fn state(&self) -> SessionState {
        match self {
            Self::Confirmed { .. } => SessionState::Confirmed,
            Self::TimedOut { .. } => SessionState::TimedOut,
            Self::Cancelled { .. } => SessionState::Cancelled,
            Self::Failed { .. } => SessionState::Failed,
        }
    }

    pub fn attempt(&self) -> u32 {
        match self {
            Self::Confirmed { attempt, .. } |
            Self::TimedOut { attempt, .. } |
            Self::Cancelled { attempt, .. } |
            Self::Failed { attempt, .. } => *attempt,
        }
    }

    pub fn actual_change(&self) -> Won {
        match self {
            Self::Confirmed { actual_change, .. } |
            Self::TimedOut { actual_change, .. } |
            Self::Cancelled { actual_change, .. } => *actual_change,
            Self::Failed { .. } => Won::default(),
        }
    }
}

//--------------------------------------   PaymentStatus     ---------------------------------------------------------
/// Progress report sent to the client after every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub payment_id: PaymentId,
    pub attempt: u32,
    pub max_attempts: u32,
    pub actual_change: Won,
}

//--------------------------------------   PaymentResult     ---------------------------------------------------------
/// The terminal report of a verification session. Exactly one of these is produced per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentResult {
    pub payment_id: PaymentId,
    pub expected_amount: Won,
    pub outcome: SessionOutcome,
    pub max_attempts: u32,
    pub poll_interval: Duration,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl PaymentResult {
    pub fn state(&self) -> SessionState {
        self.outcome.state()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SessionOutcome::Confirmed { .. })
    }

    /// A human-readable, one-line summary suitable for showing on the kiosk screen.
    pub fn message(&self) -> String {
        match &self.outcome {
            SessionOutcome::Confirmed { .. } => "Payment confirmed".to_string(),
            SessionOutcome::TimedOut { .. } => "Payment confirmation timed out".to_string(),
            SessionOutcome::Cancelled { reason: CancelReason::ClientRequest, .. } => {
                "Payment was cancelled at the user's request".to_string()
            },
            SessionOutcome::Cancelled { reason: CancelReason::ClientDisconnected, .. } => {
                "Payment was cancelled because the client disconnected".to_string()
            },
            SessionOutcome::Failed { error, .. } => format!("Payment could not be verified. {error}"),
        }
    }

    /// Outcome-specific details for the client. The common fields are always present.
    pub fn details(&self) -> Value {
        let mut details = json!({
            "payment_id": self.payment_id,
            "expected_amount": self.expected_amount,
            "actual_change": self.outcome.actual_change(),
            "attempt": self.outcome.attempt(),
            "elapsed_time": format_elapsed(self.elapsed),
        });
        let finished_at = self.finished_at.to_rfc3339();
        match &self.outcome {
            SessionOutcome::Confirmed { .. } => details["verified_at"] = json!(finished_at),
            SessionOutcome::Cancelled { reason, .. } => {
                details["cancelled_at"] = json!(finished_at);
                details["reason"] = json!(reason);
            },
            SessionOutcome::TimedOut { .. } => {
                let budget = self.poll_interval.checked_mul(self.max_attempts).unwrap_or(Duration::MAX);
                details["timeout_after"] = json!(format!("{}s", budget.as_secs()));
            },
            SessionOutcome::Failed { error, .. } => {
                details["failed_at"] = json!(finished_at);
                details["error"] = json!(error);
            },
        }
        details
    }
}

//--------------------------------------   SessionUpdate     ---------------------------------------------------------
/// Everything a session says to its client: zero or more status reports followed by exactly one result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Status(PaymentStatus),
    Finished(PaymentResult),
}

impl SessionUpdate {
    pub fn payment_id(&self) -> &PaymentId {
        match self {
            Self::Status(status) => &status.payment_id,
            Self::Finished(result) => &result.payment_id,
        }
    }
}
