use std::time::Duration;

use dashboard_core::AnalysisResult;

use crate::{FailureKind, FetchError, SourceReply};

pub const TIMEOUT_MESSAGE: &str = "Analysis service did not respond in time. Try again later.";
const GATEWAY_TIMEOUT_MESSAGE: &str = "Analysis service timed out. Try again later.";
const BAD_GATEWAY_MESSAGE: &str = "Analysis service is unavailable.";
const INVALID_PAYLOAD_MESSAGE: &str = "Analysis result could not be read.";

/// Backoff schedule and retry rules for analysis requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff_delays: Vec<Duration>,
    pub request_timeout: Duration,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_delays: [1_500, 3_000, 6_000, 10_000, 15_000]
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
            request_timeout: Duration::from_secs(120),
            retryable_statuses: vec![502, 504],
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> usize {
        self.backoff_delays.len() + 1
    }

    /// Delay after a failed attempt, clamped to the last configured delay.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        self.backoff_delays
            .get(attempt)
            .or_else(|| self.backoff_delays.last())
            .copied()
            .unwrap_or_default()
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// A timed-out or unreachable attempt retries under the same rule as a 504.
    pub fn retries_timeouts(&self) -> bool {
        self.is_retryable(504)
    }

    pub fn classify(&self, reply: Result<SourceReply, FetchError>) -> AttemptOutcome {
        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                return match err.kind {
                    FailureKind::Timeout | FailureKind::Network => AttemptOutcome::Timeout,
                    _ => AttemptOutcome::PermanentFailure {
                        status: None,
                        message: err.message,
                    },
                }
            }
        };

        if (200..300).contains(&reply.status) {
            return match AnalysisResult::from_json(&reply.body) {
                Ok(result) => AttemptOutcome::Success(result),
                Err(_) => AttemptOutcome::PermanentFailure {
                    status: Some(reply.status),
                    message: INVALID_PAYLOAD_MESSAGE.to_string(),
                },
            };
        }

        let message = error_message(reply.status, &String::from_utf8_lossy(&reply.body));
        if self.is_retryable(reply.status) {
            AttemptOutcome::TransientFailure {
                status: reply.status,
                message,
            }
        } else {
            AttemptOutcome::PermanentFailure {
                status: Some(reply.status),
                message,
            }
        }
    }
}

/// Result of one request attempt; retry decisions are driven by the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(AnalysisResult),
    TransientFailure { status: u16, message: String },
    PermanentFailure { status: Option<u16>, message: String },
    Timeout,
}

/// Response body text unless it is empty or looks like an HTML error page.
pub fn error_message(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if !trimmed.is_empty() && !trimmed.starts_with('<') {
        return body.to_string();
    }
    match status {
        504 => GATEWAY_TIMEOUT_MESSAGE.to_string(),
        502 => BAD_GATEWAY_MESSAGE.to_string(),
        other => format!("Failed to load analysis (status {other})."),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Pending,
    Succeeded,
    Failed,
}

/// Progress of one logical request through its attempts.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempt: usize,
    max_attempts: usize,
    status: Option<String>,
    outcome: RetryOutcome,
}

impl RetryState {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            status: None,
            outcome: RetryOutcome::Pending,
        }
    }

    pub fn begin(&mut self, attempt: usize) {
        debug_assert!(attempt < self.max_attempts);
        self.attempt = attempt;
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempt + 1 < self.max_attempts
    }

    pub fn record_status(&mut self, message: String) {
        self.status = Some(message);
    }

    pub fn finish(&mut self, outcome: RetryOutcome) {
        debug_assert_eq!(self.outcome, RetryOutcome::Pending, "second terminal transition");
        self.outcome = outcome;
    }

    pub fn attempt(&self) -> usize {
        self.attempt
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn outcome(&self) -> RetryOutcome {
        self.outcome
    }
}
