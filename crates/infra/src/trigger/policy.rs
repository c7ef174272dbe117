//! What to do when the same lifecycle event is delivered to a rule again.
//!
//! The bus is at-least-once, so the dispatcher sees duplicates. There is no
//! implicit default: the policy is chosen by configuration.

use core::fmt;
use core::str::FromStr;

use thiserror::Error;

use opsforge_automation::{RunRecord, RunStatus};

/// Attempt budget used when `retry_failed:<mode>` omits the count.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How a retry of a failed run proceeds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResumeMode {
    /// Walk again from the start target with a fresh context.
    Restart,
    /// Re-enter at the failed action with the failed run's context, on the
    /// same rule version the failed run walked.
    Resume,
}

impl ResumeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeMode::Restart => "restart",
            ResumeMode::Resume => "resume",
        }
    }
}

/// Redelivery policy for (event id, rule id) pairs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RedeliveryPolicy {
    /// Every delivery starts a fresh run.
    RunEveryDelivery,
    /// A delivery whose pair already has a run is skipped.
    IgnoreDuplicates,
    /// Duplicates are skipped unless the latest run failed and fewer than
    /// `max_attempts` runs exist (the first run counts as an attempt).
    RetryFailed { mode: ResumeMode, max_attempts: u32 },
}

impl RedeliveryPolicy {
    pub fn retry_failed(mode: ResumeMode, max_attempts: u32) -> Self {
        Self::RetryFailed { mode, max_attempts }
    }

    /// Decide what a delivery does, given the existing runs of the pair
    /// ordered oldest attempt first.
    pub fn decide(&self, previous_runs: &[RunRecord]) -> DeliveryDecision {
        let next_attempt = previous_runs.len() as u32 + 1;
        let Some(latest) = previous_runs.last() else {
            return DeliveryDecision::Start { attempt: 1 };
        };

        match *self {
            RedeliveryPolicy::RunEveryDelivery => DeliveryDecision::Start { attempt: next_attempt },
            RedeliveryPolicy::IgnoreDuplicates => DeliveryDecision::Skip {
                reason: SkipReason::Duplicate,
            },
            RedeliveryPolicy::RetryFailed { mode, max_attempts } => match latest.status {
                RunStatus::Running => DeliveryDecision::Skip {
                    reason: SkipReason::InProgress,
                },
                RunStatus::Succeeded => DeliveryDecision::Skip {
                    reason: SkipReason::AlreadySucceeded,
                },
                RunStatus::Failed { .. } if previous_runs.len() as u32 >= max_attempts => DeliveryDecision::Skip {
                    reason: SkipReason::AttemptsExhausted {
                        attempts: previous_runs.len() as u32,
                    },
                },
                RunStatus::Failed { .. } => DeliveryDecision::Retry {
                    attempt: next_attempt,
                    previous: Box::new(latest.clone()),
                    mode,
                },
            },
        }
    }
}

impl fmt::Display for RedeliveryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedeliveryPolicy::RunEveryDelivery => f.write_str("run_every_delivery"),
            RedeliveryPolicy::IgnoreDuplicates => f.write_str("ignore_duplicates"),
            RedeliveryPolicy::RetryFailed { mode, max_attempts } => {
                write!(f, "retry_failed:{}:{max_attempts}", mode.as_str())
            }
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid redelivery policy '{input}': {reason}")]
pub struct ParsePolicyError {
    pub input: String,
    pub reason: String,
}

impl ParsePolicyError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

impl FromStr for RedeliveryPolicy {
    type Err = ParsePolicyError;

    /// `run_every_delivery`, `ignore_duplicates`, `retry_failed:restart[:N]`
    /// or `retry_failed:resume[:N]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut parts = trimmed.split(':');

        match parts.next() {
            Some("run_every_delivery") if parts.next().is_none() => Ok(Self::RunEveryDelivery),
            Some("ignore_duplicates") if parts.next().is_none() => Ok(Self::IgnoreDuplicates),
            Some("retry_failed") => {
                let mode = match parts.next() {
                    Some("restart") => ResumeMode::Restart,
                    Some("resume") => ResumeMode::Resume,
                    Some(other) => {
                        return Err(ParsePolicyError::new(s, format!("unknown retry mode '{other}'")));
                    }
                    None => return Err(ParsePolicyError::new(s, "retry mode (restart|resume) is required")),
                };
                let max_attempts = match parts.next() {
                    Some(n) => n
                        .parse::<u32>()
                        .map_err(|_| ParsePolicyError::new(s, format!("'{n}' is not a valid attempt count")))?,
                    None => DEFAULT_MAX_ATTEMPTS,
                };
                if max_attempts == 0 {
                    return Err(ParsePolicyError::new(s, "attempt count must be at least 1"));
                }
                if parts.next().is_some() {
                    return Err(ParsePolicyError::new(s, "unexpected trailing segment"));
                }
                Ok(Self::RetryFailed { mode, max_attempts })
            }
            _ => Err(ParsePolicyError::new(
                s,
                "expected run_every_delivery, ignore_duplicates or retry_failed:<restart|resume>[:N]",
            )),
        }
    }
}

/// Why a delivery does not start a run.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Duplicate,
    InProgress,
    AlreadySucceeded,
    AttemptsExhausted { attempts: u32 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Duplicate => f.write_str("duplicate delivery"),
            SkipReason::InProgress => f.write_str("a run for this delivery is still in progress"),
            SkipReason::AlreadySucceeded => f.write_str("a run for this delivery already succeeded"),
            SkipReason::AttemptsExhausted { attempts } => write!(f, "retry budget exhausted after {attempts} attempts"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryDecision {
    /// Start a run from the entry with a fresh context.
    Start { attempt: u32 },
    /// Retry the failed `previous` run.
    Retry {
        attempt: u32,
        previous: Box<RunRecord>,
        mode: ResumeMode,
    },
    Skip { reason: SkipReason },
}
