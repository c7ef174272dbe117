//! Process configuration loaded from the environment.
//!
//! | variable | default |
//! |---|---|
//! | `OPSFORGE_BIND` | `0.0.0.0:8080` |
//! | `OPSFORGE_REDELIVERY_POLICY` | none, required |
//! | `OPSFORGE_MAX_STEPS` | `256` |

use std::net::SocketAddr;

use thiserror::Error;

use opsforge_automation::execution::DEFAULT_MAX_STEPS;

use crate::trigger::{DispatcherConfig, ParsePolicyError, RedeliveryPolicy};

pub const BIND_VAR: &str = "OPSFORGE_BIND";
pub const POLICY_VAR: &str = "OPSFORGE_REDELIVERY_POLICY";
pub const MAX_STEPS_VAR: &str = "OPSFORGE_MAX_STEPS";

const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {message}")]
    Invalid { var: &'static str, message: String },

    #[error(transparent)]
    Policy(#[from] ParsePolicyError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub redelivery_policy: RedeliveryPolicy,
    pub max_steps: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map instead of the process env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = lookup(BIND_VAR).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
            var: BIND_VAR,
            message: format!("'{bind_raw}': {e}"),
        })?;

        let redelivery_policy = lookup(POLICY_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(POLICY_VAR))?
            .parse::<RedeliveryPolicy>()?;

        let max_steps = match lookup(MAX_STEPS_VAR) {
            None => DEFAULT_MAX_STEPS,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: MAX_STEPS_VAR,
                        message: format!("'{raw}' is not a positive integer"),
                    });
                }
            },
        };

        Ok(Self {
            bind,
            redelivery_policy,
            max_steps,
        })
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig::new(self.redelivery_policy).with_max_steps(self.max_steps)
    }
}
