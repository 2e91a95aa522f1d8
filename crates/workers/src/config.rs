//! Worker configuration

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the processing loop does when a job handler panics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerPanicPolicy {
    /// Drop the panicking job and keep consuming
    #[default]
    ContinueWorker,
    /// Cancel the worker; no further jobs are accepted
    StopWorker,
}

impl std::str::FromStr for HandlerPanicPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" | "continue_worker" => Ok(Self::ContinueWorker),
            "stop" | "stop_worker" => Ok(Self::StopWorker),
            other => Err(ConfigError::InvalidValue {
                key: "WORKER_HANDLER_PANIC_POLICY",
                value: other.to_string(),
            }),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Configuration for a single worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Worker ID, the key under which it is registered in a pool
    pub id: String,

    /// Behavior on handler panic
    #[serde(default)]
    pub on_handler_panic: HandlerPanicPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            id: format!("worker-{}", Uuid::now_v7()),
            on_handler_panic: HandlerPanicPolicy::default(),
        }
    }
}

impl WorkerConfig {
    /// Create a configuration with the given ID
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `WORKER_ID`: Worker ID (default: `worker-<uuid v7>`)
    /// - `WORKER_HANDLER_PANIC_POLICY`: `continue` or `stop` (default: `continue`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(id) = std::env::var("WORKER_ID") {
            config.id = id;
        }

        if let Ok(policy) = std::env::var("WORKER_HANDLER_PANIC_POLICY") {
            config.on_handler_panic = policy.parse()?;
        }

        Ok(config)
    }

    /// Set the worker ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the handler panic policy
    pub fn with_panic_policy(mut self, policy: HandlerPanicPolicy) -> Self {
        self.on_handler_panic = policy;
        self
    }
}
