//! ReconcileServiceUseCase: make the file-sharing service adopt new configuration.
//!
//! The share manager never interprets service output itself.  It calls a
//! [`ServiceReconciler`] after each committed write and reports whether the
//! call succeeded within the configured time bound.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Error type for service reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The controlling command could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The controlling command ran and reported failure.
    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The restart did not complete within the time bound.
    #[error("service restart did not finish within {0:?}")]
    Timeout(Duration),
}

/// Reported state of one service component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Active,
    Inactive,
    Unknown,
    Error,
}

impl ServiceState {
    /// Maps `systemctl is-active` output to a state.
    ///
    /// `failed` is reported as [`ServiceState::Error`]; transitional states
    /// such as `activating` and anything unrecognised are `Unknown`.
    pub fn from_systemctl(output: &str) -> Self {
        match output.trim() {
            "active" => ServiceState::Active,
            "inactive" => ServiceState::Inactive,
            "failed" => ServiceState::Error,
            _ => ServiceState::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceState::Active => "active",
            ServiceState::Inactive => "inactive",
            ServiceState::Unknown => "unknown",
            ServiceState::Error => "error",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability to control the external file-sharing service.
///
/// The production implementation drives systemd; tests use
/// [`crate::infrastructure::service::mock::MockReconciler`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceReconciler: Send + Sync {
    /// Restarts every component so it re-reads the configuration.
    async fn restart(&self) -> Result<(), ReconcileError>;

    /// Reports the state of each component, keyed by component name.
    async fn status(&self) -> BTreeMap<String, ServiceState>;
}

/// Runs [`ServiceReconciler::restart`] bounded by `limit`.
///
/// An elapsed bound becomes [`ReconcileError::Timeout`]; the abandoned
/// restart future is dropped, never retried.
pub async fn restart_within(
    reconciler: &dyn ServiceReconciler,
    limit: Duration,
) -> Result<(), ReconcileError> {
    match tokio::time::timeout(limit, reconciler.restart()).await {
        Ok(result) => result,
        Err(_) => {
            warn!(?limit, "service restart timed out");
            Err(ReconcileError::Timeout(limit))
        }
    }
}
