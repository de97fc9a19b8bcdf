//! In-memory service reconciler for tests.
//!
//! # Why a mock reconciler?
//!
//! The real [`super::systemd::SystemdReconciler`] restarts system services,
//! which:
//!
//! - Requires root (or sudo) and a running systemd.
//! - Interrupts every client connected to the file server.
//! - Cannot be observed directly from Rust test code.
//!
//! `MockReconciler` replaces all of that with counters and a configurable
//! outcome, so tests can assert "the service was restarted exactly once" and
//! exercise the failure and timeout paths of the share manager.
//!
//! # Usage in tests
//!
//! ```ignore
//! let reconciler = Arc::new(MockReconciler::new());
//! let manager = ShareManager::new(store, reconciler.clone(), probe);
//!
//! manager.add_share(spec).await.unwrap();
//!
//! assert_eq!(reconciler.restart_count(), 1);
//! ```

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::application::reconcile_service::{ReconcileError, ServiceReconciler, ServiceState};

/// What [`MockReconciler::restart`] does when called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestartBehaviour {
    #[default]
    Succeed,
    /// Returns [`ReconcileError::CommandFailed`].
    Fail,
    /// Never completes; only a caller-side timeout ends the call.
    Hang,
}

/// A reconciler that records calls without touching any service.
#[derive(Default)]
pub struct MockReconciler {
    /// Number of `restart` calls, counted before the behaviour runs.
    pub restarts: Mutex<usize>,
    /// Outcome of the next `restart` calls.
    pub behaviour: Mutex<RestartBehaviour>,
    /// Reported by `status`.
    pub states: Mutex<BTreeMap<String, ServiceState>>,
}

impl MockReconciler {
    /// Creates a reconciler that succeeds and reports `smbd` and `nmbd` active.
    pub fn new() -> Self {
        let states = BTreeMap::from([
            ("nmbd".to_string(), ServiceState::Active),
            ("smbd".to_string(), ServiceState::Active),
        ]);
        Self {
            states: Mutex::new(states),
            ..Self::default()
        }
    }

    pub fn with_behaviour(behaviour: RestartBehaviour) -> Self {
        let mock = Self::new();
        mock.set_behaviour(behaviour);
        mock
    }

    pub fn set_behaviour(&self, behaviour: RestartBehaviour) {
        *self.behaviour.lock().expect("lock poisoned") = behaviour;
    }

    pub fn set_state(&self, unit: &str, state: ServiceState) {
        self.states
            .lock()
            .expect("lock poisoned")
            .insert(unit.to_string(), state);
    }

    pub fn restart_count(&self) -> usize {
        *self.restarts.lock().expect("lock poisoned")
    }
}

#[async_trait]
impl ServiceReconciler for MockReconciler {
    async fn restart(&self) -> Result<(), ReconcileError> {
        *self.restarts.lock().expect("lock poisoned") += 1;
        let behaviour = *self.behaviour.lock().expect("lock poisoned");
        match behaviour {
            RestartBehaviour::Succeed => Ok(()),
            RestartBehaviour::Fail => Err(ReconcileError::CommandFailed {
                command: "mock restart".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "mock failure".to_string(),
            }),
            RestartBehaviour::Hang => std::future::pending().await,
        }
    }

    async fn status(&self) -> BTreeMap<String, ServiceState> {
        self.states.lock().expect("lock poisoned").clone()
    }
}
