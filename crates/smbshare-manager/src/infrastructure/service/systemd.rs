//! systemd-backed service reconciler.
//!
//! Restarting runs `systemctl restart <unit>` for every configured unit in
//! order (`smbd` then `nmbd` by default) and stops at the first failure.
//! Status runs `systemctl is-active <unit>` per unit and maps its output;
//! the exit code is ignored because `is-active` exits non-zero for any
//! state other than `active`.
//!
//! Child processes are spawned with `kill_on_drop`, so when a restart is
//! abandoned by the caller's timeout the `systemctl` process goes with it.

use std::collections::BTreeMap;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::application::reconcile_service::{ReconcileError, ServiceReconciler, ServiceState};
use crate::infrastructure::storage::config::ServiceConfig;

/// Drives the file-sharing service through `systemctl`.
#[derive(Debug, Clone)]
pub struct SystemdReconciler {
    units: Vec<String>,
    systemctl: String,
    use_sudo: bool,
}

impl SystemdReconciler {
    pub fn new(units: Vec<String>) -> Self {
        Self {
            units,
            systemctl: "systemctl".to_string(),
            use_sudo: false,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.units.clone())
            .with_systemctl(config.systemctl_path.clone())
            .with_sudo(config.use_sudo)
    }

    /// Overrides the control program (mainly for tests).
    pub fn with_systemctl(mut self, program: impl Into<String>) -> Self {
        self.systemctl = program.into();
        self
    }

    pub fn with_sudo(mut self, use_sudo: bool) -> Self {
        self.use_sudo = use_sudo;
        self
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    /// Builds the command line for `action` on `unit`.
    fn command(&self, action: &str, unit: &str) -> (Command, String) {
        let mut argv: Vec<&str> = Vec::with_capacity(4);
        if self.use_sudo {
            argv.push("sudo");
        }
        argv.extend([self.systemctl.as_str(), action, unit]);

        let mut cmd = Command::new(argv[0]);
        cmd.args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        (cmd, argv.join(" "))
    }

    async fn run(&self, action: &str, unit: &str) -> Result<(Output, String), ReconcileError> {
        let (mut cmd, command_line) = self.command(action, unit);
        debug!(command = %command_line, "running");
        match cmd.output().await {
            Ok(output) => Ok((output, command_line)),
            Err(source) => Err(ReconcileError::Spawn {
                command: command_line,
                source,
            }),
        }
    }
}

#[async_trait]
impl ServiceReconciler for SystemdReconciler {
    async fn restart(&self) -> Result<(), ReconcileError> {
        for unit in &self.units {
            let (output, command) = self.run("restart", unit).await?;
            if !output.status.success() {
                return Err(ReconcileError::CommandFailed {
                    command,
                    status: output.status.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            info!(unit = %unit, "service unit restarted");
        }
        Ok(())
    }

    async fn status(&self) -> BTreeMap<String, ServiceState> {
        let mut states = BTreeMap::new();
        for unit in &self.units {
            let state = match self.run("is-active", unit).await {
                Ok((output, _)) => {
                    ServiceState::from_systemctl(&String::from_utf8_lossy(&output.stdout))
                }
                Err(e) => {
                    warn!(unit = %unit, "status query failed: {e}");
                    ServiceState::Error
                }
            };
            states.insert(unit.clone(), state);
        }
        states
    }
}
