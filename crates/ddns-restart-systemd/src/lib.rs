// # systemd Network Restarter
//
// This crate restarts the host's networking through the service manager
// when the DDNS engine cannot reach the provider.
//
// ## Sequence
//
// 1. `sudo systemctl daemon-reload`: failure is logged and ignored
// 2. `sudo systemctl restart networking.service`: exit status decides the outcome
//
// Both commands are configurable and both are bounded by a timeout. A
// command still running when the timeout expires is killed.
//
// ## Privileges
//
// The default commands go through `sudo`. stdin is closed, so a sudo
// password prompt fails immediately instead of hanging.

use async_trait::async_trait;
use ddns_core::config::RestartConfig;
use ddns_core::traits::{NetworkRestarter, NetworkRestarterFactory};
use ddns_core::{Error, Result};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// How a command invocation ended
#[derive(Debug)]
enum CommandOutcome {
    /// Exit status 0
    Succeeded,
    /// Non-zero exit status, with combined stdout/stderr
    Failed { status: ExitStatus, output: String },
    /// Killed after the timeout expired
    TimedOut,
}

/// Network restarter backed by the service manager
#[derive(Debug, Clone)]
pub struct SystemdRestarter {
    /// Optional reload step (empty = skipped)
    reload_command: Vec<String>,

    /// Restart step
    restart_command: Vec<String>,

    /// Upper bound for each step
    timeout: Duration,
}

impl SystemdRestarter {
    /// Create a restarter from configuration
    pub fn new(config: &RestartConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            reload_command: config.reload_command.clone(),
            restart_command: config.restart_command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Override the per-command timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one command to completion or until the timeout
    ///
    /// `Err` only when the command could not be started.
    async fn run(&self, argv: &[String]) -> std::io::Result<CommandOutcome> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command")
        })?;

        tracing::debug!("Running: {}", argv.join(" "));

        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result?,
            Err(_) => return Ok(CommandOutcome::TimedOut),
        };

        if output.status.success() {
            return Ok(CommandOutcome::Succeeded);
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(stderr.trim());
        }

        Ok(CommandOutcome::Failed {
            status: output.status,
            output: combined,
        })
    }

    async fn reload(&self) {
        if self.reload_command.is_empty() {
            return;
        }

        match self.run(&self.reload_command).await {
            Ok(CommandOutcome::Succeeded) => {
                tracing::debug!("Service manager reloaded");
            }
            Ok(CommandOutcome::Failed { status, output }) => {
                tracing::warn!(
                    "Could not reload service manager ({}): {}. Continuing",
                    status,
                    output
                );
            }
            Ok(CommandOutcome::TimedOut) => {
                tracing::warn!(
                    "Service manager reload timed out after {:?}. Continuing",
                    self.timeout
                );
            }
            Err(e) => {
                tracing::warn!(
                    "Could not run {}: {}. Continuing",
                    self.reload_command.join(" "),
                    e
                );
            }
        }
    }
}

#[async_trait]
impl NetworkRestarter for SystemdRestarter {
    async fn restart_network(&self) -> Result<bool> {
        self.reload().await;

        match self.run(&self.restart_command).await {
            Ok(CommandOutcome::Succeeded) => {
                tracing::info!("Network restarted");
                Ok(true)
            }
            Ok(CommandOutcome::Failed { status, output }) => {
                tracing::warn!("Failed to restart network ({}): {}", status, output);
                Ok(false)
            }
            Ok(CommandOutcome::TimedOut) => {
                tracing::warn!("Network restart timed out after {:?}", self.timeout);
                Ok(false)
            }
            Err(e) => Err(Error::restart_invocation(format!(
                "{}: {}",
                self.restart_command.join(" "),
                e
            ))),
        }
    }

    fn restarter_name(&self) -> &'static str {
        "systemd"
    }
}

/// Factory for creating systemd restarters from configuration
pub struct SystemdFactory;

impl NetworkRestarterFactory for SystemdFactory {
    fn create(&self, config: &RestartConfig) -> Result<Box<dyn NetworkRestarter>> {
        Ok(Box::new(SystemdRestarter::new(config)?))
    }
}
