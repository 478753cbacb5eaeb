//! In-memory engine statistics
//!
//! Folds [`EngineEvent`]s into counters an operator can read through the
//! daemon's debug endpoint. Nothing here is persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::{EngineEvent, EngineState};

/// Counters and last outcomes derived from engine events
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    /// Current engine state
    pub state: EngineState,
    /// When the engine started
    pub started_at: Option<DateTime<Utc>>,
    /// Update requests sent (startup, scheduled and retries)
    pub update_attempts: u64,
    /// Update requests accepted by the provider
    pub update_successes: u64,
    /// Update requests that failed
    pub update_failures: u64,
    /// Network restarts invoked
    pub restart_attempts: u64,
    /// Network restarts that did not succeed or could not be invoked
    pub restart_failures: u64,
    /// Time of the last accepted update
    pub last_success_at: Option<DateTime<Utc>>,
    /// Provider response to the last accepted update
    pub last_response: Option<String>,
    /// Time of the last failure
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Last update or restart error
    pub last_error: Option<String>,
    /// Why the engine stopped, once it has
    pub stop_reason: Option<String>,
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineStats {
    /// Create empty statistics
    pub fn new() -> Self {
        Self {
            state: EngineState::Idle,
            started_at: None,
            update_attempts: 0,
            update_successes: 0,
            update_failures: 0,
            restart_attempts: 0,
            restart_failures: 0,
            last_success_at: None,
            last_response: None,
            last_failure_at: None,
            last_error: None,
            stop_reason: None,
        }
    }

    /// Apply one engine event
    pub fn record(&mut self, event: &EngineEvent) {
        let now = Utc::now();

        match event {
            EngineEvent::Started { .. } => {
                self.started_at = Some(now);
            }
            EngineEvent::StateChanged { state } => {
                self.state = *state;
            }
            EngineEvent::UpdateAttempted { .. } => {
                self.update_attempts += 1;
            }
            EngineEvent::UpdateSucceeded { body, .. } => {
                self.update_successes += 1;
                self.last_success_at = Some(now);
                self.last_response = Some(body.clone());
            }
            EngineEvent::UpdateFailed { error, .. } => {
                self.update_failures += 1;
                self.last_failure_at = Some(now);
                self.last_error = Some(error.clone());
            }
            EngineEvent::RestartAttempted => {
                self.restart_attempts += 1;
            }
            EngineEvent::RestartCompleted { ok } => {
                if !ok {
                    self.restart_failures += 1;
                    self.last_failure_at = Some(now);
                    self.last_error = Some("network restart did not succeed".to_string());
                }
            }
            EngineEvent::RestartFailed { error } => {
                self.restart_failures += 1;
                self.last_failure_at = Some(now);
                self.last_error = Some(error.clone());
            }
            EngineEvent::Stopped { reason } => {
                self.state = EngineState::Shutdown;
                self.stop_reason = Some(reason.clone());
            }
        }
    }
}
