//! Test doubles and common utilities for engine contract tests
//!
//! The doubles replay a script of outcomes and record every call into a
//! shared log, so tests can check both counts and ordering.

#![allow(dead_code)]

use ddns_core::config::{EngineConfig, FailurePolicy};
use ddns_core::error::{Error, Result};
use ddns_core::traits::{DnsUpdater, NetworkRestarter, UpdateResponse, UpdateStatus};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One entry in the shared call log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Update,
    Restart,
}

/// Ordered record of calls made by the engine
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }
}

/// Scripted result of one update attempt
#[derive(Debug, Clone, Copy)]
pub enum UpdateScript {
    /// `200 good`
    Good,
    /// Connection timed out
    Timeout,
    /// `200 badauth`
    BadAuth,
    /// Never completes
    Hang,
}

/// A DnsUpdater that replays a script, then succeeds forever
pub struct ScriptedUpdater {
    script: Arc<Mutex<VecDeque<UpdateScript>>>,
    update_call_count: Arc<AtomicUsize>,
    log: CallLog,
}

impl ScriptedUpdater {
    pub fn new(script: impl IntoIterator<Item = UpdateScript>, log: &CallLog) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            update_call_count: Arc::new(AtomicUsize::new(0)),
            log: log.clone(),
        }
    }

    /// Get the number of times update() was called
    pub fn update_call_count(&self) -> usize {
        self.update_call_count.load(Ordering::SeqCst)
    }

    /// Create a new ScriptedUpdater that shares script and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            script: Arc::clone(&other.script),
            update_call_count: Arc::clone(&other.update_call_count),
            log: other.log.clone(),
        }
    }
}

#[async_trait::async_trait]
impl DnsUpdater for ScriptedUpdater {
    async fn update(&self) -> Result<UpdateResponse> {
        self.update_call_count.fetch_add(1, Ordering::SeqCst);
        self.log.push(Call::Update);

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(UpdateScript::Good);

        match next {
            UpdateScript::Good => Ok(UpdateResponse {
                status: 200,
                body: "good 203.0.113.7".to_string(),
                outcome: UpdateStatus::Good {
                    ip: Some("203.0.113.7".parse().unwrap()),
                },
            }),
            UpdateScript::Timeout => Err(Error::transport("operation timed out")),
            UpdateScript::BadAuth => Err(Error::rejected(200, "badauth")),
            UpdateScript::Hang => std::future::pending().await,
        }
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Scripted result of one restart
#[derive(Debug, Clone, Copy)]
pub enum RestartScript {
    Ok,
    NotOk,
    InvocationError,
}

/// A NetworkRestarter that replays a script, then succeeds forever
pub struct ScriptedRestarter {
    script: Arc<Mutex<VecDeque<RestartScript>>>,
    restart_call_count: Arc<AtomicUsize>,
    log: CallLog,
}

impl ScriptedRestarter {
    pub fn new(script: impl IntoIterator<Item = RestartScript>, log: &CallLog) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            restart_call_count: Arc::new(AtomicUsize::new(0)),
            log: log.clone(),
        }
    }

    /// Get the number of times restart_network() was called
    pub fn restart_call_count(&self) -> usize {
        self.restart_call_count.load(Ordering::SeqCst)
    }

    /// Create a new ScriptedRestarter that shares script and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            script: Arc::clone(&other.script),
            restart_call_count: Arc::clone(&other.restart_call_count),
            log: other.log.clone(),
        }
    }
}

#[async_trait::async_trait]
impl NetworkRestarter for ScriptedRestarter {
    async fn restart_network(&self) -> Result<bool> {
        self.restart_call_count.fetch_add(1, Ordering::SeqCst);
        self.log.push(Call::Restart);

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RestartScript::Ok);

        match next {
            RestartScript::Ok => Ok(true),
            RestartScript::NotOk => Ok(false),
            RestartScript::InvocationError => {
                Err(Error::restart_invocation("sudo: command not found"))
            }
        }
    }

    fn restarter_name(&self) -> &'static str {
        "scripted"
    }
}

/// Helper to create an EngineConfig for testing
///
/// Three-minute interval, like production; tests run with paused time.
pub fn test_config(post_restart_failure: FailurePolicy) -> EngineConfig {
    EngineConfig {
        update_interval_secs: 180,
        startup_failure: FailurePolicy::Continue,
        post_restart_failure,
        event_channel_capacity: 100,
    }
}
