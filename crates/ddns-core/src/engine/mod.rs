//! Core DDNS engine
//!
//! The DdnsEngine is responsible for:
//! - Sending an update immediately at startup
//! - Sending an update on every tick of a fixed interval
//! - Restarting the network when an update cannot reach the provider
//! - Retrying the update once after a successful restart
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!   interval ───▶ │  DdnsEngine  │ ───▶ EngineEvent (monitoring/logging)
//!                 └──────────────┘
//!                   │          │
//!                   ▼          ▼
//!          ┌────────────┐  ┌──────────────────┐
//!          │ DnsUpdater │  │ NetworkRestarter │
//!          └────────────┘  └──────────────────┘
//! ```
//!
//! ## States
//!
//! ```text
//!   Idle ──tick──▶ update ──ok──▶ Idle
//!                    │
//!                    └─transport error─▶ Recovering ──restart ok──▶ retry ──ok──▶ Idle
//!                                             │                       └─err─▶ Shutdown (policy)
//!                                             └─restart not ok / error──────▶ Idle
//! ```
//!
//! A provider rejection (non-2xx, DynDNS2 error code) is logged and the
//! engine stays Idle: restarting the local network cannot fix it.
//!
//! ## Cancellation
//!
//! A cycle runs to completion before the shutdown signal is observed.
//! Each step is bounded (HTTP timeout, restart command timeout), so the
//! delay is bounded too. Dropping the `run()` future abandons the cycle.

use crate::config::{EngineConfig, FailurePolicy};
use crate::error::{Error, Result};
use crate::traits::{DnsUpdater, NetworkRestarter, UpdateResponse};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// Waiting for the next tick
    Idle,
    /// Restarting the network and retrying the update
    Recovering,
    /// Terminal state
    Shutdown,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EngineState::Idle => "idle",
            EngineState::Recovering => "recovering",
            EngineState::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// Why an update was attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePhase {
    /// The immediate update at startup
    Startup,
    /// A regular tick
    Scheduled,
    /// The single retry after a network restart
    PostRestart,
}

impl std::fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UpdatePhase::Startup => "startup",
            UpdatePhase::Scheduled => "scheduled",
            UpdatePhase::PostRestart => "post-restart",
        };
        f.write_str(name)
    }
}

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        interval_secs: u64,
    },

    /// Engine state changed
    StateChanged {
        state: EngineState,
    },

    /// DNS update request about to be sent
    UpdateAttempted {
        phase: UpdatePhase,
    },

    /// DNS update accepted by the provider
    UpdateSucceeded {
        phase: UpdatePhase,
        status: u16,
        body: String,
    },

    /// DNS update failed
    UpdateFailed {
        phase: UpdatePhase,
        error: String,
    },

    /// Network restart about to be invoked
    RestartAttempted,

    /// Network restart ran to completion
    RestartCompleted {
        ok: bool,
    },

    /// Network restart could not be invoked
    RestartFailed {
        error: String,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Result of one tick's work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The update succeeded on the first attempt
    Updated,
    /// The provider answered with an error; the network was left alone
    Rejected { error: String },
    /// The network was restarted and the retried update succeeded
    Recovered,
    /// The restart command ran but did not succeed; no retry
    RestartNotOk,
    /// The restart command could not be invoked; no retry
    RestartFailed { error: String },
    /// The network was restarted but the retried update failed too
    RetryFailed { error: String },
}

/// Core DDNS engine
///
/// The engine owns the timer and the recovery sequence. Everything that
/// touches the outside world lives behind [`DnsUpdater`] and
/// [`NetworkRestarter`].
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Start with [`DdnsEngine::run()`]
/// 3. Engine runs until a fatal error, or until the future is dropped
///
/// ## Threading
///
/// The engine runs all operations on a single async task. Cycles never
/// overlap: the next tick is not awaited until the current cycle,
/// including any recovery, has finished.
pub struct DdnsEngine {
    /// Sends the update request
    updater: Box<dyn DnsUpdater>,

    /// Restarts the network after transport failures
    restarter: Box<dyn NetworkRestarter>,

    /// Time between scheduled updates
    interval: Duration,

    /// Handling of a failed startup update
    startup_failure: FailurePolicy,

    /// Handling of a failed retry after a network restart
    post_restart_failure: FailurePolicy,

    /// Current state, observable from other tasks
    state: watch::Sender<EngineState>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Parameters
    ///
    /// - `updater`: DNS updater implementation
    /// - `restarter`: Network restarter implementation
    /// - `config`: Engine configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        updater: Box<dyn DnsUpdater>,
        restarter: Box<dyn NetworkRestarter>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let (state, _) = watch::channel(EngineState::Idle);

        let engine = Self {
            updater,
            restarter,
            interval: Duration::from_secs(config.update_interval_secs),
            startup_failure: config.startup_failure,
            post_restart_failure: config.post_restart_failure,
            state,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Current engine state
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Run the engine
    ///
    /// Runs until a fatal error occurs. Shutdown on signals is the
    /// caller's job: drop this future (e.g. in a `tokio::select!`).
    ///
    /// # Returns
    ///
    /// - `Err(Error)`: Fatal error (startup failure or post-restart failure,
    ///   depending on the configured policies)
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine until `shutdown_rx` fires
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal error
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(EngineEvent::Started {
            interval_secs: self.interval.as_secs(),
        });
        info!(
            "Engine started (provider={}, restarter={}, interval={:?})",
            self.updater.provider_name(),
            self.restarter.restarter_name(),
            self.interval
        );

        // Update DNS immediately
        if let Err(e) = self.attempt_update(UpdatePhase::Startup).await {
            match self.startup_failure {
                FailurePolicy::Exit => {
                    error!("Startup update failed: {}", e);
                    self.stop("Startup update failed");
                    return Err(e);
                }
                FailurePolicy::Continue => {
                    warn!("Startup update failed, waiting for the next tick: {}", e);
                }
            }
        }
        self.set_state(EngineState::Idle);

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.run_cycle().await;
                    debug!("Cycle finished: {:?}", outcome);

                    if let CycleOutcome::RetryFailed { error } = outcome
                        && self.post_restart_failure == FailurePolicy::Exit
                    {
                        error!("Failed to update after network restart: {}", error);
                        self.stop("Update failed after network restart");
                        return Err(Error::post_restart_update(error));
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.stop("Shutdown signal");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Run one tick's work: update, and recover if the update could not
    /// reach the provider
    ///
    /// Exposed so embedders can drive the engine from their own scheduler.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let error = match self.attempt_update(UpdatePhase::Scheduled).await {
            Ok(_) => return CycleOutcome::Updated,
            Err(e) => e,
        };

        if !error.is_transport() {
            error!(
                "Provider {} rejected the update, leaving the network alone: {}",
                self.updater.provider_name(),
                error
            );
            return CycleOutcome::Rejected {
                error: error.to_string(),
            };
        }

        self.set_state(EngineState::Recovering);
        let outcome = self.recover().await;
        self.set_state(EngineState::Idle);
        outcome
    }

    /// Restart the network, then retry the update once if the restart worked
    async fn recover(&self) -> CycleOutcome {
        info!("Restarting network via {}", self.restarter.restarter_name());
        self.emit_event(EngineEvent::RestartAttempted);

        match self.restarter.restart_network().await {
            Ok(true) => {
                self.emit_event(EngineEvent::RestartCompleted { ok: true });
                info!("Network restarted, retrying update");

                match self.attempt_update(UpdatePhase::PostRestart).await {
                    Ok(_) => CycleOutcome::Recovered,
                    Err(e) => CycleOutcome::RetryFailed {
                        error: e.to_string(),
                    },
                }
            }
            Ok(false) => {
                self.emit_event(EngineEvent::RestartCompleted { ok: false });
                warn!("Network restart did not succeed, waiting for the next tick");
                CycleOutcome::RestartNotOk
            }
            Err(e) => {
                self.emit_event(EngineEvent::RestartFailed {
                    error: e.to_string(),
                });
                error!("Unable to restart network: {}", e);
                CycleOutcome::RestartFailed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Perform a single update attempt
    async fn attempt_update(&self, phase: UpdatePhase) -> Result<UpdateResponse> {
        self.emit_event(EngineEvent::UpdateAttempted { phase });

        match self.updater.update().await {
            Ok(response) => {
                info!("Updated DNS ({}): {}", phase, response.body);
                self.emit_event(EngineEvent::UpdateSucceeded {
                    phase,
                    status: response.status,
                    body: response.body.clone(),
                });
                Ok(response)
            }
            Err(e) => {
                warn!(
                    "Failed to update DNS via {} ({}): {}",
                    self.updater.provider_name(),
                    phase,
                    e
                );
                self.emit_event(EngineEvent::UpdateFailed {
                    phase,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn set_state(&self, state: EngineState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Engine state: {} -> {}", previous, state);
            self.emit_event(EngineEvent::StateChanged { state });
        }
    }

    fn stop(&self, reason: &str) {
        self.set_state(EngineState::Shutdown);
        self.emit_event(EngineEvent::Stopped {
            reason: reason.to_string(),
        });
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Send event, logging warning if channel is full (backpressure)
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // Nobody is listening
            }
        }
    }
}
