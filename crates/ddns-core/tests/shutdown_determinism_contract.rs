//! Contract Test: Shutdown Determinism
//!
//! Constraints verified:
//! - Engine terminates cleanly on shutdown signal
//! - A failed retry after a successful restart stops the engine under the
//!   `exit` policy and does not under the `continue` policy
//! - A failed startup update stops the engine only under the `exit` policy
//! - Dropping the run future abandons an in-flight update promptly

mod common;

use common::*;
use ddns_core::config::FailurePolicy;
use ddns_core::engine::EngineEvent;
use ddns_core::{DdnsEngine, EngineState, Error};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn shutdown_signal_terminates_engine() {
    let log = CallLog::new();
    let (engine, mut event_rx) = DdnsEngine::new(
        Box::new(ScriptedUpdater::new([], &log)),
        Box::new(ScriptedRestarter::new([], &log)),
        test_config(FailurePolicy::Exit),
    )
    .expect("engine construction succeeds");
    let state_rx = engine.subscribe_state();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(shutdown_tx.send(()).is_ok(), "shutdown signal send succeeds");

    let result = tokio::time::timeout(Duration::from_secs(5), engine_handle).await;
    assert!(result.is_ok(), "Engine should terminate within 5 seconds");

    let engine_result = result.unwrap().unwrap();
    assert!(
        engine_result.is_ok(),
        "Engine should shut down successfully: {:?}",
        engine_result
    );
    assert_eq!(*state_rx.borrow(), EngineState::Shutdown);

    let mut stopped = false;
    while let Some(event) = event_rx.recv().await {
        if matches!(event, EngineEvent::Stopped { .. }) {
            stopped = true;
        }
    }
    assert!(stopped, "Stopped event emitted");
}

#[tokio::test(start_paused = true)]
async fn failed_retry_after_restart_is_fatal_under_exit_policy() {
    let log = CallLog::new();
    let updater = ScriptedUpdater::new(
        [UpdateScript::Good, UpdateScript::Timeout, UpdateScript::Timeout],
        &log,
    );
    let restarter = ScriptedRestarter::new([RestartScript::Ok], &log);

    let (engine, _event_rx) = DdnsEngine::new(
        Box::new(ScriptedUpdater::sharing_counters_with(&updater)),
        Box::new(ScriptedRestarter::sharing_counters_with(&restarter)),
        test_config(FailurePolicy::Exit),
    )
    .expect("engine construction succeeds");
    let state_rx = engine.subscribe_state();

    // No shutdown signal: the engine must stop on its own
    let result = tokio::time::timeout(Duration::from_secs(600), engine.run()).await;

    let engine_result = result.expect("engine stops after the failed retry");
    assert!(
        matches!(engine_result, Err(Error::PostRestartUpdate(_))),
        "unexpected result: {:?}",
        engine_result
    );
    assert_eq!(updater.update_call_count(), 3);
    assert_eq!(restarter.restart_call_count(), 1);
    assert_eq!(*state_rx.borrow(), EngineState::Shutdown);
}

#[tokio::test(start_paused = true)]
async fn failed_retry_after_restart_continues_under_continue_policy() {
    let log = CallLog::new();
    let updater = ScriptedUpdater::new(
        [UpdateScript::Good, UpdateScript::Timeout, UpdateScript::Timeout],
        &log,
    );
    let restarter = ScriptedRestarter::new([RestartScript::Ok], &log);

    let (engine, _event_rx) = DdnsEngine::new(
        Box::new(ScriptedUpdater::sharing_counters_with(&updater)),
        Box::new(ScriptedRestarter::sharing_counters_with(&restarter)),
        test_config(FailurePolicy::Continue),
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    // Past the second tick: the engine kept going
    tokio::time::sleep(Duration::from_secs(361)).await;
    assert_eq!(updater.update_call_count(), 4);
    assert_eq!(restarter.restart_call_count(), 1);

    shutdown_tx.send(()).unwrap();
    assert!(engine_handle.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn startup_failure_is_fatal_under_exit_policy() {
    let log = CallLog::new();
    let updater = ScriptedUpdater::new([UpdateScript::Timeout], &log);
    let restarter = ScriptedRestarter::new([], &log);

    let mut config = test_config(FailurePolicy::Exit);
    config.startup_failure = FailurePolicy::Exit;

    let (engine, _event_rx) = DdnsEngine::new(
        Box::new(ScriptedUpdater::sharing_counters_with(&updater)),
        Box::new(ScriptedRestarter::sharing_counters_with(&restarter)),
        config,
    )
    .expect("engine construction succeeds");

    let result = engine.run().await;

    assert!(matches!(result, Err(Error::UpdateTransport(_))), "{:?}", result);
    assert_eq!(updater.update_call_count(), 1);
    assert_eq!(
        restarter.restart_call_count(),
        0,
        "startup failure does not trigger recovery"
    );
}

#[tokio::test(start_paused = true)]
async fn startup_failure_is_ignored_under_continue_policy() {
    let log = CallLog::new();
    let updater = ScriptedUpdater::new([UpdateScript::Timeout], &log);
    let restarter = ScriptedRestarter::new([], &log);

    let (engine, _event_rx) = DdnsEngine::new(
        Box::new(ScriptedUpdater::sharing_counters_with(&updater)),
        Box::new(ScriptedRestarter::sharing_counters_with(&restarter)),
        test_config(FailurePolicy::Exit),
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_secs(181)).await;
    assert_eq!(updater.update_call_count(), 2, "startup attempt plus first tick");
    assert_eq!(restarter.restart_call_count(), 0);

    shutdown_tx.send(()).unwrap();
    assert!(engine_handle.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn dropping_run_abandons_hung_update() {
    let log = CallLog::new();
    let updater = ScriptedUpdater::new([UpdateScript::Good, UpdateScript::Hang], &log);

    let (engine, _event_rx) = DdnsEngine::new(
        Box::new(ScriptedUpdater::sharing_counters_with(&updater)),
        Box::new(ScriptedRestarter::new([], &log)),
        test_config(FailurePolicy::Exit),
    )
    .expect("engine construction succeeds");

    // Stand-in for the daemon's signal wait
    let signal = tokio::time::sleep(Duration::from_secs(200));

    let stopped_by_signal = tokio::select! {
        _ = engine.run() => false,
        _ = signal => true,
    };

    assert!(stopped_by_signal);
    assert_eq!(updater.update_call_count(), 2, "second update was in flight");
}
