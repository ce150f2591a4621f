//! Session lifecycle tests against an in-memory browser.

mod common;

use common::{test_config, FailureMode, FakeLauncher};
use std::sync::Arc;
use wisp::browser::BrowserLauncher;
use wisp::config::Config;
use wisp::queue::AdmissionQueue;
use wisp::recorder::{
    CallKey, CallType, RecorderError, RecorderMachine, SessionRegistry, SessionStatus,
    StartOutcome, StartRequest,
};

fn build_machine(
    config: &Config,
    mode: FailureMode,
) -> (RecorderMachine, common::LaunchCounters, Arc<SessionRegistry>) {
    let launcher = FakeLauncher::new(mode);
    let counters = launcher.counters.clone();
    let registry = Arc::new(SessionRegistry::new(config.recording.capacity));
    let queue = Arc::new(AdmissionQueue::new(registry.slots(), config.queue.ttl()));
    let launcher: Arc<dyn BrowserLauncher> = Arc::new(launcher);
    let machine = RecorderMachine::new(launcher, Arc::clone(&registry), queue, config);
    (machine, counters, registry)
}

fn start_request(call_id: &str) -> StartRequest {
    StartRequest {
        group_id: "group-1".to_string(),
        call_id: call_id.to_string(),
        call_type: CallType::Audio,
        auth_token: "token".to_string(),
        api_url: "http://localhost:4000/api".to_string(),
    }
}

fn key(call_id: &str) -> CallKey {
    CallKey::new(CallType::Audio, call_id)
}

#[tokio::test]
async fn start_then_stop_runs_the_full_lifecycle() {
    let config = test_config(2);
    let (machine, counters, registry) = build_machine(&config, FailureMode::None);

    let outcome = machine.start_recording(start_request("call-1")).await.unwrap();
    let session_id = match outcome {
        StartOutcome::Started { session_id } => session_id,
        other => panic!("expected a fresh session, got {other:?}"),
    };

    let info = machine.status(&key("call-1")).expect("session is registered");
    assert_eq!(info.session_id, session_id);
    assert_eq!(info.status, SessionStatus::Recording);
    assert_eq!(counters.live(), 1);

    let summary = machine.stop_recording(key("call-1")).await.unwrap();
    assert_eq!(summary.session_id, session_id);
    assert_eq!(summary.recording_id.as_deref(), Some("rec-1"));
    assert!(summary.file_url.is_some());

    // Terminal: removed from the registry, browser gone.
    assert!(machine.status(&key("call-1")).is_none());
    assert_eq!(registry.active_count(), 0);
    assert_eq!(counters.live(), 0);
    assert_eq!(counters.closed(), 1);
}

#[tokio::test]
async fn stop_unknown_call_is_not_found_and_changes_nothing() {
    let config = test_config(2);
    let (machine, counters, registry) = build_machine(&config, FailureMode::None);

    machine.start_recording(start_request("call-1")).await.unwrap();

    let err = machine.stop_recording(key("other")).await.unwrap_err();
    assert!(matches!(err, RecorderError::SessionNotFound(_)));

    // The unrelated session is untouched.
    assert_eq!(registry.active_count(), 1);
    assert_eq!(counters.live(), 1);
}

#[tokio::test]
async fn failed_readiness_leaves_zero_trace() {
    let config = test_config(2);
    let (machine, counters, registry) = build_machine(&config, FailureMode::Readiness);

    let err = machine.start_recording(start_request("call-1")).await.unwrap_err();
    assert!(matches!(err, RecorderError::ReadinessTimeout));

    assert!(machine.status(&key("call-1")).is_none());
    assert_eq!(registry.active_count(), 0);
    assert_eq!(counters.live(), 0, "no browser process may survive");

    // The slot is free again: a fresh start succeeds.
    let (machine, _, _) = build_machine(&config, FailureMode::None);
    assert!(machine.start_recording(start_request("call-1")).await.is_ok());
}

#[tokio::test]
async fn failed_navigation_maps_to_navigation_timeout() {
    let config = test_config(1);
    let (machine, counters, _) = build_machine(&config, FailureMode::Navigation);

    let err = machine.start_recording(start_request("call-1")).await.unwrap_err();
    assert!(matches!(err, RecorderError::NavigationTimeout));
    assert_eq!(counters.live(), 0);

    // The failed start released its slot.
    let health = machine.health().await;
    assert_eq!(health.active_recordings, 0);
}

#[tokio::test]
async fn failed_launch_maps_to_browser_launch() {
    let config = test_config(1);
    let (machine, counters, _) = build_machine(&config, FailureMode::Launch);

    let err = machine.start_recording(start_request("call-1")).await.unwrap_err();
    assert!(matches!(err, RecorderError::BrowserLaunch(_)));
    assert_eq!(counters.launched(), 0);
}

#[tokio::test]
async fn duplicate_start_joins_the_existing_session() {
    let config = test_config(2);
    let (machine, counters, _) = build_machine(&config, FailureMode::None);

    let first = machine.start_recording(start_request("call-1")).await.unwrap();
    let second = machine.start_recording(start_request("call-1")).await.unwrap();

    match second {
        StartOutcome::AlreadyRecording { session_id } => {
            assert_eq!(session_id, first.session_id());
        }
        other => panic!("expected idempotent join, got {other:?}"),
    }
    assert_eq!(counters.launched(), 1);
}

#[tokio::test]
async fn concurrent_starts_for_one_call_produce_one_session() {
    let config = test_config(2);
    let (machine, counters, registry) = build_machine(&config, FailureMode::None);

    let (a, b) = tokio::join!(
        machine.start_recording(start_request("call-1")),
        machine.start_recording(start_request("call-1")),
    );

    let fresh = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Ok(StartOutcome::Started { .. })))
        .count();
    assert_eq!(fresh, 1, "exactly one start may win: {a:?} / {b:?}");

    // The loser either joined idempotently or saw the in-flight conflict.
    for result in [&a, &b] {
        match result {
            Ok(_) => {}
            Err(RecorderError::SessionConflict(..)) => {}
            Err(other) => panic!("unexpected loser outcome: {other}"),
        }
    }

    assert_eq!(registry.active_count(), 1);
    assert_eq!(counters.launched(), 1);
    assert_eq!(counters.live(), 1);
}

#[tokio::test]
async fn stop_races_reject_the_loser() {
    let config = test_config(1);
    let (machine, counters, _) = build_machine(&config, FailureMode::None);
    machine.start_recording(start_request("call-1")).await.unwrap();

    let (a, b) = tokio::join!(
        machine.stop_recording(key("call-1")),
        machine.stop_recording(key("call-1")),
    );

    let stopped = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(stopped, 1, "exactly one stop may win: {a:?} / {b:?}");
    assert_eq!(counters.live(), 0);
}

#[tokio::test]
async fn shutdown_stops_everything_and_refuses_new_starts() {
    let config = test_config(3);
    let (machine, counters, registry) = build_machine(&config, FailureMode::None);

    machine.start_recording(start_request("call-1")).await.unwrap();
    machine.start_recording(start_request("call-2")).await.unwrap();
    machine.start_recording(start_request("call-3")).await.unwrap();
    assert_eq!(registry.active_count(), 3);

    machine.shutdown().await;

    assert_eq!(registry.active_count(), 0, "registry must drain");
    assert_eq!(counters.live(), 0, "no browser process may survive");
    assert_eq!(counters.closed(), 3);

    assert!(machine.start_recording(start_request("call-4")).await.is_err());
}
