#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! Integration tests for the authorization bridge.
//!
//! Tests the full flow: classify → live OS check → prompt → out-of-band
//! result → reconcile, against the simulated OS.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use mediagate_bridge::permission::{
    AuthorizationCoordinator, AuthorizationError, AuthorizationOutcome, CoordinatorConfig,
    DenialReason, PermissionResultSender, RequestCode, result_channel,
};
use mediagate_bridge::platform::{OsPermissionSubsystem, ScriptedAnswer, SimulatedOs};
use mediagate_core::{MediaResource, OsPermission};

struct Harness {
    os: Arc<SimulatedOs>,
    coordinator: Arc<AuthorizationCoordinator>,
    results: PermissionResultSender,
}

fn harness(prompt_timeout: Duration) -> Harness {
    let (tx, rx) = result_channel();
    let os = Arc::new(SimulatedOs::new(tx.clone()));
    let coordinator = Arc::new(AuthorizationCoordinator::start(
        Arc::clone(&os) as Arc<dyn OsPermissionSubsystem>,
        rx,
        CoordinatorConfig {
            prompt_timeout,
            request_code_base: 1001,
        },
    ));
    Harness {
        os,
        coordinator,
        results: tx,
    }
}

fn both() -> BTreeSet<MediaResource> {
    BTreeSet::from(MediaResource::ALL)
}

fn spawn_authorize(
    coordinator: &Arc<AuthorizationCoordinator>,
    resources: BTreeSet<MediaResource>,
) -> tokio::task::JoinHandle<Result<AuthorizationOutcome, AuthorizationError>> {
    let coordinator = Arc::clone(coordinator);
    tokio::spawn(async move { coordinator.authorize(resources).await })
}

#[tokio::test]
async fn all_granted_resolves_without_prompt() {
    let h = harness(Duration::from_secs(5));
    h.os.set_granted(OsPermission::Camera, true);
    h.os.set_granted(OsPermission::Microphone, true);

    let outcome = h.coordinator.authorize(both()).await.unwrap();

    assert_eq!(
        outcome,
        AuthorizationOutcome::Granted {
            resources: both(),
            prompted: false
        }
    );
    assert!(h.os.prompts().is_empty());
    assert!(!h.coordinator.registry().is_busy().await);
}

#[tokio::test]
async fn prompt_names_exactly_the_missing_permissions() {
    let h = harness(Duration::from_secs(5));
    h.os.set_granted(OsPermission::Camera, true);

    let task = spawn_authorize(&h.coordinator, both());
    let prompt = h.os.next_prompt().await.unwrap();
    assert_eq!(prompt.permissions, vec![OsPermission::Microphone]);

    h.os.respond(prompt.code, OsPermission::Microphone, true);
    let outcome = task.await.unwrap().unwrap();

    assert_eq!(outcome.granted_resources(), both());
    assert_eq!(h.os.prompts().len(), 1);
}

#[tokio::test]
async fn camera_granted_microphone_denied_yields_video_only() {
    let h = harness(Duration::from_secs(5));

    let task = spawn_authorize(&h.coordinator, both());
    let prompt = h.os.next_prompt().await.unwrap();
    assert_eq!(
        prompt.permissions,
        vec![OsPermission::Camera, OsPermission::Microphone]
    );

    h.os.respond(prompt.code, OsPermission::Camera, true);
    h.os.respond(prompt.code, OsPermission::Microphone, false);

    let outcome = task.await.unwrap().unwrap();
    assert_eq!(
        outcome,
        AuthorizationOutcome::Granted {
            resources: BTreeSet::from([MediaResource::VideoCapture]),
            prompted: true
        }
    );
    assert!(!h.coordinator.registry().is_busy().await);
    assert_eq!(
        h.coordinator.state().last_known(OsPermission::Microphone),
        Some(false)
    );
}

#[tokio::test]
async fn everything_refused_is_a_denial() {
    let h = harness(Duration::from_secs(5));
    h.os.answer_all(ScriptedAnswer::Deny);

    let outcome = h.coordinator.authorize(both()).await.unwrap();

    assert_eq!(
        outcome,
        AuthorizationOutcome::Denied {
            reason: DenialReason::Refused
        }
    );
    assert!(outcome.granted_resources().is_empty());
}

#[tokio::test]
async fn concurrent_request_rejected_and_first_unaffected() {
    let h = harness(Duration::from_secs(5));

    let first = spawn_authorize(&h.coordinator, BTreeSet::from([MediaResource::AudioCapture]));
    let prompt = h.os.next_prompt().await.unwrap();

    let second = h
        .coordinator
        .authorize(BTreeSet::from([MediaResource::VideoCapture]))
        .await;
    assert!(matches!(
        second,
        Err(AuthorizationError::ConcurrentRequestRejected { .. })
    ));
    assert_eq!(h.os.prompts().len(), 1);

    h.os.respond(prompt.code, OsPermission::Microphone, true);
    let outcome = first.await.unwrap().unwrap();
    assert_eq!(
        outcome.granted_resources(),
        BTreeSet::from([MediaResource::AudioCapture])
    );
}

#[tokio::test]
async fn same_resource_requested_twice_is_not_merged() {
    let h = harness(Duration::from_secs(5));

    let first = spawn_authorize(&h.coordinator, BTreeSet::from([MediaResource::VideoCapture]));
    let prompt = h.os.next_prompt().await.unwrap();

    let second = h
        .coordinator
        .authorize(BTreeSet::from([MediaResource::VideoCapture]))
        .await;
    assert!(matches!(
        second,
        Err(AuthorizationError::ConcurrentRequestRejected { .. })
    ));

    h.os.respond(prompt.code, OsPermission::Camera, false);
    assert_eq!(
        first.await.unwrap().unwrap(),
        AuthorizationOutcome::Denied {
            reason: DenialReason::Refused
        }
    );
}

#[tokio::test]
async fn granted_request_rejected_while_another_prompt_is_pending() {
    let h = harness(Duration::from_secs(5));
    h.os.set_granted(OsPermission::Camera, true);

    let first = spawn_authorize(&h.coordinator, both());
    let prompt = h.os.next_prompt().await.unwrap();
    assert_eq!(prompt.permissions, vec![OsPermission::Microphone]);

    // Camera needs no prompt, but the video resource is already in flight.
    let second = h
        .coordinator
        .authorize(BTreeSet::from([MediaResource::VideoCapture]))
        .await;
    assert!(matches!(
        second,
        Err(AuthorizationError::ConcurrentRequestRejected { .. })
    ));

    h.os.respond(prompt.code, OsPermission::Microphone, true);
    assert_eq!(first.await.unwrap().unwrap().granted_resources(), both());
}

#[tokio::test]
async fn abandoned_authorization_frees_the_slot() {
    let h = harness(Duration::from_secs(5));
    let video = BTreeSet::from([MediaResource::VideoCapture]);

    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), h.coordinator.authorize(video.clone()))
            .await;
    assert!(abandoned.is_err());
    let stale = h.os.next_prompt().await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!h.coordinator.registry().is_busy().await);

    // The answer to the abandoned prompt arrives after cleanup and is dropped.
    h.results.deliver(stale.code, OsPermission::Camera, true);
    h.os.answer_all(ScriptedAnswer::Deny);
    assert_eq!(
        h.coordinator.authorize(video).await.unwrap(),
        AuthorizationOutcome::Denied {
            reason: DenialReason::Refused
        }
    );
    assert_eq!(h.os.prompts().len(), 2);
}

#[tokio::test]
async fn timeout_denies_and_frees_the_slot() {
    let h = harness(Duration::from_millis(100));

    let outcome = h
        .coordinator
        .authorize(BTreeSet::from([MediaResource::VideoCapture]))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        AuthorizationOutcome::Denied {
            reason: DenialReason::TimedOut
        }
    );
    assert!(!h.coordinator.registry().is_busy().await);

    h.os.answer_all(ScriptedAnswer::Grant);
    let retry = h
        .coordinator
        .authorize(BTreeSet::from([MediaResource::VideoCapture]))
        .await
        .unwrap();
    assert!(matches!(retry, AuthorizationOutcome::Granted { .. }));
}

#[tokio::test]
async fn partial_answer_still_times_out() {
    let h = harness(Duration::from_millis(100));
    h.os.answer(OsPermission::Camera, ScriptedAnswer::Grant);

    let outcome = h.coordinator.authorize(both()).await.unwrap();

    assert_eq!(
        outcome,
        AuthorizationOutcome::Denied {
            reason: DenialReason::TimedOut
        }
    );
    assert!(!h.coordinator.registry().is_busy().await);
}

#[tokio::test]
async fn late_result_for_expired_prompt_is_ignored() {
    let h = harness(Duration::from_millis(100));

    let expired = h
        .coordinator
        .authorize(BTreeSet::from([MediaResource::AudioCapture]))
        .await
        .unwrap();
    assert!(matches!(expired, AuthorizationOutcome::Denied { .. }));
    let stale = h.os.next_prompt().await.unwrap();

    let live = spawn_authorize(&h.coordinator, BTreeSet::from([MediaResource::AudioCapture]));
    let prompt = h.os.next_prompt().await.unwrap();
    assert_ne!(prompt.code, stale.code);

    // A late "yes" for the old prompt must not resolve the new one.
    h.results.deliver(stale.code, OsPermission::Microphone, true);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let pending = h.coordinator.registry().snapshot().await.unwrap();
    assert_eq!(pending.code, prompt.code);
    assert!(pending.granted.is_empty());

    h.os.respond(prompt.code, OsPermission::Microphone, false);
    assert_eq!(
        live.await.unwrap().unwrap(),
        AuthorizationOutcome::Denied {
            reason: DenialReason::Refused
        }
    );
}

#[tokio::test]
async fn cancelled_prompt_denies_and_frees_the_slot() {
    let h = harness(Duration::from_secs(5));

    let task = spawn_authorize(&h.coordinator, both());
    let prompt = h.os.next_prompt().await.unwrap();
    h.os.cancel(prompt.code);

    assert_eq!(
        task.await.unwrap().unwrap(),
        AuthorizationOutcome::Denied {
            reason: DenialReason::Cancelled
        }
    );
    assert!(!h.coordinator.registry().is_busy().await);
}

#[tokio::test]
async fn platform_result_arrays_resolve_the_prompt() {
    let h = harness(Duration::from_secs(5));

    let task = spawn_authorize(&h.coordinator, both());
    let prompt = h.os.next_prompt().await.unwrap();
    assert_eq!(prompt.code, RequestCode(1001));

    h.results.deliver_platform_results(
        prompt.code,
        &["android.permission.CAMERA", "android.permission.RECORD_AUDIO"],
        &[-1, 0],
    );

    assert_eq!(
        task.await.unwrap().unwrap().granted_resources(),
        BTreeSet::from([MediaResource::AudioCapture])
    );
}

#[tokio::test]
async fn results_from_another_thread_after_delay() {
    let h = harness(Duration::from_secs(5));
    h.os.answer_all(ScriptedAnswer::Grant);
    h.os.set_answer_delay(Duration::from_millis(30));

    let outcome = h.coordinator.authorize(both()).await.unwrap();

    assert_eq!(
        outcome,
        AuthorizationOutcome::Granted {
            resources: both(),
            prompted: true
        }
    );

    // The OS remembers the grant, so the next request needs no prompt.
    let again = h.coordinator.authorize(both()).await.unwrap();
    assert_eq!(
        again,
        AuthorizationOutcome::Granted {
            resources: both(),
            prompted: false
        }
    );
    assert_eq!(h.os.prompts().len(), 1);
}

#[tokio::test]
async fn revoked_permission_is_prompted_again() {
    let h = harness(Duration::from_secs(5));
    h.os.set_granted(OsPermission::Camera, true);
    let video = BTreeSet::from([MediaResource::VideoCapture]);

    assert!(matches!(
        h.coordinator.authorize(video.clone()).await.unwrap(),
        AuthorizationOutcome::Granted { prompted: false, .. }
    ));

    h.os.set_granted(OsPermission::Camera, false);
    h.os.answer_all(ScriptedAnswer::Deny);
    assert_eq!(
        h.coordinator.authorize(video).await.unwrap(),
        AuthorizationOutcome::Denied {
            reason: DenialReason::Refused
        }
    );
    assert_eq!(h.os.prompts().len(), 1);
}

#[tokio::test]
async fn query_failure_counts_as_missing() {
    let h = harness(Duration::from_secs(5));
    h.os.set_granted(OsPermission::Camera, true);
    h.os.fail_queries(true);
    h.os.answer_all(ScriptedAnswer::Grant);

    let outcome = h
        .coordinator
        .authorize(BTreeSet::from([MediaResource::VideoCapture]))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        AuthorizationOutcome::Granted { prompted: true, .. }
    ));
    assert_eq!(h.os.prompts()[0].permissions, vec![OsPermission::Camera]);
}
