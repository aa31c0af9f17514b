//! Dialog interceptor tests.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_timeouts, loaded, MockBrowser};
use orbit_verify_core::app::AppContract;
use orbit_verify_core::dialog::{ArmScope, DialogInterceptor};
use orbit_verify_core::driver::{BrowserDriver, DialogKind, DialogResolution};
use orbit_verify_core::error::HarnessError;
use orbit_verify_core::nav::NavigationState;

fn interceptor(mock: &Arc<MockBrowser>) -> DialogInterceptor {
    let timeouts = fast_timeouts();
    DialogInterceptor::start(mock.clone(), timeouts.dialog(), timeouts.poll())
}

async fn until_resolved(interceptor: &DialogInterceptor, count: usize) {
    for _ in 0..100 {
        if interceptor.resolved_count().await >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("interceptor never resolved {} dialog(s)", count);
}

#[tokio::test]
async fn test_one_shot_resolves_only_the_first_dialog() {
    let mock = loaded(MockBrowser::new()).await;
    let dialogs = interceptor(&mock);

    dialogs.arm(DialogResolution::Accept, ArmScope::OneShot).await;
    mock.raise_dialog(DialogKind::Confirm, "first");
    until_resolved(&dialogs, 1).await;
    assert!(!dialogs.is_armed().await);

    let result = dialogs
        .guard(async {
            mock.raise_dialog(DialogKind::Confirm, "second");
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, HarnessError>(())
        })
        .await;

    match result {
        Err(HarnessError::DialogTimeout { message, waited_ms }) => {
            assert_eq!(message, "second");
            assert!(waited_ms >= 250);
        }
        other => panic!("expected DialogTimeout, got {:?}", other),
    }
    assert_eq!(mock.answers(), vec![DialogResolution::Accept]);
    assert_eq!(dialogs.resolved_count().await, 1);
}

#[tokio::test]
async fn test_persistent_resolves_every_dialog() {
    let mock = loaded(MockBrowser::new()).await;
    let dialogs = interceptor(&mock);

    dialogs.arm(DialogResolution::Dismiss, ArmScope::Persistent).await;
    for (i, message) in ["one", "two", "three"].into_iter().enumerate() {
        mock.raise_dialog(DialogKind::Alert, message);
        until_resolved(&dialogs, i + 1).await;
    }

    assert!(dialogs.is_armed().await);
    assert_eq!(mock.answers(), vec![DialogResolution::Dismiss; 3]);
    let messages: Vec<_> = dialogs
        .resolved()
        .await
        .into_iter()
        .map(|r| r.event.message)
        .collect();
    assert_eq!(messages, ["one", "two", "three"]);
}

#[tokio::test]
async fn test_armed_accept_unblocks_the_triggering_click() {
    let mock = loaded(MockBrowser::new()).await;
    mock.faults(|f| f.confirm_on_tab = Some(NavigationState::Intel));
    let dialogs = interceptor(&mock);
    let tab = AppContract::default().tab(NavigationState::Intel);

    dialogs.arm(DialogResolution::Accept, ArmScope::OneShot).await;
    dialogs
        .guard(async { mock.click(&tab).await.map_err(HarnessError::from) })
        .await
        .unwrap();

    assert_eq!(mock.view(), NavigationState::Intel);
    assert!(dialogs.wait_consumed(Duration::from_millis(10)).await);
    assert_eq!(mock.answers(), vec![DialogResolution::Accept]);
}

#[tokio::test]
async fn test_unarmed_dialog_times_out_instead_of_hanging() {
    let mock = loaded(MockBrowser::new()).await;
    mock.faults(|f| f.confirm_on_tab = Some(NavigationState::Intel));
    let dialogs = interceptor(&mock);
    let tab = AppContract::default().tab(NavigationState::Intel);

    let err = dialogs
        .guard(async { mock.click(&tab).await.map_err(HarnessError::from) })
        .await
        .unwrap_err();

    assert_eq!(err.code(), "DialogTimeout");
    assert!(err.is_hard());
    assert!(mock.has_open_dialog());

    assert!(dialogs.dismiss_pending(&*mock).await);
    assert!(!mock.has_open_dialog());
    assert_eq!(mock.answers(), vec![DialogResolution::Dismiss]);
    assert_eq!(mock.view(), NavigationState::Horizon);

    assert!(!dialogs.dismiss_pending(&*mock).await);
}

#[tokio::test]
async fn test_wait_consumed_without_dialog_is_not_an_error() {
    let mock = loaded(MockBrowser::new()).await;
    let dialogs = interceptor(&mock);

    dialogs.arm(DialogResolution::Accept, ArmScope::OneShot).await;
    assert!(!dialogs.wait_consumed(Duration::from_millis(40)).await);
    assert!(dialogs.is_armed().await);

    dialogs.disarm().await;
    assert!(!dialogs.is_armed().await);
    assert_eq!(dialogs.resolved_count().await, 0);
}

#[tokio::test]
async fn test_one_shot_overrides_persistent_for_a_single_dialog() {
    let mock = loaded(MockBrowser::new()).await;
    let dialogs = interceptor(&mock);

    dialogs.arm(DialogResolution::Accept, ArmScope::Persistent).await;
    dialogs.arm(DialogResolution::Dismiss, ArmScope::OneShot).await;
    mock.raise_dialog(DialogKind::Confirm, "Leave page?");
    until_resolved(&dialogs, 1).await;

    // The persistent arming answers again once the one-shot is spent.
    assert!(dialogs.is_armed().await);
    assert!(dialogs.wait_consumed(Duration::from_millis(10)).await);
    mock.raise_dialog(DialogKind::Alert, "Saved");
    until_resolved(&dialogs, 2).await;

    assert_eq!(mock.answers(), vec![DialogResolution::Dismiss, DialogResolution::Accept]);
}

#[tokio::test]
async fn test_withdrawn_one_shot_keeps_persistent_arming() {
    let mock = loaded(MockBrowser::new()).await;
    let dialogs = interceptor(&mock);

    dialogs.arm(DialogResolution::Dismiss, ArmScope::Persistent).await;
    dialogs.arm(DialogResolution::Accept, ArmScope::OneShot).await;
    assert!(!dialogs.wait_consumed(Duration::from_millis(30)).await);
    dialogs.disarm_one_shot().await;

    assert_eq!(dialogs.persistent().await, Some(DialogResolution::Dismiss));
    mock.raise_dialog(DialogKind::Confirm, "Discard?");
    until_resolved(&dialogs, 1).await;
    assert_eq!(mock.answers(), vec![DialogResolution::Dismiss]);

    dialogs.disarm().await;
    assert!(!dialogs.is_armed().await);
    assert_eq!(dialogs.persistent().await, None);
}

#[tokio::test]
async fn test_shutdown_stops_listening() {
    let mock = loaded(MockBrowser::new()).await;
    let dialogs = interceptor(&mock);
    dialogs.arm(DialogResolution::Accept, ArmScope::Persistent).await;

    dialogs.shutdown();
    tokio::time::sleep(Duration::from_millis(20)).await;
    mock.raise_dialog(DialogKind::Alert, "ignored");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(mock.answers().is_empty());
    assert!(mock.has_open_dialog());
}
