//! End-to-end Szenarien gegen das Loopback-Backend

use call_lifecycle::config::AppConfig;
use call_lifecycle::sdk::loopback::{LoopbackConfig, LoopbackSdk, RemotePolicy};
use call_lifecycle::sdk::{CallEvent, CallHandle, MediaKind};
use call_lifecycle::session::{AuthStatus, SessionError, SessionManager};
use call_lifecycle::view::{render, Panel, ViewState, LOCAL_VIDEO_WIDTH, REMOTE_VIDEO_WIDTH};
use call_lifecycle::{CallLifecycleState, MediaToggles};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn setup() -> (Arc<LoopbackSdk>, SessionManager<LoopbackSdk>) {
    let config = AppConfig::loopback();
    let sdk = Arc::new(LoopbackSdk::new(LoopbackConfig {
        app_id: config.app_id.clone(),
        access_token: config.access_token.clone(),
        online: true,
    }));
    let manager = SessionManager::new(Arc::clone(&sdk), config);
    (sdk, manager)
}

/// Verarbeitet alle anstehenden Benachrichtigungen, gibt deren Anzahl zurück
async fn drain(manager: &mut SessionManager<LoopbackSdk>) -> usize {
    let mut handled = 0;
    loop {
        let next = timeout(Duration::from_millis(20), manager.next_notification()).await;
        match next {
            Ok(Some(notification)) => {
                manager.handle_notification(notification);
                handled += 1;
            }
            _ => return handled,
        }
    }
}

async fn connected_video_call(
    sdk: &LoopbackSdk,
    manager: &mut SessionManager<LoopbackSdk>,
) {
    manager.login("alice").await.unwrap();
    sdk.simulate_incoming("bob", MediaKind::Video).unwrap();
    drain(manager).await;
    manager.accept().unwrap();
    drain(manager).await;
    assert_eq!(manager.call_state(), CallLifecycleState::Connected);
}

#[tokio::test]
async fn inbound_video_call_is_accepted_and_connected() {
    let (sdk, mut manager) = setup();
    manager.login("alice").await.unwrap();
    assert!(manager.session().is_ready());

    let incoming = sdk.simulate_incoming("bob", MediaKind::Video).unwrap();
    drain(&mut manager).await;

    assert_eq!(manager.call_state(), CallLifecycleState::RingingInbound);
    let call = manager.call().unwrap();
    assert!(call.handle().is_video_call());
    assert_eq!(call.id(), incoming.id());

    assert_eq!(
        manager.accept().unwrap(),
        CallLifecycleState::ConnectingOutbound
    );
    drain(&mut manager).await;
    assert_eq!(manager.call_state(), CallLifecycleState::Connected);

    let screen = render(&ViewState::from_manager(&manager));
    assert!(matches!(screen.panel, Panel::Connected { .. }));
    assert_eq!(screen.media.remote_width_percent, REMOTE_VIDEO_WIDTH);
    assert_eq!(screen.media.local_width_percent, LOCAL_VIDEO_WIDTH);
}

#[tokio::test]
async fn rejected_outbound_call_returns_to_idle() {
    let (sdk, mut manager) = setup();
    sdk.set_user_policy("bob", RemotePolicy::Reject);
    manager.login("alice").await.unwrap();

    manager.dial("bob", MediaKind::Audio).unwrap();
    assert_eq!(manager.call_state(), CallLifecycleState::ConnectingOutbound);
    assert!(matches!(
        render(&ViewState::from_manager(&manager)).panel,
        Panel::Calling { .. }
    ));

    drain(&mut manager).await;
    assert_eq!(manager.call_state(), CallLifecycleState::Idle);
    assert!(manager.call().is_none());
    assert_eq!(render(&ViewState::from_manager(&manager)).panel, Panel::Dialer);
}

#[tokio::test]
async fn answered_outbound_call_connects() {
    let (sdk, mut manager) = setup();
    sdk.set_user_policy("bob", RemotePolicy::Answer);
    manager.login("alice").await.unwrap();

    manager.dial("bob", MediaKind::Video).unwrap();
    drain(&mut manager).await;

    assert_eq!(manager.call_state(), CallLifecycleState::Connected);
    assert_eq!(manager.toggle_video(), Ok(true));
    let call = sdk.latest_call().unwrap();
    assert!(!call.is_local_video_enabled());
}

#[tokio::test]
async fn reconnect_keeps_toggles_and_hides_controls() {
    let (sdk, mut manager) = setup();
    connected_video_call(&sdk, &mut manager).await;

    manager.toggle_microphone().unwrap();
    let before = manager.toggles();
    let call_id = manager.call().unwrap().id().clone();

    sdk.emit(&call_id, CallEvent::Reconnecting);
    drain(&mut manager).await;
    assert_eq!(manager.call_state(), CallLifecycleState::Reconnecting);
    let screen = render(&ViewState::from_manager(&manager));
    assert!(screen.panel.actions().is_empty());

    sdk.emit(&call_id, CallEvent::Reconnected);
    drain(&mut manager).await;
    assert_eq!(manager.call_state(), CallLifecycleState::Connected);
    assert_eq!(manager.toggles(), before);
    assert_eq!(
        before,
        MediaToggles {
            microphone_muted: true,
            video_disabled: false
        }
    );
    assert!(!render(&ViewState::from_manager(&manager))
        .panel
        .actions()
        .is_empty());
}

#[tokio::test]
async fn remote_hangup_while_reconnecting_ends_call() {
    let (sdk, mut manager) = setup();
    connected_video_call(&sdk, &mut manager).await;
    let call_id = manager.call().unwrap().id().clone();

    sdk.emit(&call_id, CallEvent::Reconnecting);
    sdk.emit(&call_id, CallEvent::Ended);
    drain(&mut manager).await;

    assert_eq!(manager.call_state(), CallLifecycleState::Idle);
    assert!(manager.call().is_none());
}

#[tokio::test]
async fn remote_settings_changes_do_not_disturb_call() {
    let (sdk, mut manager) = setup();
    connected_video_call(&sdk, &mut manager).await;
    let call_id = manager.call().unwrap().id().clone();

    sdk.emit(&call_id, CallEvent::RemoteAudioSettingsChanged);
    sdk.emit(&call_id, CallEvent::RemoteVideoSettingsChanged);
    drain(&mut manager).await;

    assert_eq!(manager.call_state(), CallLifecycleState::Connected);
}

#[tokio::test]
async fn local_hangup_ends_call_from_every_state() {
    let (sdk, mut manager) = setup();
    sdk.set_user_policy("dave", RemotePolicy::NoAnswer);
    manager.login("alice").await.unwrap();

    // Connecting
    manager.dial("dave", MediaKind::Audio).unwrap();
    assert_eq!(manager.end_call(), CallLifecycleState::Idle);
    drain(&mut manager).await;
    assert!(manager.call().is_none());

    // Ringing
    sdk.simulate_incoming("bob", MediaKind::Audio).unwrap();
    drain(&mut manager).await;
    assert_eq!(manager.end_call(), CallLifecycleState::Idle);

    // Connected
    connected_video_call(&sdk, &mut manager).await;
    let handle = sdk.latest_call().unwrap();
    assert_eq!(manager.end_call(), CallLifecycleState::Idle);
    assert!(handle.is_ended());
    drain(&mut manager).await;
    assert_eq!(manager.call_state(), CallLifecycleState::Idle);

    // Reconnecting
    connected_video_call(&sdk, &mut manager).await;
    let handle = sdk.latest_call().unwrap();
    sdk.emit(handle.id(), CallEvent::Reconnecting);
    drain(&mut manager).await;
    assert_eq!(manager.call_state(), CallLifecycleState::Reconnecting);
    assert_eq!(manager.end_call(), CallLifecycleState::Idle);
    assert!(handle.is_ended());
    assert!(manager.call().is_none());
    drain(&mut manager).await;
    assert_eq!(manager.call_state(), CallLifecycleState::Idle);

    // Idle: No-op
    assert_eq!(manager.end_call(), CallLifecycleState::Idle);
}

#[tokio::test]
async fn authentication_failure_shows_login_again() {
    let (sdk, _) = setup();
    let mut manager = SessionManager::new(
        Arc::clone(&sdk),
        AppConfig::new(AppConfig::loopback().app_id, "stale-token"),
    );

    let result = manager.login("alice").await;
    assert!(matches!(result, Err(SessionError::Authentication(_))));
    assert_eq!(manager.session().auth, AuthStatus::Failed);
    assert!(!manager.session().is_ready());

    let screen = render(&ViewState::from_manager(&manager));
    assert_eq!(
        screen.panel,
        Panel::Login {
            headline: "Unable to authenticate as alice".to_string()
        }
    );
}

#[tokio::test]
async fn relogin_delivers_each_ring_once() {
    let (sdk, mut manager) = setup();
    manager.login("alice").await.unwrap();
    manager.login("alice").await.unwrap();
    assert_eq!(sdk.listener_count(), 1);

    sdk.simulate_incoming("bob", MediaKind::Audio).unwrap();
    assert_eq!(drain(&mut manager).await, 1);
    assert_eq!(manager.call_state(), CallLifecycleState::RingingInbound);
}

#[tokio::test]
async fn busy_session_declines_second_ring() {
    let (sdk, mut manager) = setup();
    connected_video_call(&sdk, &mut manager).await;
    let current = manager.call().unwrap().id().clone();

    let second = sdk.simulate_incoming("carol", MediaKind::Audio).unwrap();
    drain(&mut manager).await;

    assert!(second.is_ended());
    assert_eq!(manager.call().unwrap().id(), &current);
    assert_eq!(manager.call_state(), CallLifecycleState::Connected);
}

#[tokio::test]
async fn synchronous_dial_error_keeps_idle() {
    let (_, mut manager) = setup();
    manager.login("alice").await.unwrap();

    let result = manager.dial("alice", MediaKind::Audio);
    assert!(matches!(result, Err(SessionError::Dial(_))));
    assert_eq!(manager.call_state(), CallLifecycleState::Idle);
}
