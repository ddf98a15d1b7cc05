use std::time::Duration;

use shared::protocol::{AuthChangeEvent, AuthChange};
use tokio::sync::Notify;

use super::*;
use crate::testing::{user, FakeAuthGateway};

async fn wait_for_session(
    rx: &mut watch::Receiver<SessionState>,
    authenticated: bool,
) -> Option<AuthenticatedUser> {
    tokio::time::timeout(
        Duration::from_secs(1),
        rx.wait_for(|state| state.is_authenticated() == authenticated),
    )
    .await
    .expect("session change within timeout")
    .expect("sender alive")
    .user()
    .cloned()
}

#[tokio::test]
async fn initialize_adopts_gateway_session_once() {
    let alice = user("alice@example.com");
    let gateway = Arc::new(FakeAuthGateway::new().with_current(Some(alice.clone())));
    let controller = SessionController::new(gateway.clone());

    let restored = controller.initialize().await.expect("initialize");
    assert_eq!(restored, Some(alice.clone()));
    assert_eq!(controller.current(), Some(alice));

    let err = controller.initialize().await.expect_err("second initialize");
    assert!(matches!(err, SessionError::AlreadyInitialized));
    assert_eq!(*gateway.current_user_calls.lock().await, 1);
}

#[tokio::test]
async fn initialize_failure_leaves_session_absent() {
    let gateway = FakeAuthGateway::new();
    *gateway.current.lock().await = Err(GatewayError::transport("connection refused"));
    let controller = SessionController::new(Arc::new(gateway));

    let err = controller.initialize().await.expect_err("fetch fails");
    assert_eq!(err.to_string(), "connection refused");
    assert!(!controller.is_authenticated());
}

#[tokio::test]
async fn subscription_replaces_session_wholesale() {
    let gateway = Arc::new(FakeAuthGateway::new());
    let controller = SessionController::new(gateway.clone());
    controller.subscribe().await;
    let mut rx = controller.watch();

    let alice = user("alice@example.com");
    gateway.push(AuthChange::signed_in(alice.clone()));
    assert_eq!(wait_for_session(&mut rx, true).await, Some(alice));

    let renamed = AuthenticatedUser {
        email: None,
        ..user("ignored@example.com")
    };
    gateway.push(AuthChange {
        event: AuthChangeEvent::UserUpdated,
        user: Some(renamed.clone()),
    });
    tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|state| state.user() == Some(&renamed)))
        .await
        .expect("update within timeout")
        .expect("sender alive");
    assert_eq!(controller.current(), Some(renamed));

    gateway.push(AuthChange::signed_out());
    assert_eq!(wait_for_session(&mut rx, false).await, None);
}

#[tokio::test]
async fn teardown_stops_applying_events() {
    let gateway = Arc::new(FakeAuthGateway::new());
    let controller = SessionController::new(gateway.clone());
    controller.subscribe().await;
    assert!(controller.is_subscribed().await);

    controller.teardown().await;
    assert!(!controller.is_subscribed().await);

    gateway.push(AuthChange::signed_in(user("late@example.com")));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!controller.is_authenticated());
}

#[tokio::test]
async fn login_relies_on_subscription_and_refresh() {
    let alice = user("alice@example.com");
    let mut fake = FakeAuthGateway::new().with_sign_in(Ok(alice.clone()));
    fake.emit_on_sign_in = false;
    let gateway = Arc::new(fake);
    let controller = SessionController::new(gateway.clone());

    let accepted = controller.login("alice@example.com", "pw").await.expect("login");
    assert_eq!(accepted, alice);
    assert!(
        !controller.is_authenticated(),
        "login itself must not write the session"
    );

    controller.refresh().await.expect("refresh");
    assert_eq!(controller.current(), Some(alice));
}

#[tokio::test]
async fn failed_login_keeps_session_untouched() {
    let gateway = Arc::new(
        FakeAuthGateway::new().with_sign_in(Err(GatewayError::auth("Invalid login credentials"))),
    );
    let controller = SessionController::new(gateway);
    controller.subscribe().await;

    let err = controller.login("a@b.c", "bad").await.expect_err("rejected");
    assert_eq!(err.message(), "Invalid login credentials");
    assert!(!controller.is_authenticated());
}

#[tokio::test]
async fn logout_clears_before_gateway_acknowledges() {
    let gate = Arc::new(Notify::new());
    let alice = user("alice@example.com");
    let gateway = Arc::new(
        FakeAuthGateway::new()
            .with_current(Some(alice))
            .with_sign_out_gate(gate.clone()),
    );
    let controller = Arc::new(SessionController::new(gateway.clone()));
    controller.initialize().await.expect("initialize");
    assert!(controller.is_authenticated());

    let pending = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.logout().await }
    });
    while *gateway.sign_out_calls.lock().await == 0 {
        tokio::task::yield_now().await;
    }
    assert!(!controller.is_authenticated());
    assert!(!pending.is_finished());

    gate.notify_one();
    pending.await.expect("join").expect("sign out");
    assert!(!controller.is_authenticated());
}

#[tokio::test]
async fn logout_clears_even_when_gateway_fails() {
    let gateway = FakeAuthGateway::new().with_current(Some(user("alice@example.com")));
    *gateway.sign_out_result.lock().await = Err(GatewayError::transport("offline"));
    let controller = SessionController::new(Arc::new(gateway));
    controller.initialize().await.expect("initialize");

    let err = controller.logout().await.expect_err("sign out fails");
    assert_eq!(err.to_string(), "offline");
    assert!(!controller.is_authenticated());
}

#[test]
fn epoch_advances_on_identity_changes_only() {
    let alice = user("alice@example.com");
    let mut state = SessionState::default();
    assert_eq!(state.epoch(), 0);

    assert_eq!(state.replace(Some(alice.clone())), None);
    assert_eq!(state.epoch(), 1);

    state.replace(Some(AuthenticatedUser {
        email: None,
        ..alice.clone()
    }));
    assert_eq!(state.epoch(), 1, "same user keeps the session");

    state.replace(None);
    state.replace(Some(alice));
    assert_eq!(state.epoch(), 3);

    state.replace(Some(user("bob@example.com")));
    assert_eq!(state.epoch(), 4);
}

#[tokio::test]
async fn logout_and_login_of_same_user_starts_new_session() {
    let alice = user("alice@example.com");
    let mut fake = FakeAuthGateway::new()
        .with_current(Some(alice.clone()))
        .with_sign_in(Ok(alice.clone()));
    fake.emit_on_sign_in = false;
    let controller = SessionController::new(Arc::new(fake));
    controller.initialize().await.expect("initialize");
    let before = controller.watch().borrow().epoch();

    controller.logout().await.expect("sign out");
    controller.login("alice@example.com", "pw").await.expect("login");
    controller.refresh().await.expect("refresh");

    let after = controller.watch().borrow().clone();
    assert_eq!(after.user(), Some(&alice));
    assert_eq!(after.epoch(), before + 2);
}

#[tokio::test]
async fn cancelling_subscription_aborts_listener() {
    let listener = tokio::spawn(std::future::pending::<()>());
    let abort = listener.abort_handle();
    let subscription = AuthSubscription { listener };
    assert!(subscription.is_active());

    subscription.cancel();
    tokio::time::timeout(Duration::from_secs(1), async {
        while !abort.is_finished() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("listener stopped");
}
