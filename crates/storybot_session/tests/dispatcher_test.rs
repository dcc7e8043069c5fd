mod common;

use common::{GatedRunner, Harness, RecordingGateway};
use std::sync::Arc;
use std::time::Duration;
use storybot_core::{InboundEvent, SessionId};
use storybot_generation::JobRunner;
use storybot_session::{Dispatcher, SessionState, SessionStore, tokens};

fn dispatcher(gateway: Arc<RecordingGateway>) -> Dispatcher {
    let harness = Harness::with_runner(Arc::new(GatedRunner::closed()) as Arc<dyn JobRunner>);
    Dispatcher::new(
        Arc::new(SessionStore::new(Duration::from_secs(60))),
        Arc::new(harness.machine),
        gateway,
    )
}

#[tokio::test]
async fn test_dispatch_creates_session_and_delivers_replies() {
    let gateway = Arc::new(RecordingGateway::default());
    let dispatcher = dispatcher(Arc::clone(&gateway));

    let t = dispatcher.dispatch(InboundEvent::text("alice", "/start")).await;
    assert_eq!(t.next, SessionState::MainMenu);
    assert!(dispatcher.sessions().contains(&SessionId::new("alice")).await);

    dispatcher
        .dispatch(InboundEvent::callback("alice", tokens::CREATE_BOOK))
        .await;

    let delivered = gateway.delivered.lock().expect("Delivery lock").clone();
    assert_eq!(delivered.len(), 2);
    assert!(delivered.iter().all(|m| m.session == SessionId::new("alice")));
    assert!(delivered[1].text.contains("title"));
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let gateway = Arc::new(RecordingGateway::default());
    let dispatcher = dispatcher(Arc::clone(&gateway));

    dispatcher
        .dispatch(InboundEvent::callback("alice", tokens::CREATE_BOOK))
        .await;
    let t = dispatcher.dispatch(InboundEvent::text("bob", "Cat")).await;

    assert_eq!(t.next, SessionState::MainMenu);
    let alice = dispatcher.sessions().session(&SessionId::new("alice")).await;
    assert_eq!(alice.lock().await.state(), SessionState::AwaitingBookTitle);
    assert_eq!(dispatcher.sessions().len().await, 2);
}

#[tokio::test]
async fn test_turns_of_one_session_are_sequential() {
    let gateway = Arc::new(RecordingGateway::default());
    let dispatcher = dispatcher(Arc::clone(&gateway));

    let a = dispatcher.clone();
    let b = dispatcher.clone();
    let first = tokio::spawn(async move {
        a.dispatch(InboundEvent::callback("alice", tokens::CREATE_BOOK))
            .await
    });
    let first = first.await.expect("First turn");
    let second = tokio::spawn(async move { b.dispatch(InboundEvent::text("alice", "Cat")).await })
        .await
        .expect("Second turn");

    assert_eq!(first.next, SessionState::AwaitingBookTitle);
    assert_eq!(second.next, SessionState::AwaitingBookDescription);
}

#[tokio::test(start_paused = true)]
async fn test_idle_sessions_are_evicted() {
    let store = SessionStore::new(Duration::from_secs(60));
    store.session(&SessionId::new("alice")).await;

    tokio::time::advance(Duration::from_secs(30)).await;
    store.session(&SessionId::new("bob")).await;
    assert_eq!(store.evict_idle().await, 0);

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(store.evict_idle().await, 1);
    assert!(!store.contains(&SessionId::new("alice")).await);
    assert!(store.contains(&SessionId::new("bob")).await);
}

#[tokio::test(start_paused = true)]
async fn test_busy_session_is_not_evicted() {
    let store = SessionStore::new(Duration::from_secs(60));
    let handle = store.session(&SessionId::new("alice")).await;
    let _turn = handle.lock().await;

    tokio::time::advance(Duration::from_secs(120)).await;
    assert_eq!(store.evict_idle().await, 0);
    assert_eq!(store.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_eviction_task_runs_periodically() {
    let gateway = Arc::new(RecordingGateway::default());
    let dispatcher = dispatcher(gateway);
    dispatcher.dispatch(InboundEvent::text("alice", "/start")).await;

    let task = dispatcher.spawn_eviction(Duration::from_secs(30));
    tokio::time::sleep(Duration::from_secs(95)).await;

    assert!(dispatcher.sessions().is_empty().await);
    task.abort();
}
