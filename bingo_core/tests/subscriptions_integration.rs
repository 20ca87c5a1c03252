/// Integration tests for the subscription fan-out fabric.
///
/// The slow-subscriber tests run with paused time so the two second delivery
/// timeout elapses instantly instead of stalling the suite.
use bingo_core::{
    constants::MAX_SUBSCRIBER_TASKS, GameError, GameEvent, GamePhase, SubscriptionsManager,
};
use uuid::Uuid;

fn broadcast(phase: GamePhase) -> GameEvent {
    GameEvent::update(Uuid::new_v4(), phase, "update", Vec::new())
}

#[tokio::test]
async fn test_phase_filtered_subscription() {
    let manager = SubscriptionsManager::new();
    let (calling_only, _guard_a) = manager
        .subscribe(vec![GamePhase::Calling], Vec::new())
        .await
        .unwrap();
    let (all_phases, _guard_b) = manager.subscribe(Vec::new(), Vec::new()).await.unwrap();

    manager
        .dispatch_event(broadcast(GamePhase::RoundStart))
        .await
        .unwrap();
    assert!(all_phases.try_recv().await.is_ok());
    assert!(calling_only.try_recv().await.is_err());

    manager
        .dispatch_event(broadcast(GamePhase::Calling))
        .await
        .unwrap();
    assert!(all_phases.try_recv().await.is_ok());
    assert!(calling_only.try_recv().await.is_ok());
}

#[tokio::test]
async fn test_recipient_filtered_subscription() {
    let manager = SubscriptionsManager::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let (alice_stream, _guard_a) = manager.subscribe(Vec::new(), vec![alice]).await.unwrap();
    let (bob_stream, _guard_b) = manager.subscribe(Vec::new(), vec![bob]).await.unwrap();

    let targeted = GameEvent::update(alice, GamePhase::Calling, "for alice", vec![alice]);
    manager.dispatch_event(targeted).await.unwrap();
    assert!(alice_stream.try_recv().await.is_ok());
    assert!(bob_stream.try_recv().await.is_err());

    // Broadcasts reach recipient-filtered subscribers too.
    manager
        .dispatch_event(broadcast(GamePhase::Calling))
        .await
        .unwrap();
    assert!(alice_stream.try_recv().await.is_ok());
    assert!(bob_stream.try_recv().await.is_ok());
}

#[tokio::test]
async fn test_per_subscriber_order_matches_dispatch_order() {
    let manager = SubscriptionsManager::new();
    let (stream, _guard) = manager.subscribe(Vec::new(), Vec::new()).await.unwrap();

    for n in 0..5 {
        manager
            .dispatch_event(GameEvent::update(
                Uuid::new_v4(),
                GamePhase::Calling,
                format!("event {n}"),
                Vec::new(),
            ))
            .await
            .unwrap();
        let received = stream.try_recv().await.unwrap();
        assert_eq!(received.message, format!("event {n}"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_subscriber_drops_events_without_blocking_others() {
    let manager = SubscriptionsManager::new();
    let (slow, _slow_guard) = manager.subscribe(Vec::new(), Vec::new()).await.unwrap();
    let (healthy, _healthy_guard) = manager.subscribe(Vec::new(), Vec::new()).await.unwrap();

    // The first dispatch lands in both capacity-1 buffers.
    manager
        .dispatch_event(broadcast(GamePhase::Calling))
        .await
        .unwrap();
    assert!(healthy.try_recv().await.is_ok());

    // The slow subscriber never reads, so its buffer stays full and every
    // further send to it times out. The healthy subscriber keeps receiving.
    for _ in 0..2 {
        let err = manager
            .dispatch_event(broadcast(GamePhase::Calling))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GameError::PartialDispatchFailure {
                failed: 1,
                total: 2
            }
        );
        assert!(healthy.try_recv().await.is_ok());
    }

    // Disposal still completes: the farewell send to the stuck channel is
    // abandoned on timeout and every delivery slot comes back.
    let err = manager.dispose(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(
        err,
        GameError::PartialDispatchFailure {
            failed: 1,
            total: 2
        }
    );
    assert_eq!(manager.available_delivery_slots(), MAX_SUBSCRIBER_TASKS);

    // The slow subscriber still holds the one event it never drained.
    assert!(slow.try_recv().await.is_ok());
    assert!(slow.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_to_a_full_buffer_waits_for_the_reader() {
    let manager = SubscriptionsManager::new();
    let (stream, _guard) = manager.subscribe(Vec::new(), Vec::new()).await.unwrap();

    manager
        .dispatch_event(broadcast(GamePhase::Calling))
        .await
        .unwrap();

    // A reader that drains the buffer mid-dispatch rescues the send.
    let reader_stream = stream.clone();
    let reader = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        reader_stream.recv().await
    });

    manager
        .dispatch_event(broadcast(GamePhase::Calling))
        .await
        .unwrap();
    assert!(reader.await.unwrap().is_some());
    assert!(stream.try_recv().await.is_ok());
}

#[tokio::test]
async fn test_subscribe_and_dispatch_refuse_after_dispose() {
    let manager = SubscriptionsManager::new();
    manager.dispose(Uuid::new_v4()).await.unwrap();

    assert!(matches!(
        manager.subscribe(Vec::new(), Vec::new()).await,
        Err(GameError::Terminated(_))
    ));
    assert!(matches!(
        manager.dispatch_event(broadcast(GamePhase::Calling)).await,
        Err(GameError::Terminated(_))
    ));
}

#[tokio::test]
async fn test_many_subscribers_all_receive_one_copy() {
    let manager = SubscriptionsManager::new();
    let mut streams = Vec::new();
    for _ in 0..150 {
        let (stream, guard) = manager.subscribe(Vec::new(), Vec::new()).await.unwrap();
        streams.push((stream, guard));
    }

    // More subscribers than delivery slots: the semaphore queues the
    // overflow instead of dropping or duplicating sends.
    manager
        .dispatch_event(broadcast(GamePhase::Calling))
        .await
        .unwrap();

    for (stream, _guard) in &streams {
        assert!(stream.try_recv().await.is_ok());
        assert!(stream.try_recv().await.is_err());
    }
    assert_eq!(manager.available_delivery_slots(), MAX_SUBSCRIBER_TASKS);
}
