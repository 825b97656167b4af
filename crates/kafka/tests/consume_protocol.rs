mod common;

use common::{fixture, Company, Fixture};
use std::sync::Arc;
use std::time::Duration;
use stream_kafka::testing::MemoryConsumer;
use stream_kafka::{CancellationToken, Error, Subscriber, SubscriberState, Subscription};

const TOPIC: &str = "companies";
const GROUP: &str = "company-service";
const POLL: Duration = Duration::from_millis(100);

async fn subscriber(fx: &Fixture, consumer: Arc<MemoryConsumer>) -> Subscriber<MemoryConsumer> {
    let subscriber = Subscriber::with_registry(consumer, &fx.registry, TOPIC)
        .await
        .unwrap()
        .with_poll_interval(POLL);
    subscriber.subscribe_to_topic().unwrap();
    subscriber
}

async fn start(
    fx: &Fixture,
    cancel: &CancellationToken,
) -> (Arc<MemoryConsumer>, Subscriber<MemoryConsumer>, Subscription<Company>) {
    let consumer = Arc::new(MemoryConsumer::new(fx.broker.clone(), GROUP));
    let subscriber = subscriber(fx, Arc::clone(&consumer)).await;
    let subscription = subscriber.consume_messages::<Company>(cancel.clone());
    (consumer, subscriber, subscription)
}

#[tokio::test(start_paused = true)]
async fn test_only_acknowledged_offsets_are_committed() {
    let fx = fixture(TOPIC).await;
    fx.publish_companies(TOPIC, 5).await;
    let cancel = CancellationToken::new();
    let (_consumer, _subscriber, mut subscription) = start(&fx, &cancel).await;

    let decisions = [true, true, false, true, false];
    for (i, decision) in decisions.into_iter().enumerate() {
        let delivered = subscription.messages.recv().await.unwrap();
        assert_eq!(delivered.offset, i as i64);
        assert_eq!(delivered.event.id, i.to_string());
        subscription.commit(decision).await.unwrap();
    }

    // The last decision is consumed before the loop polls again
    tokio::time::sleep(POLL * 2).await;
    assert_eq!(fx.broker.last_committed(GROUP, TOPIC), Some(3));
    assert_eq!(fx.broker.commit_calls(), 3);

    cancel.cancel();
    subscription.stopped().await;
}

#[tokio::test(start_paused = true)]
async fn test_declined_message_does_not_advance_offset() {
    let fx = fixture(TOPIC).await;
    fx.publish_companies(TOPIC, 2).await;
    let cancel = CancellationToken::new();
    let (_consumer, _subscriber, mut subscription) = start(&fx, &cancel).await;

    subscription.messages.recv().await.unwrap();
    subscription.commit(false).await.unwrap();
    subscription.messages.recv().await.unwrap();

    assert_eq!(fx.broker.last_committed(GROUP, TOPIC), None);
    assert_eq!(fx.broker.commit_calls(), 0);

    cancel.cancel();
    subscription.stopped().await;
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_message_is_reported_and_skipped() {
    let fx = fixture(TOPIC).await;
    fx.publish_companies(TOPIC, 1).await;
    fx.broker
        .append(TOPIC, None, &[0xde, 0xad, 0xbe, 0xef])
        .unwrap();
    fx.publish_companies(TOPIC, 1).await;

    let cancel = CancellationToken::new();
    let (_consumer, _subscriber, mut subscription) = start(&fx, &cancel).await;

    let first = subscription.messages.recv().await.unwrap();
    assert_eq!(first.offset, 0);
    subscription.commit(true).await.unwrap();

    match subscription.errors.recv().await.unwrap() {
        Error::Deserialization { topic, offset, .. } => {
            assert_eq!(topic, TOPIC);
            assert_eq!(offset, 1);
        }
        other => panic!("expected deserialization error, got {other:?}"),
    }

    let next = subscription.messages.recv().await.unwrap();
    assert_eq!(next.offset, 2);
    assert_eq!(fx.broker.last_committed(GROUP, TOPIC), Some(0));
    assert_eq!(fx.broker.commit_calls(), 1);

    cancel.cancel();
    subscription.stopped().await;
}

#[tokio::test(start_paused = true)]
async fn test_read_error_is_reported_and_loop_continues() {
    let fx = fixture(TOPIC).await;
    fx.publish_companies(TOPIC, 1).await;
    fx.broker.inject_read_error("Broker: Transport failure");

    let cancel = CancellationToken::new();
    let (_consumer, _subscriber, mut subscription) = start(&fx, &cancel).await;

    match subscription.errors.recv().await.unwrap() {
        Error::Read(message) => assert!(message.contains("Transport failure")),
        other => panic!("expected read error, got {other:?}"),
    }
    let delivered = subscription.messages.recv().await.unwrap();
    assert_eq!(delivered.event.id, "0");

    cancel.cancel();
    subscription.stopped().await;
}

#[tokio::test(start_paused = true)]
async fn test_commit_failure_is_reported() {
    let fx = fixture(TOPIC).await;
    fx.publish_companies(TOPIC, 2).await;
    fx.broker.fail_next_commits(1);

    let cancel = CancellationToken::new();
    let (_consumer, _subscriber, mut subscription) = start(&fx, &cancel).await;

    subscription.messages.recv().await.unwrap();
    subscription.commit(true).await.unwrap();
    match subscription.errors.recv().await.unwrap() {
        Error::Commit { offset, .. } => assert_eq!(offset, 0),
        other => panic!("expected commit error, got {other:?}"),
    }
    assert_eq!(fx.broker.last_committed(GROUP, TOPIC), None);

    let second = subscription.messages.recv().await.unwrap();
    assert_eq!(second.offset, 1);
    subscription.commit(true).await.unwrap();
    tokio::time::sleep(POLL * 2).await;
    assert_eq!(fx.broker.last_committed(GROUP, TOPIC), Some(1));

    cancel.cancel();
    subscription.stopped().await;
}

#[tokio::test(start_paused = true)]
async fn test_loop_does_not_read_ahead_of_the_caller() {
    let fx = fixture(TOPIC).await;
    fx.publish_companies(TOPIC, 3).await;
    let cancel = CancellationToken::new();
    let (consumer, _subscriber, mut subscription) = start(&fx, &cancel).await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(consumer.position(), 1);

    subscription.messages.recv().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(consumer.position(), 1, "no fetch before the decision");

    subscription.commit(true).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(consumer.position(), 2);

    cancel.cancel();
    subscription.stopped().await;
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_idle_closes_channels() {
    let fx = fixture(TOPIC).await;
    let cancel = CancellationToken::new();
    let (_consumer, subscriber, mut subscription) = start(&fx, &cancel).await;
    assert_eq!(subscriber.state(), SubscriberState::Consuming);

    tokio::time::sleep(POLL * 3).await;
    cancel.cancel();

    let closed = tokio::time::timeout(POLL, subscription.messages.recv())
        .await
        .expect("messages channel closes within one poll interval");
    assert!(closed.is_none());
    assert!(subscription.errors.recv().await.is_none());
    assert!(matches!(
        subscription.commit(true).await,
        Err(Error::SubscriptionClosed)
    ));

    subscription.stopped().await;
    assert_eq!(subscriber.state(), SubscriberState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_first_receive_delivers_nothing() {
    let fx = fixture(TOPIC).await;
    fx.publish_companies(TOPIC, 2).await;
    let cancel = CancellationToken::new();
    let (_consumer, subscriber, mut subscription) = start(&fx, &cancel).await;

    // The first message sits in the channel, never taken by the caller
    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(subscription.messages.recv().await.is_none());
    assert!(matches!(
        subscription.commit(true).await,
        Err(Error::SubscriptionClosed)
    ));
    assert_eq!(fx.broker.last_committed(GROUP, TOPIC), None);
    assert_eq!(fx.broker.commit_calls(), 0);

    subscription.stopped().await;
    assert_eq!(subscriber.state(), SubscriberState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_subscription_stops_loop() {
    let fx = fixture(TOPIC).await;
    let cancel = CancellationToken::new();
    let (_consumer, subscriber, subscription) = start(&fx, &cancel).await;

    tokio::time::sleep(POLL * 3).await;
    assert_eq!(subscriber.state(), SubscriberState::Consuming);
    drop(subscription);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(subscriber.state(), SubscriberState::Stopped);
    assert!(!cancel.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_subscription_while_awaiting_decision_stops_loop() {
    let fx = fixture(TOPIC).await;
    fx.publish_companies(TOPIC, 2).await;
    let cancel = CancellationToken::new();
    let (consumer, subscriber, mut subscription) = start(&fx, &cancel).await;

    subscription.messages.recv().await.unwrap();
    drop(subscription);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(subscriber.state(), SubscriberState::Stopped);
    assert_eq!(consumer.position(), 1);
    assert_eq!(fx.broker.commit_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_awaiting_decision_commits_nothing() {
    let fx = fixture(TOPIC).await;
    fx.publish_companies(TOPIC, 2).await;
    let cancel = CancellationToken::new();
    let (_consumer, subscriber, mut subscription) = start(&fx, &cancel).await;

    subscription.messages.recv().await.unwrap();
    cancel.cancel();

    tokio::time::timeout(POLL, subscription.stopped())
        .await
        .expect("loop exits without a commit decision");
    assert_eq!(subscriber.state(), SubscriberState::Stopped);
    assert_eq!(fx.broker.last_committed(GROUP, TOPIC), None);
    assert_eq!(fx.broker.commit_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_new_member_resumes_after_last_commit() {
    let fx = fixture(TOPIC).await;
    fx.publish_companies(TOPIC, 3).await;

    let cancel = CancellationToken::new();
    let (_consumer, _subscriber, mut subscription) = start(&fx, &cancel).await;
    for _ in 0..2 {
        subscription.messages.recv().await.unwrap();
        subscription.commit(true).await.unwrap();
    }
    // Third message is received but never acknowledged
    subscription.messages.recv().await.unwrap();
    cancel.cancel();
    subscription.stopped().await;
    assert_eq!(fx.broker.last_committed(GROUP, TOPIC), Some(1));

    let cancel = CancellationToken::new();
    let (_consumer, _subscriber, mut subscription) = start(&fx, &cancel).await;
    let redelivered = subscription.messages.recv().await.unwrap();
    assert_eq!(redelivered.offset, 2);
    assert_eq!(redelivered.event.id, "2");

    cancel.cancel();
    subscription.stopped().await;
}

#[tokio::test]
async fn test_subscribe_to_invalid_topic_fails() {
    let fx = fixture(TOPIC).await;
    let consumer = Arc::new(MemoryConsumer::new(fx.broker.clone(), GROUP));
    let subscriber = Subscriber::with_registry(consumer, &fx.registry, "bad topic!")
        .await
        .unwrap();

    let err = subscriber.subscribe_to_topic().unwrap_err();
    assert!(matches!(err, Error::Subscription { .. }));
    assert_eq!(subscriber.state(), SubscriberState::Created);
}

#[tokio::test(start_paused = true)]
async fn test_state_follows_lifecycle() {
    let fx = fixture(TOPIC).await;
    let consumer = Arc::new(MemoryConsumer::new(fx.broker.clone(), GROUP));
    let subscriber = Subscriber::with_registry(consumer, &fx.registry, TOPIC)
        .await
        .unwrap()
        .with_poll_interval(POLL);
    assert_eq!(subscriber.state(), SubscriberState::Created);

    subscriber.subscribe_to_topic().unwrap();
    assert_eq!(subscriber.state(), SubscriberState::Subscribed);

    let cancel = CancellationToken::new();
    let subscription = subscriber.consume_messages::<Company>(cancel.clone());
    assert_eq!(subscriber.state(), SubscriberState::Consuming);

    cancel.cancel();
    subscription.stopped().await;
    assert_eq!(subscriber.state(), SubscriberState::Stopped);
}
