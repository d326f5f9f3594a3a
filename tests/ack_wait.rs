mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{wait_until, RecordingConnection, RecordingHandler};
use relaymq::core::client::Connection;
use relaymq::core::message::Message;
use relaymq::{ChannelQueue, QueueOptions, QueueStatus};

fn ack_options(acknowledge_timeout: Duration) -> QueueOptions {
    QueueOptions {
        initial_status: QueueStatus::Broadcast,
        request_acknowledge: true,
        wait_for_acknowledge: true,
        acknowledge_timeout,
        ..QueueOptions::default()
    }
}

#[tokio::test]
async fn second_delivery_waits_for_first_acknowledgment() {
    let handler = RecordingHandler::new();
    let queue = ChannelQueue::new("ack-serial", ack_options(Duration::from_secs(30)), handler);

    let consumer = RecordingConnection::new("c-1");
    let connection: Arc<dyn Connection> = consumer.clone();
    queue.add_client(connection.clone());

    queue.push(Message::new("one"), None).await;
    assert_eq!(consumer.message_count(), 1);

    let second_push = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.push(Message::new("two"), None).await })
    };

    // The second delivery must be parked on the acknowledge gate.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(consumer.message_count(), 1);
    assert!(!second_push.is_finished());

    let first_id = consumer.message_ids()[0].clone().expect("id was stamped");
    queue.acknowledge_delivered(&connection, &first_id, true).await;

    wait_until(Duration::from_secs(2), || consumer.message_count() == 2).await;
    second_push.await.unwrap();

    // Deliveries are strictly ordered, not overlapping.
    let frames = consumer.message_frames();
    assert!(frames[0].0 < frames[1].0);

    queue.destroy();
}

#[tokio::test]
async fn acknowledge_timeout_releases_the_gate() {
    let handler = RecordingHandler::new();
    let queue = ChannelQueue::new(
        "ack-timeout-gate",
        ack_options(Duration::from_millis(100)),
        handler.clone(),
    );

    let consumer = RecordingConnection::new("c-1");
    queue.add_client(consumer.clone() as Arc<dyn Connection>);

    queue.push(Message::new("one"), None).await;

    let second_push = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.push(Message::new("two"), None).await })
    };

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(consumer.message_count(), 1);

    // The time keeper expires the unacknowledged delivery and frees the gate.
    wait_until(Duration::from_secs(3), || consumer.message_count() == 2).await;
    second_push.await.unwrap();
    assert!(handler.ack_timed_out.load(Ordering::Relaxed) >= 1);

    queue.destroy();
}

#[tokio::test]
async fn acknowledgment_without_a_delivery_still_runs_the_pipeline() {
    let handler = RecordingHandler::new();
    let queue = ChannelQueue::new(
        "ghost-ack",
        ack_options(Duration::from_secs(30)),
        handler.clone(),
    );

    let consumer = RecordingConnection::new("c-1");
    let connection: Arc<dyn Connection> = consumer.clone();
    queue.add_client(connection.clone());

    // Nothing was ever delivered under this id; after the bounded retry the
    // policy is still consulted, with no delivery reference.
    queue.acknowledge_delivered(&connection, "ghost-1", true).await;
    assert_eq!(handler.acks_received.load(Ordering::Relaxed), 1);

    queue.destroy();
}

#[tokio::test]
async fn destroy_frees_a_blocked_pusher() {
    let handler = RecordingHandler::new();
    let queue = ChannelQueue::new(
        "ack-destroy",
        ack_options(Duration::from_secs(30)),
        handler,
    );

    let consumer = RecordingConnection::new("c-1");
    queue.add_client(consumer.clone() as Arc<dyn Connection>);

    queue.push(Message::new("one"), None).await;

    let second_push = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.push(Message::new("two"), None).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!second_push.is_finished());

    queue.destroy();

    tokio::time::timeout(Duration::from_secs(1), second_push)
        .await
        .expect("blocked pusher must be released on destroy")
        .unwrap();
}
