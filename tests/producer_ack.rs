mod common;

use std::sync::Arc;

use common::{RecordingConnection, RecordingHandler};
use relaymq::core::client::{Connection, LocalConnection, Outbound};
use relaymq::core::handlers::{AckWhen, SendAckHandler};
use relaymq::core::message::Message;
use relaymq::{ChannelQueue, QueueOptions, QueueStatus};

fn options(status: QueueStatus) -> QueueOptions {
    QueueOptions {
        initial_status: status,
        ..QueueOptions::default()
    }
}

#[tokio::test]
async fn producer_is_acknowledged_after_received() {
    let handler = Arc::new(SendAckHandler::new(AckWhen::AfterReceived));
    let queue = ChannelQueue::new("ack-on-receipt", options(QueueStatus::Paused), handler);

    let (producer, mut rx) = LocalConnection::new("p-1");
    queue
        .push(
            Message::new("payload").with_id("m-1"),
            Some(producer.clone() as Arc<dyn Connection>),
        )
        .await;

    // The acknowledgment goes out before any consumer is involved.
    let frame = rx.try_recv().expect("producer must receive an ack frame");
    assert!(matches!(
        frame,
        Outbound::Acknowledge { message_id: Some(id), negative: false } if id == "m-1"
    ));
    assert_eq!(queue.regular_message_count(), 1);

    queue.destroy();
}

#[tokio::test]
async fn producer_is_acknowledged_after_send() {
    let handler = Arc::new(SendAckHandler::new(AckWhen::AfterSent));
    let queue = ChannelQueue::new("ack-on-send", options(QueueStatus::Broadcast), handler);

    let (producer, mut rx) = LocalConnection::new("p-1");
    let consumer = RecordingConnection::new("c-1");
    queue.add_client(consumer.clone() as Arc<dyn Connection>);

    queue
        .push(
            Message::new("payload").with_id("m-2"),
            Some(producer.clone() as Arc<dyn Connection>),
        )
        .await;

    assert_eq!(consumer.message_count(), 1);
    let frame = rx.try_recv().expect("producer must receive an ack frame");
    assert!(matches!(
        frame,
        Outbound::Acknowledge { message_id: Some(id), negative: false } if id == "m-2"
    ));

    queue.destroy();
}

#[tokio::test]
async fn plain_policy_never_acknowledges_the_producer() {
    let handler = RecordingHandler::new();
    let queue = ChannelQueue::new("no-ack", options(QueueStatus::Broadcast), handler);

    let (producer, mut rx) = LocalConnection::new("p-1");
    let consumer = RecordingConnection::new("c-1");
    queue.add_client(consumer.clone() as Arc<dyn Connection>);

    queue
        .push(
            Message::new("payload"),
            Some(producer.clone() as Arc<dyn Connection>),
        )
        .await;

    assert_eq!(consumer.message_count(), 1);
    assert!(rx.try_recv().is_err(), "no ack was requested by the policy");

    queue.destroy();
}
