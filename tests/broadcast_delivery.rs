mod common;

use std::sync::Arc;

use common::{wait_until, RecordingConnection, RecordingHandler};
use relaymq::core::client::{Connection, Outbound};
use relaymq::core::message::Message;
use relaymq::{ChannelQueue, PushResult, PutBack, QueueOptions, QueueStatus};
use std::time::Duration;

fn broadcast_options() -> QueueOptions {
    QueueOptions {
        initial_status: QueueStatus::Broadcast,
        ..QueueOptions::default()
    }
}

#[tokio::test]
async fn broadcast_fans_out_to_every_receiver() {
    let handler = RecordingHandler::new();
    let queue = ChannelQueue::new("fanout", broadcast_options(), handler.clone());

    let first = RecordingConnection::new("c-1");
    let second = RecordingConnection::new("c-2");
    queue.add_client(first.clone() as Arc<dyn Connection>);
    queue.add_client(second.clone() as Arc<dyn Connection>);

    let result = queue.push(Message::new("hello"), None).await;
    assert_eq!(result, PushResult::Success);

    assert_eq!(first.message_count(), 1);
    assert_eq!(second.message_count(), 1);
    assert_eq!(first.message_payloads()[0], b"hello");

    let stats = queue.stats().snapshot();
    assert_eq!(stats.received, 1);
    assert_eq!(stats.deliveries, 2);
    assert_eq!(stats.sent, 1);

    queue.destroy();
}

#[tokio::test]
async fn broadcast_without_receivers_reports_no_consumers() {
    let handler = RecordingHandler::new();
    let queue = ChannelQueue::new("empty-room", broadcast_options(), handler.clone());

    let result = queue.push(Message::new("nobody home"), None).await;
    assert_eq!(result, PushResult::NoConsumers);

    // Exactly one removal notification, never a message timeout.
    assert_eq!(handler.removed.load(std::sync::atomic::Ordering::Relaxed), 1);
    assert_eq!(
        handler.timed_out.load(std::sync::atomic::Ordering::Relaxed),
        0
    );
    assert!(queue.is_empty());

    queue.destroy();
}

#[tokio::test]
async fn send_only_first_acquirer_stops_after_first_delivery() {
    let handler = RecordingHandler::new();
    let options = QueueOptions {
        send_only_first_acquirer: true,
        ..broadcast_options()
    };
    let queue = ChannelQueue::new("first-only", options, handler);

    let first = RecordingConnection::new("c-1");
    let second = RecordingConnection::new("c-2");
    queue.add_client(first.clone() as Arc<dyn Connection>);
    queue.add_client(second.clone() as Arc<dyn Connection>);

    queue.push(Message::new("exclusive"), None).await;

    assert_eq!(
        first.message_count() + second.message_count(),
        1,
        "only the first successful receiver may get the message"
    );

    queue.destroy();
}

#[tokio::test]
async fn disconnected_receivers_are_skipped() {
    let handler = RecordingHandler::new();
    let queue = ChannelQueue::new("half-gone", broadcast_options(), handler);

    let online = RecordingConnection::new("up");
    let offline = RecordingConnection::new("down");
    offline.disconnect();
    queue.add_client(online.clone() as Arc<dyn Connection>);
    queue.add_client(offline.clone() as Arc<dyn Connection>);

    queue.push(Message::new("selective"), None).await;

    assert_eq!(online.message_count(), 1);
    assert_eq!(offline.frame_count(), 0);

    queue.destroy();
}

#[tokio::test]
async fn failed_transport_send_is_not_an_error() {
    let handler = RecordingHandler::new();
    let queue = ChannelQueue::new("refusing", broadcast_options(), handler);

    let receiver = RecordingConnection::new("c-1");
    receiver.refuse_sends();
    queue.add_client(receiver.clone() as Arc<dyn Connection>);

    let result = queue.push(Message::new("bounced"), None).await;
    assert_eq!(result, PushResult::Success);
    assert_eq!(receiver.message_count(), 0);
    assert_eq!(queue.stats().snapshot().errors, 0);

    queue.destroy();
}

#[tokio::test]
async fn hidden_client_names_are_stripped_from_frames() {
    let handler = RecordingHandler::new();
    let options = QueueOptions {
        hide_client_names: true,
        ..broadcast_options()
    };
    let queue = ChannelQueue::new("anonymous", options, handler);

    let receiver = RecordingConnection::new("c-1");
    queue.add_client(receiver.clone() as Arc<dyn Connection>);

    queue
        .push(Message::new("tip").with_source("trader-1"), None)
        .await;

    let (_, frame) = &receiver.message_frames()[0];
    assert!(matches!(frame, Outbound::Message { source: None, .. }));

    queue.destroy();
}

#[tokio::test]
async fn policy_fault_recovers_with_put_back() {
    let handler = RecordingHandler::new();
    handler.fail_begin_send(PutBack::End);
    let queue = ChannelQueue::new("faulty-policy", broadcast_options(), handler.clone());

    let receiver = RecordingConnection::new("c-1");
    queue.add_client(receiver.clone() as Arc<dyn Connection>);

    let result = queue.push(Message::new("survivor"), None).await;
    assert_eq!(result, PushResult::Success);

    wait_until(Duration::from_secs(1), || {
        handler.errors_raised.load(std::sync::atomic::Ordering::Relaxed) >= 1
    })
    .await;

    // The recovery decision put the message back instead of losing it.
    assert_eq!(queue.regular_message_count(), 1);
    assert_eq!(receiver.message_count(), 0);

    queue.destroy();
}
