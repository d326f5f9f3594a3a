//! Single-receiver delivery to the first available consumer.
//!
//! Messages are queued on push and drained by the trigger loop; each message
//! goes to exactly one connected receiver. With nobody eligible the message
//! stays queued and the drain pass stops.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::client::{Connection, Outbound};
use crate::core::decision::PutBack;
use crate::core::delivery::MessageDelivery;
use crate::core::message::QueueMessage;
use crate::core::queue::states::DeliveryState;
use crate::core::queue::{ChannelQueue, PullResult, PushResult, QueueStatus, StatusAction};

pub(super) struct PushState {
    processing: Mutex<Option<Arc<QueueMessage>>>,
}

impl PushState {
    pub(super) fn new() -> Self {
        Self {
            processing: Mutex::new(None),
        }
    }

    async fn process(
        &self,
        queue: &Arc<ChannelQueue>,
        message: &Arc<QueueMessage>,
    ) -> Result<PushResult> {
        let options = queue.options();

        let Some(receiver) = queue
            .clients_snapshot()
            .into_iter()
            .find(|client| client.is_connected())
        else {
            // Back to the head of its list so arrival order survives.
            queue.add_message(message.clone(), false);
            return Ok(PushResult::NoConsumers);
        };

        if options.request_acknowledge && options.wait_for_acknowledge {
            queue.wait_for_acknowledge(message).await;
            if queue.is_destroyed() {
                return Ok(PushResult::Success);
            }
        }

        // The receiver may have dropped while this send waited on the gate.
        if !receiver.is_connected() {
            queue.add_message(message.clone(), false);
            return Ok(PushResult::NoConsumers);
        }

        send_to_receiver(queue, message, &receiver, None).await
    }
}

/// Runs the `begin_send → can_consumer_receive → send →
/// consumer_received/failed → end_send` pipeline against one receiver,
/// applying each decision as it is made.
pub(super) async fn send_to_receiver(
    queue: &Arc<ChannelQueue>,
    message: &Arc<QueueMessage>,
    receiver: &Arc<dyn Connection>,
    in_reply_to: Option<String>,
) -> Result<PushResult> {
    let options = queue.options();
    let ack_deadline = options
        .request_acknowledge
        .then(|| Instant::now() + options.acknowledge_timeout);

    let decision = queue.handler().begin_send(queue, message).await?;
    message.set_decision(decision);
    if !queue.apply_decision(decision, message, None).await? {
        return Ok(PushResult::Success);
    }

    let receive = queue
        .handler()
        .can_consumer_receive(queue, message, receiver)
        .await?;
    message.set_decision(receive);
    if !queue.apply_decision(receive, message, None).await? {
        return Ok(PushResult::Success);
    }

    let delivery = Arc::new(MessageDelivery::new(message.clone(), receiver, ack_deadline));

    let sent = receiver
        .send(Outbound::for_message(message, in_reply_to))
        .await;
    if sent {
        if options.request_acknowledge {
            queue.time_keeper().add_acknowledge_check(delivery.clone());
        }
        if options.wait_for_acknowledge && message.is_pending_acknowledge() {
            queue.arm_acknowledge_gate();
        }

        delivery.mark_as_sent();
        message.set_first_acquirer(false);
        queue.stats().add_delivery();

        let received = queue
            .handler()
            .consumer_received(queue, &delivery, receiver)
            .await?;
        message.set_decision(received);
        if !queue.apply_decision(received, message, None).await? {
            return Ok(PushResult::Success);
        }
        queue.stats().add_sent();
    } else {
        let failed = queue
            .handler()
            .consumer_receive_failed(queue, &delivery, receiver)
            .await?;
        message.set_decision(failed);
        if !queue.apply_decision(failed, message, None).await? {
            return Ok(PushResult::Success);
        }
    }

    let end = queue.handler().end_send(queue, message).await?;
    message.set_decision(end);
    queue.apply_decision(end, message, None).await?;

    if end.allow && end.put_back == PutBack::No && !message.is_in_queue() {
        queue.stats().add_removed();
        queue.handler().message_removed(queue, message).await;
    }

    Ok(PushResult::Success)
}

#[async_trait]
impl DeliveryState for PushState {
    fn trigger_supported(&self) -> bool {
        true
    }

    fn processing_message(&self) -> Option<Arc<QueueMessage>> {
        self.processing.lock().clone()
    }

    fn can_enqueue(&self, _queue: &ChannelQueue, _message: &Arc<QueueMessage>) -> bool {
        true
    }

    async fn push(
        &self,
        queue: &Arc<ChannelQueue>,
        message: Arc<QueueMessage>,
    ) -> Result<PushResult> {
        *self.processing.lock() = Some(message.clone());
        let result = self.process(queue, &message).await;
        // Left in place on failure so the queue can attribute the fault.
        if result.is_ok() {
            *self.processing.lock() = None;
        }
        result
    }

    async fn pull(
        &self,
        _queue: &Arc<ChannelQueue>,
        _client: &Arc<dyn Connection>,
        _request_id: Option<String>,
    ) -> Result<PullResult> {
        Ok(PullResult::StatusNotSupported)
    }

    async fn enter_status(
        &self,
        _queue: &Arc<ChannelQueue>,
        _previous: QueueStatus,
    ) -> StatusAction {
        StatusAction::AllowAndTrigger
    }

    async fn leave_status(&self, _queue: &Arc<ChannelQueue>, _next: QueueStatus) -> StatusAction {
        StatusAction::Allow
    }
}
