//! Fan-out delivery: every connected, eligible receiver gets the message.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::client::{Connection, Outbound};
use crate::core::decision::{Decision, PutBack};
use crate::core::delivery::MessageDelivery;
use crate::core::message::QueueMessage;
use crate::core::queue::states::DeliveryState;
use crate::core::queue::{ChannelQueue, PullResult, PushResult, QueueStatus, StatusAction};

pub(super) struct BroadcastState {
    processing: Mutex<Option<Arc<QueueMessage>>>,
}

impl BroadcastState {
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

        // An expected acknowledgment puts a deadline on every delivery.
        let ack_deadline = options
            .request_acknowledge
            .then(|| Instant::now() + options.acknowledge_timeout);

        let clients: Vec<Arc<dyn Connection>> = queue
            .clients_snapshot()
            .into_iter()
            .filter(|client| client.is_connected())
            .collect();
        if clients.is_empty() {
            queue.stats().add_removed();
            queue.handler().message_removed(queue, message).await;
            return Ok(PushResult::NoConsumers);
        }

        if options.request_acknowledge && options.wait_for_acknowledge {
            queue.wait_for_acknowledge(message).await;
            if queue.is_destroyed() {
                return Ok(PushResult::Success);
            }
        }

        let decision = queue.handler().begin_send(queue, message).await?;
        message.set_decision(decision);
        if !queue.apply_decision(decision, message, None).await? {
            return Ok(PushResult::Success);
        }

        let mut finals = Decision::deny();
        let mut message_sent = false;

        for client in clients {
            if !client.is_connected() {
                continue;
            }

            if !message.is_first_acquirer() && options.send_only_first_acquirer {
                break;
            }

            let receive = queue
                .handler()
                .can_consumer_receive(queue, message, &client)
                .await?;
            finals = finals.merged_with(receive);
            if !receive.allow {
                continue;
            }

            let delivery = Arc::new(MessageDelivery::new(message.clone(), &client, ack_deadline));
            let first_acquirer = message.is_first_acquirer();

            let sent = client.send(Outbound::for_message(message, None)).await;
            if sent {
                message_sent = true;

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
                    .consumer_received(queue, &delivery, &client)
                    .await?;
                finals = finals.merged_with(received);

                if options.send_only_first_acquirer && first_acquirer {
                    break;
                }
            } else {
                let failed = queue
                    .handler()
                    .consumer_receive_failed(queue, &delivery, &client)
                    .await?;
                finals = finals.merged_with(failed);
            }
        }

        message.set_decision(finals);
        if !queue.apply_decision(finals, message, None).await? {
            return Ok(PushResult::Success);
        }

        if message_sent {
            queue.stats().add_sent();
        }

        let end = queue.handler().end_send(queue, message).await?;
        message.set_decision(end);
        queue.apply_decision(end, message, None).await?;

        if end.allow && end.put_back == PutBack::No {
            queue.stats().add_removed();
            queue.handler().message_removed(queue, message).await;
        }

        Ok(PushResult::Success)
    }
}

#[async_trait]
impl DeliveryState for BroadcastState {
    fn trigger_supported(&self) -> bool {
        true
    }

    fn processing_message(&self) -> Option<Arc<QueueMessage>> {
        self.processing.lock().clone()
    }

    fn can_enqueue(&self, _queue: &ChannelQueue, _message: &Arc<QueueMessage>) -> bool {
        false
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
