//! Last-value cache: the store keeps only the newest message and pulls read
//! it without consuming it.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::client::{Connection, Outbound};
use crate::core::delivery::MessageDelivery;
use crate::core::message::QueueMessage;
use crate::core::queue::states::DeliveryState;
use crate::core::queue::{ChannelQueue, PullResult, PushResult, QueueStatus, StatusAction};

pub(super) struct CacheState {
    processing: Mutex<Option<Arc<QueueMessage>>>,
}

impl CacheState {
    pub(super) fn new() -> Self {
        Self {
            processing: Mutex::new(None),
        }
    }

    /// Serves the cached message to one requester. The message is not
    /// removed; every pull re-runs the full send pipeline.
    async fn serve(
        &self,
        queue: &Arc<ChannelQueue>,
        message: &Arc<QueueMessage>,
        client: &Arc<dyn Connection>,
        request_id: Option<String>,
    ) -> Result<PullResult> {
        let decision = queue.handler().begin_send(queue, message).await?;
        message.set_decision(decision);
        if !queue.apply_decision(decision, message, None).await? {
            return Ok(PullResult::Success);
        }

        let receive = queue
            .handler()
            .can_consumer_receive(queue, message, client)
            .await?;
        message.set_decision(receive);
        if !queue.apply_decision(receive, message, None).await? {
            return Ok(PullResult::Success);
        }

        // Cached reads carry no acknowledgment deadline; the slot outlives
        // any one delivery.
        let delivery = Arc::new(MessageDelivery::new(message.clone(), client, None));

        let sent = client
            .send(Outbound::for_message(message, request_id))
            .await;
        if sent {
            delivery.mark_as_sent();
            queue.stats().add_delivery();

            let received = queue
                .handler()
                .consumer_received(queue, &delivery, client)
                .await?;
            message.set_decision(received);
            queue.stats().add_sent();
            if !queue.apply_decision(received, message, None).await? {
                return Ok(PullResult::Success);
            }
        } else {
            let failed = queue
                .handler()
                .consumer_receive_failed(queue, &delivery, client)
                .await?;
            message.set_decision(failed);
            if !queue.apply_decision(failed, message, None).await? {
                return Ok(PullResult::Success);
            }
        }

        let end = queue.handler().end_send(queue, message).await?;
        message.set_decision(end);
        queue.apply_decision(end, message, None).await?;

        Ok(PullResult::Success)
    }
}

#[async_trait]
impl DeliveryState for CacheState {
    fn trigger_supported(&self) -> bool {
        false
    }

    fn processing_message(&self) -> Option<Arc<QueueMessage>> {
        self.processing.lock().clone()
    }

    fn can_enqueue(&self, queue: &ChannelQueue, _message: &Arc<QueueMessage>) -> bool {
        // Only the newest message survives; everything queued before it goes.
        queue.clear_all_messages();
        true
    }

    async fn push(
        &self,
        _queue: &Arc<ChannelQueue>,
        _message: Arc<QueueMessage>,
    ) -> Result<PushResult> {
        Ok(PushResult::Success)
    }

    async fn pull(
        &self,
        queue: &Arc<ChannelQueue>,
        client: &Arc<dyn Connection>,
        request_id: Option<String>,
    ) -> Result<PullResult> {
        let Some(message) = queue.find_next_message() else {
            let _ = client.send(Outbound::Empty { request_id }).await;
            return Ok(PullResult::Empty);
        };

        *self.processing.lock() = Some(message.clone());
        let result = self.serve(queue, &message, client, request_id).await;
        // Left in place on failure so the queue can attribute the fault.
        if result.is_ok() {
            *self.processing.lock() = None;
        }
        result
    }

    async fn enter_status(
        &self,
        _queue: &Arc<ChannelQueue>,
        _previous: QueueStatus,
    ) -> StatusAction {
        StatusAction::Allow
    }

    async fn leave_status(&self, _queue: &Arc<ChannelQueue>, _next: QueueStatus) -> StatusAction {
        StatusAction::Allow
    }
}
