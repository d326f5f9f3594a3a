//! Consumer-driven delivery: messages wait until a receiver asks.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::client::{Connection, Outbound};
use crate::core::message::QueueMessage;
use crate::core::queue::states::push::send_to_receiver;
use crate::core::queue::states::DeliveryState;
use crate::core::queue::{ChannelQueue, PullResult, PushResult, QueueStatus, StatusAction};

pub(super) struct PullState {
    processing: Mutex<Option<Arc<QueueMessage>>>,
}

impl PullState {
    pub(super) fn new() -> Self {
        Self {
            processing: Mutex::new(None),
        }
    }
}

#[async_trait]
impl DeliveryState for PullState {
    fn trigger_supported(&self) -> bool {
        false
    }

    fn processing_message(&self) -> Option<Arc<QueueMessage>> {
        self.processing.lock().clone()
    }

    fn can_enqueue(&self, _queue: &ChannelQueue, _message: &Arc<QueueMessage>) -> bool {
        true
    }

    async fn push(
        &self,
        _queue: &Arc<ChannelQueue>,
        _message: Arc<QueueMessage>,
    ) -> Result<PushResult> {
        // Pushes always queue; delivery happens on pull.
        Ok(PushResult::Success)
    }

    async fn pull(
        &self,
        queue: &Arc<ChannelQueue>,
        client: &Arc<dyn Connection>,
        request_id: Option<String>,
    ) -> Result<PullResult> {
        let Some(message) = queue.dequeue_next_message() else {
            let _ = client.send(Outbound::Empty { request_id }).await;
            return Ok(PullResult::Empty);
        };

        queue.handler().message_dequeued(queue, &message).await;

        let options = queue.options();
        if options.request_acknowledge && options.wait_for_acknowledge {
            queue.wait_for_acknowledge(&message).await;
            if queue.is_destroyed() {
                return Ok(PullResult::Success);
            }
        }

        *self.processing.lock() = Some(message.clone());
        let result = send_to_receiver(queue, &message, client, request_id).await;
        // Left in place on failure so the queue can attribute the fault.
        if result.is_ok() {
            *self.processing.lock() = None;
        }
        result?;

        Ok(PullResult::Success)
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
