//! Single-receiver delivery rotating over the connected consumers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::client::Connection;
use crate::core::message::QueueMessage;
use crate::core::queue::states::push::send_to_receiver;
use crate::core::queue::states::DeliveryState;
use crate::core::queue::{ChannelQueue, PullResult, PushResult, QueueStatus, StatusAction};

pub(super) struct RoundRobinState {
    processing: Mutex<Option<Arc<QueueMessage>>>,
    /// Rotation cursor. Reset whenever the status changes, because the state
    /// object is rebuilt.
    index: AtomicUsize,
}

impl RoundRobinState {
    pub(super) fn new() -> Self {
        Self {
            processing: Mutex::new(None),
            index: AtomicUsize::new(0),
        }
    }

    /// Picks the next connected receiver in rotation, trying each client at
    /// most once per call.
    fn next_receiver(&self, clients: &[Arc<dyn Connection>]) -> Option<Arc<dyn Connection>> {
        if clients.is_empty() {
            return None;
        }
        for _ in 0..clients.len() {
            let cursor = self.index.fetch_add(1, Ordering::Relaxed);
            let client = &clients[cursor % clients.len()];
            if client.is_connected() {
                return Some(client.clone());
            }
        }
        None
    }

    async fn process(
        &self,
        queue: &Arc<ChannelQueue>,
        message: &Arc<QueueMessage>,
    ) -> Result<PushResult> {
        let options = queue.options();

        let Some(receiver) = self.next_receiver(&queue.clients_snapshot()) else {
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

        if !receiver.is_connected() {
            queue.add_message(message.clone(), false);
            return Ok(PushResult::NoConsumers);
        }

        send_to_receiver(queue, message, &receiver, None).await
    }
}

#[async_trait]
impl DeliveryState for RoundRobinState {
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
