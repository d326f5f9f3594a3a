//! Rejects all traffic. Operational, not terminal: the queue can leave
//! Stopped and behave like a freshly created one.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::client::Connection;
use crate::core::message::QueueMessage;
use crate::core::queue::states::DeliveryState;
use crate::core::queue::{ChannelQueue, PullResult, PushResult, QueueStatus, StatusAction};

pub(super) struct StoppedState;

#[async_trait]
impl DeliveryState for StoppedState {
    fn trigger_supported(&self) -> bool {
        false
    }

    fn processing_message(&self) -> Option<Arc<QueueMessage>> {
        None
    }

    fn can_enqueue(&self, _queue: &ChannelQueue, _message: &Arc<QueueMessage>) -> bool {
        false
    }

    async fn push(
        &self,
        _queue: &Arc<ChannelQueue>,
        _message: Arc<QueueMessage>,
    ) -> Result<PushResult> {
        Ok(PushResult::StatusNotSupported)
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
        queue: &Arc<ChannelQueue>,
        _previous: QueueStatus,
    ) -> StatusAction {
        // Stopping flushes the store and the pending delivery registry so a
        // later restart starts from a clean slate.
        queue.clear_all_messages();
        queue.time_keeper().reset();
        StatusAction::Allow
    }

    async fn leave_status(&self, _queue: &Arc<ChannelQueue>, _next: QueueStatus) -> StatusAction {
        StatusAction::Allow
    }
}
