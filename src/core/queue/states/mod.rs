//! Status-bound delivery strategies.
//!
//! Each queue status maps to one strategy object deciding whether pushes are
//! deferred into the store and how queued messages reach receivers. States
//! are constructed fresh on every status change and hold no shared mutable
//! state beyond the message currently being processed.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::client::Connection;
use crate::core::message::QueueMessage;
use crate::core::queue::{ChannelQueue, PullResult, PushResult, QueueStatus, StatusAction};

mod broadcast;
mod cache;
mod paused;
mod pull;
mod push;
mod round_robin;
mod stopped;

/// One delivery strategy, bound to the queue status it implements.
#[async_trait]
pub(crate) trait DeliveryState: Send + Sync {
    /// Whether the drain loop can push queued messages for this state.
    fn trigger_supported(&self) -> bool;

    /// The message currently flowing through this state's pipeline, used for
    /// fault attribution when a policy hook fails.
    fn processing_message(&self) -> Option<Arc<QueueMessage>>;

    /// Whether a fresh push is deferred into the queue store instead of
    /// being delivered inline.
    fn can_enqueue(&self, queue: &ChannelQueue, message: &Arc<QueueMessage>) -> bool;

    /// Runs the delivery algorithm for one message.
    async fn push(&self, queue: &Arc<ChannelQueue>, message: Arc<QueueMessage>)
        -> Result<PushResult>;

    /// Serves an explicit consumer request for the next message.
    async fn pull(
        &self,
        queue: &Arc<ChannelQueue>,
        client: &Arc<dyn Connection>,
        request_id: Option<String>,
    ) -> Result<PullResult>;

    /// Called on the incoming state after a status swap.
    async fn enter_status(&self, queue: &Arc<ChannelQueue>, previous: QueueStatus) -> StatusAction;

    /// Called on the outgoing state before a status swap.
    async fn leave_status(&self, queue: &Arc<ChannelQueue>, next: QueueStatus) -> StatusAction;
}

/// Builds the strategy object for a status.
pub(crate) fn create(status: QueueStatus) -> Arc<dyn DeliveryState> {
    match status {
        QueueStatus::Broadcast => Arc::new(broadcast::BroadcastState::new()),
        QueueStatus::Push => Arc::new(push::PushState::new()),
        QueueStatus::RoundRobin => Arc::new(round_robin::RoundRobinState::new()),
        QueueStatus::Pull => Arc::new(pull::PullState::new()),
        QueueStatus::Cache => Arc::new(cache::CacheState::new()),
        QueueStatus::Paused => Arc::new(paused::PausedState),
        QueueStatus::Stopped => Arc::new(stopped::StoppedState),
    }
}
