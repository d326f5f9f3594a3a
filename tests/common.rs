//! Shared test doubles: a frame-recording connection and a hook-counting
//! delivery handler.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use relaymq::core::client::{Connection, Outbound};
use relaymq::core::delivery::MessageDelivery;
use relaymq::core::handler::DeliveryHandler;
use relaymq::core::message::QueueMessage;
use relaymq::core::queue::ChannelQueue;
use relaymq::{Decision, PutBack};

/// Connection double recording every frame with its arrival instant.
pub struct RecordingConnection {
    id: String,
    connected: AtomicBool,
    accept_sends: AtomicBool,
    frames: Mutex<Vec<(Instant, Outbound)>>,
}

impl RecordingConnection {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            connected: AtomicBool::new(true),
            accept_sends: AtomicBool::new(true),
            frames: Mutex::new(Vec::new()),
        })
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// Keeps the connection "up" but makes every send fail.
    pub fn refuse_sends(&self) {
        self.accept_sends.store(false, Ordering::Release);
    }

    pub fn frames(&self) -> Vec<Outbound> {
        self.frames.lock().iter().map(|(_, f)| f.clone()).collect()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    /// Delivered message frames with their arrival instants.
    pub fn message_frames(&self) -> Vec<(Instant, Outbound)> {
        self.frames
            .lock()
            .iter()
            .filter(|(_, f)| matches!(f, Outbound::Message { .. }))
            .cloned()
            .collect()
    }

    pub fn message_count(&self) -> usize {
        self.message_frames().len()
    }

    pub fn message_ids(&self) -> Vec<Option<String>> {
        self.message_frames()
            .into_iter()
            .map(|(_, frame)| match frame {
                Outbound::Message { id, .. } => id,
                _ => None,
            })
            .collect()
    }

    pub fn message_payloads(&self) -> Vec<Vec<u8>> {
        self.message_frames()
            .into_iter()
            .map(|(_, frame)| match frame {
                Outbound::Message { payload, .. } => payload.to_vec(),
                _ => Vec::new(),
            })
            .collect()
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn send(&self, frame: Outbound) -> bool {
        if !self.is_connected() || !self.accept_sends.load(Ordering::Acquire) {
            return false;
        }
        self.frames.lock().push((Instant::now(), frame));
        true
    }
}

/// Allow-everything handler that counts hook invocations and can be told to
/// fail `begin_send` for fault-recovery tests.
#[derive(Default)]
pub struct RecordingHandler {
    pub begin_send_fails: AtomicBool,
    pub recovery_put_back: Mutex<Option<PutBack>>,
    pub dequeued: AtomicUsize,
    pub removed: AtomicUsize,
    pub timed_out: AtomicUsize,
    pub ack_timed_out: AtomicUsize,
    pub acks_received: AtomicUsize,
    pub errors_raised: AtomicUsize,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_begin_send(&self, put_back: PutBack) {
        self.begin_send_fails.store(true, Ordering::Release);
        *self.recovery_put_back.lock() = Some(put_back);
    }
}

#[async_trait]
impl DeliveryHandler for RecordingHandler {
    async fn begin_send(
        &self,
        _queue: &ChannelQueue,
        _message: &Arc<QueueMessage>,
    ) -> Result<Decision> {
        if self.begin_send_fails.load(Ordering::Acquire) {
            return Err(anyhow!("policy rejected begin_send"));
        }
        Ok(Decision::just_allow())
    }

    async fn acknowledge_received(
        &self,
        _queue: &ChannelQueue,
        _message_id: &str,
        _delivery: Option<&Arc<MessageDelivery>>,
        _success: bool,
    ) -> Result<Decision> {
        self.acks_received.fetch_add(1, Ordering::Relaxed);
        Ok(Decision::just_allow())
    }

    async fn message_timed_out(
        &self,
        _queue: &ChannelQueue,
        _message: &Arc<QueueMessage>,
    ) -> Result<Decision> {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
        Ok(Decision::just_allow())
    }

    async fn acknowledge_timed_out(
        &self,
        _queue: &ChannelQueue,
        _delivery: &Arc<MessageDelivery>,
    ) -> Result<Decision> {
        self.ack_timed_out.fetch_add(1, Ordering::Relaxed);
        Ok(Decision::just_allow())
    }

    async fn message_dequeued(&self, _queue: &ChannelQueue, _message: &Arc<QueueMessage>) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
    }

    async fn message_removed(&self, _queue: &ChannelQueue, _message: &Arc<QueueMessage>) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    async fn error_raised(
        &self,
        _queue: &ChannelQueue,
        _message: Option<&Arc<QueueMessage>>,
        _error: &anyhow::Error,
    ) -> Result<Decision> {
        self.errors_raised.fetch_add(1, Ordering::Relaxed);
        let put_back = (*self.recovery_put_back.lock()).unwrap_or(PutBack::No);
        Ok(Decision::full(
            true,
            false,
            put_back,
            relaymq::AckDecision::None,
        ))
    }
}

/// Polls `condition` until it holds or the timeout expires.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within {timeout:?}");
}
