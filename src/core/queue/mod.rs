//! The queue: message store, delivery state machine and decision executor.
//!
//! A `ChannelQueue` owns two FIFO lists (priority and regular), the options
//! and statistics, the registry of connected receivers, and exactly one
//! active [`DeliveryState`](states::DeliveryState) matching its status.
//! Pushes consult the [`DeliveryHandler`](crate::core::handler::DeliveryHandler)
//! at every lifecycle step and all resulting side effects funnel through
//! [`ChannelQueue::apply_decision`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{info, trace, warn};

use crate::core::client::{Connection, Outbound};
use crate::core::decision::{AckDecision, Decision, PutBack};
use crate::core::handler::DeliveryHandler;
use crate::core::message::{generate_id, Message, QueueMessage};
use crate::core::stats::QueueStats;

mod ack_gate;
mod options;
mod states;
mod timekeeper;

pub use options::QueueOptions;

use ack_gate::AckGate;
use states::DeliveryState;
use timekeeper::TimeKeeper;

/// Safety-net period re-invoking the drain in case a wake-up was missed.
const FALLBACK_TRIGGER_INTERVAL: Duration = Duration::from_secs(5);

/// Delivery discipline a queue currently runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Fan out each message to every connected receiver.
    Broadcast,
    /// Queue messages and deliver each to the first available receiver.
    Push,
    /// Queue messages and deliver each to one receiver in rotation.
    RoundRobin,
    /// Queue messages until a receiver explicitly pulls.
    Pull,
    /// Keep only the newest message and serve it without consuming.
    Cache,
    /// Accept messages, deliver nothing.
    Paused,
    /// Reject everything.
    Stopped,
}

/// Outcome of a push operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    Success,
    /// Message count or size limit exceeded; nothing was mutated.
    LimitExceeded,
    /// The current status does not accept pushes.
    StatusNotSupported,
    /// No eligible receiver; drains stop on this.
    NoConsumers,
    /// Nothing left to process; drains stop on this.
    Empty,
}

/// Outcome of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullResult {
    Success,
    /// Nothing queued; the requester was told so.
    Empty,
    /// The current status does not serve pulls.
    StatusNotSupported,
}

/// Verdict of a state's enter/leave negotiation during a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusAction {
    Allow,
    AllowAndTrigger,
    Deny,
    DenyAndTrigger,
}

struct StateSlot {
    status: QueueStatus,
    state: Arc<dyn DeliveryState>,
}

/// One named queue with its store, status and delivery policy.
pub struct ChannelQueue {
    name: String,
    options: QueueOptions,
    handler: Arc<dyn DeliveryHandler>,
    stats: QueueStats,
    state: RwLock<StateSlot>,

    priority_list: Mutex<VecDeque<Arc<QueueMessage>>>,
    regular_list: Mutex<VecDeque<Arc<QueueMessage>>>,
    /// Serializes compound store operations spanning both lists.
    list_sync: Mutex<()>,

    clients: RwLock<Vec<Arc<dyn Connection>>>,

    time_keeper: TimeKeeper,
    ack_gate: AckGate,

    /// Queue-wide drain lock: `trigger` is single-flight.
    push_sync: AsyncMutex<()>,
    triggering: AtomicBool,
    destroyed: AtomicBool,

    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ChannelQueue {
    /// Creates the queue and starts its background tasks (deadline scan and
    /// fallback trigger), both bound to the queue's lifetime.
    pub fn new(
        name: impl Into<String>,
        options: QueueOptions,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Arc<Self> {
        let initial = options.initial_status;
        let queue = Arc::new(Self {
            name: name.into(),
            options,
            handler,
            stats: QueueStats::default(),
            state: RwLock::new(StateSlot {
                status: initial,
                state: states::create(initial),
            }),
            priority_list: Mutex::new(VecDeque::new()),
            regular_list: Mutex::new(VecDeque::new()),
            list_sync: Mutex::new(()),
            clients: RwLock::new(Vec::new()),
            time_keeper: TimeKeeper::new(),
            ack_gate: AckGate::new(),
            push_sync: AsyncMutex::new(()),
            triggering: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        });

        let scan = TimeKeeper::run(&queue);
        let fallback = Self::run_fallback_trigger(&queue);
        queue.tasks.lock().extend([scan, fallback]);

        info!(target: "relaymq::queue", queue = %queue.name, status = ?initial, "queue created");
        queue
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    pub(crate) fn handler(&self) -> &Arc<dyn DeliveryHandler> {
        &self.handler
    }

    pub(crate) fn time_keeper(&self) -> &TimeKeeper {
        &self.time_keeper
    }

    pub fn status(&self) -> QueueStatus {
        self.state.read().status
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn current_state(&self) -> Arc<dyn DeliveryState> {
        self.state.read().state.clone()
    }

    // ───────────────────────────────────────────────────────
    // Receivers
    // ───────────────────────────────────────────────────────

    /// Registers a receiver. Pending messages are drained toward it right
    /// away when the current state supports triggering.
    pub fn add_client(self: &Arc<Self>, client: Arc<dyn Connection>) {
        self.clients.write().push(client);
        if self.current_state().trigger_supported() && !self.triggering.load(Ordering::Acquire) {
            self.schedule_trigger();
        }
    }

    pub fn remove_client(&self, client_id: &str) {
        self.clients.write().retain(|c| c.id() != client_id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    pub(crate) fn clients_snapshot(&self) -> Vec<Arc<dyn Connection>> {
        self.clients.read().clone()
    }

    // ───────────────────────────────────────────────────────
    // Store
    // ───────────────────────────────────────────────────────

    pub fn priority_message_count(&self) -> usize {
        self.priority_list.lock().len()
    }

    pub fn regular_message_count(&self) -> usize {
        self.regular_list.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.priority_message_count() == 0 && self.regular_message_count() == 0
    }

    /// Peeks the next message without removing it: priority list first.
    pub fn find_next_message(&self) -> Option<Arc<QueueMessage>> {
        if let Some(message) = self.priority_list.lock().front() {
            return Some(message.clone());
        }
        self.regular_list.lock().front().cloned()
    }

    /// Removes and returns the next message, priority list first.
    pub(crate) fn dequeue_next_message(&self) -> Option<Arc<QueueMessage>> {
        {
            let mut priority = self.priority_list.lock();
            if let Some(message) = priority.pop_front() {
                message.set_in_queue(false);
                return Some(message);
            }
        }
        let mut regular = self.regular_list.lock();
        let message = regular.pop_front()?;
        message.set_in_queue(false);
        Some(message)
    }

    pub fn clear_priority_messages(&self) {
        for message in self.priority_list.lock().drain(..) {
            message.set_in_queue(false);
        }
    }

    pub fn clear_regular_messages(&self) {
        for message in self.regular_list.lock().drain(..) {
            message.set_in_queue(false);
        }
    }

    pub fn clear_all_messages(&self) {
        self.clear_priority_messages();
        self.clear_regular_messages();
    }

    /// Inserts a message into the list matching its priority.
    ///
    /// The unlocked membership check is an optimization only; the re-check
    /// under the list lock is authoritative, so a message can never sit in a
    /// list twice or in both lists at once.
    pub(crate) fn add_message(&self, message: Arc<QueueMessage>, to_end: bool) {
        if message.is_in_queue() {
            return;
        }

        let list = if message.is_priority() {
            &self.priority_list
        } else {
            &self.regular_list
        };
        let mut guard = list.lock();
        if message.is_in_queue() {
            return;
        }
        if to_end {
            guard.push_back(message.clone());
        } else {
            guard.push_front(message.clone());
        }
        message.set_in_queue(true);
    }

    /// Removes one message from the store. Without `force` only sent
    /// messages may be removed; without `silent` the policy is notified.
    pub async fn remove_message(
        &self,
        message: &Arc<QueueMessage>,
        force: bool,
        silent: bool,
    ) -> bool {
        if !force && !message.is_sent() {
            return false;
        }

        {
            let _sync = self.list_sync.lock();
            let list = if message.is_priority() {
                &self.priority_list
            } else {
                &self.regular_list
            };
            let mut guard = list.lock();
            if let Some(position) = guard.iter().position(|m| Arc::ptr_eq(m, message)) {
                guard.remove(position);
                message.set_in_queue(false);
            }
        }

        if !silent {
            self.stats.add_removed();
            self.handler.message_removed(self, message).await;
        }

        true
    }

    /// Moves a message between the priority and regular lists. The compound
    /// remove/insert runs under the store-wide lock so there is no window
    /// where the message is in both lists or in neither.
    pub async fn change_message_priority(
        &self,
        message: &Arc<QueueMessage>,
        high_priority: bool,
        to_end: bool,
    ) -> bool {
        if message.is_priority() == high_priority {
            return false;
        }

        let _sync = self.list_sync.lock();
        {
            let source = if message.is_priority() {
                &self.priority_list
            } else {
                &self.regular_list
            };
            let mut guard = source.lock();
            if let Some(position) = guard.iter().position(|m| Arc::ptr_eq(m, message)) {
                guard.remove(position);
            }
            message.set_in_queue(false);
        }

        message.set_priority(high_priority);

        {
            let target = if high_priority {
                &self.priority_list
            } else {
                &self.regular_list
            };
            let mut guard = target.lock();
            if to_end {
                guard.push_back(message.clone());
            } else {
                guard.push_front(message.clone());
            }
            message.set_in_queue(true);
        }

        true
    }

    /// Pulls queued messages past their deadline out of one list.
    pub(crate) fn take_expired_messages(&self, high: bool, now: Instant) -> Vec<Arc<QueueMessage>> {
        let list = if high {
            &self.priority_list
        } else {
            &self.regular_list
        };
        let mut guard = list.lock();
        let mut expired = Vec::new();
        guard.retain(|message| match message.deadline() {
            Some(deadline) if deadline <= now => {
                message.set_in_queue(false);
                expired.push(message.clone());
                false
            }
            _ => true,
        });
        expired
    }

    // ───────────────────────────────────────────────────────
    // Push / pull / drain
    // ───────────────────────────────────────────────────────

    /// Pushes a message into the queue on behalf of `sender`.
    pub async fn push(
        self: &Arc<Self>,
        message: Message,
        sender: Option<Arc<dyn Connection>>,
    ) -> PushResult {
        if self.is_destroyed() || self.status() == QueueStatus::Stopped {
            return PushResult::StatusNotSupported;
        }

        if self.options.message_limit > 0
            && self.priority_message_count() + self.regular_message_count()
                >= self.options.message_limit
        {
            return PushResult::LimitExceeded;
        }

        if self.options.message_size_limit > 0
            && message.payload.len() > self.options.message_size_limit
        {
            return PushResult::LimitExceeded;
        }

        let message = Arc::new(QueueMessage::new(message, sender.as_ref()));
        message.set_first_acquirer(true);
        message.set_pending_acknowledge(self.options.request_acknowledge);

        if self.options.use_message_id && message.id().is_none() {
            message.set_id(generate_id());
        }

        if let Some(timeout) = self.options.message_timeout {
            message.set_deadline(Instant::now() + timeout);
        }

        if self.options.hide_client_names {
            message.clear_source_name();
        }

        self.stats.add_received();
        let decision = match self
            .handler
            .received_from_producer(self, &message, sender.as_ref())
            .await
        {
            Ok(decision) => decision,
            Err(error) => {
                self.stats.add_error();
                self.recover_push_error(Some(message), error).await;
                return PushResult::Success;
            }
        };

        message.set_decision(decision);
        match self.apply_decision(decision, &message, None).await {
            Ok(true) => {}
            Ok(false) => return PushResult::Success,
            Err(error) => {
                self.stats.add_error();
                self.recover_push_error(Some(message), error).await;
                return PushResult::Success;
            }
        }

        let state = self.current_state();
        if state.can_enqueue(self, &message) {
            {
                let _sync = self.list_sync.lock();
                self.add_message(message.clone(), true);
            }
            if state.trigger_supported() && !self.triggering.load(Ordering::Acquire) {
                self.schedule_trigger();
            }
        } else {
            match state.push(self, message).await {
                Ok(result) => return result,
                Err(error) => {
                    self.stats.add_error();
                    let processing = state.processing_message();
                    self.recover_push_error(processing, error).await;
                }
            }
        }

        PushResult::Success
    }

    /// Serves an explicit request for the next message; only meaningful in
    /// the Pull and Cache statuses.
    pub async fn pull(
        self: &Arc<Self>,
        client: &Arc<dyn Connection>,
        request_id: Option<String>,
    ) -> PullResult {
        if self.is_destroyed() || self.status() == QueueStatus::Stopped {
            return PullResult::StatusNotSupported;
        }

        let state = self.current_state();
        match state.pull(self, client, request_id).await {
            Ok(result) => result,
            Err(error) => {
                self.stats.add_error();
                let processing = state.processing_message();
                self.recover_push_error(processing, error).await;
                PullResult::Success
            }
        }
    }

    /// Drains pending messages toward connected receivers.
    ///
    /// Single-flight per queue: concurrent calls (post-push, post-status
    /// change, fallback timer) collapse into one drain. The priority list is
    /// drained completely before the regular list; a pass stops early when
    /// the state reports that nothing productive can happen.
    pub async fn trigger(self: &Arc<Self>) {
        if self.triggering.load(Ordering::Acquire) {
            return;
        }

        let _drain = self.push_sync.lock().await;
        if self.triggering.load(Ordering::Acquire) || self.is_destroyed() {
            return;
        }
        if !self.current_state().trigger_supported() {
            return;
        }
        if self.client_count() == 0 {
            return;
        }

        self.triggering.store(true, Ordering::Release);

        if self.priority_message_count() > 0 {
            self.process_pending(true).await;
        }
        if self.regular_message_count() > 0 {
            self.process_pending(false).await;
        }

        self.triggering.store(false, Ordering::Release);
    }

    async fn process_pending(self: &Arc<Self>, high: bool) {
        loop {
            if self.is_destroyed() {
                return;
            }
            let state = self.current_state();
            if !state.trigger_supported() {
                return;
            }

            let message = {
                let list = if high {
                    &self.priority_list
                } else {
                    &self.regular_list
                };
                let mut guard = list.lock();
                let Some(message) = guard.pop_front() else {
                    return;
                };
                message.set_in_queue(false);
                message
            };

            self.handler.message_dequeued(self, &message).await;

            match state.push(self, message.clone()).await {
                Ok(PushResult::Empty) | Ok(PushResult::NoConsumers) => return,
                Ok(_) => {}
                Err(error) => {
                    self.stats.add_error();
                    self.recover_push_error(Some(message), error).await;
                }
            }
        }
    }

    fn schedule_trigger(self: &Arc<Self>) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            queue.trigger().await;
        });
    }

    fn run_fallback_trigger(queue: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(queue);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(FALLBACK_TRIGGER_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(queue) = weak.upgrade() else {
                    break;
                };
                if queue.is_destroyed() {
                    break;
                }
                if !queue.triggering.load(Ordering::Acquire)
                    && queue.current_state().trigger_supported()
                {
                    queue.trigger().await;
                }
            }
        })
    }

    // ───────────────────────────────────────────────────────
    // Status transitions
    // ───────────────────────────────────────────────────────

    /// Transitions the queue to a new status.
    ///
    /// Legality is negotiated entirely by the two states involved: the
    /// outgoing state may veto the leave, the incoming state may veto the
    /// enter (which rolls the swap back). A failed transition leaves the
    /// queue exactly as it was.
    pub async fn set_status(self: &Arc<Self>, status: QueueStatus) {
        let (prev_status, prev_state) = {
            let slot = self.state.read();
            (slot.status, slot.state.clone())
        };
        if prev_status == status {
            return;
        }

        match prev_state.leave_status(self, status).await {
            StatusAction::Deny => return,
            StatusAction::DenyAndTrigger => {
                self.trigger().await;
                return;
            }
            StatusAction::Allow | StatusAction::AllowAndTrigger => {}
        }

        let next_state = states::create(status);
        {
            let mut slot = self.state.write();
            slot.status = status;
            slot.state = next_state.clone();
        }

        let enter = next_state.enter_status(self, prev_status).await;
        if matches!(enter, StatusAction::Deny | StatusAction::DenyAndTrigger) {
            {
                let mut slot = self.state.write();
                slot.status = prev_status;
                slot.state = prev_state.clone();
            }
            prev_state.enter_status(self, prev_status).await;
            if enter == StatusAction::DenyAndTrigger {
                self.trigger().await;
            }
            return;
        }

        info!(
            target: "relaymq::queue",
            queue = %self.name,
            from = ?prev_status,
            to = ?status,
            "queue status changed"
        );

        if enter == StatusAction::AllowAndTrigger {
            self.schedule_trigger();
        }
    }

    /// Stops the queue (clearing it) and returns to the previous status.
    pub async fn restart(self: &Arc<Self>) {
        let previous = self.status();
        self.set_status(QueueStatus::Stopped).await;
        self.set_status(previous).await;
    }

    // ───────────────────────────────────────────────────────
    // Decisions
    // ───────────────────────────────────────────────────────

    /// Executes one decision: persists, acknowledges the producer, re-enqueues
    /// or reports removal. Returns whether the operation may continue.
    pub(crate) async fn apply_decision(
        &self,
        decision: Decision,
        message: &Arc<QueueMessage>,
        custom_ack: Option<Outbound>,
    ) -> Result<bool> {
        if decision.save_message {
            self.save_message(message).await?;
        }

        let ack_required = matches!(
            decision.acknowledge,
            AckDecision::Always | AckDecision::Negative
        ) || (decision.acknowledge == AckDecision::IfSaved && message.is_saved());

        if ack_required {
            let frame = custom_ack.unwrap_or(Outbound::Acknowledge {
                message_id: message.id(),
                negative: decision.acknowledge == AckDecision::Negative,
            });
            if let Some(source) = message.source() {
                if source.is_connected() {
                    let _ = source.send(frame).await;
                }
            }
        }

        match decision.put_back {
            PutBack::Start => self.add_message(message.clone(), false),
            PutBack::End => self.add_message(message.clone(), true),
            PutBack::No => {
                if !decision.allow {
                    self.stats.add_removed();
                    self.handler.message_removed(self, message).await;
                }
            }
        }

        Ok(decision.allow)
    }

    /// Persists the message through the policy, once.
    pub async fn save_message(&self, message: &Arc<QueueMessage>) -> Result<bool> {
        if message.is_saved() {
            return Ok(false);
        }

        let saved = self.handler.save_message(self, message).await?;
        if saved {
            message.set_saved(true);
            self.stats.add_saved();
        }
        Ok(saved)
    }

    /// Applies a decision computed by another node: the message is located by
    /// id across both lists, removed from the store and the decision executed
    /// without re-running the local pipeline.
    pub async fn apply_decision_over_node(
        &self,
        message_id: &str,
        decision: Decision,
    ) -> Result<()> {
        let message = {
            let _sync = self.list_sync.lock();
            let mut found = None;

            {
                let mut priority = self.priority_list.lock();
                if let Some(position) = priority
                    .iter()
                    .position(|m| m.id().as_deref() == Some(message_id))
                {
                    let message = priority.remove(position);
                    if let Some(message) = &message {
                        message.set_in_queue(false);
                    }
                    found = message;
                }
            }

            if found.is_none() {
                let mut regular = self.regular_list.lock();
                if let Some(position) = regular
                    .iter()
                    .position(|m| m.id().as_deref() == Some(message_id))
                {
                    found = regular.remove(position);
                    if let Some(message) = &found {
                        message.set_in_queue(false);
                    }
                }
            }

            found
        };

        let Some(message) = message else {
            return Ok(());
        };

        self.apply_decision(decision, &message, None).await?;
        Ok(())
    }

    /// Routes a policy fault through `error_raised` and applies whatever the
    /// recovery decision asks for. A fault inside recovery is swallowed so
    /// the drain loop cannot be wedged by a buggy policy.
    async fn recover_push_error(&self, message: Option<Arc<QueueMessage>>, error: anyhow::Error) {
        warn!(
            target: "relaymq::queue",
            queue = %self.name,
            %error,
            "delivery policy fault"
        );

        let Ok(decision) = self
            .handler
            .error_raised(self, message.as_ref(), &error)
            .await
        else {
            return;
        };

        let Some(message) = message else {
            return;
        };

        if self.apply_decision(decision, &message, None).await.is_err() {
            // Recovery side effects failed too; honor the put-back directly
            // so the message is not silently lost.
            match decision.put_back {
                PutBack::Start => self.add_message(message, false),
                PutBack::End => self.add_message(message, true),
                PutBack::No => {}
            }
        }
    }

    // ───────────────────────────────────────────────────────
    // Acknowledgments
    // ───────────────────────────────────────────────────────

    /// Handles a consumer acknowledgment for a delivered message.
    ///
    /// The matching delivery record can lag behind the acknowledgment when
    /// transport latency is near zero, so a failed lookup is retried briefly
    /// before the delivery is treated as unknown. The pipeline still runs in
    /// that case, with no delivery reference.
    pub async fn acknowledge_delivered(
        self: &Arc<Self>,
        from: &Arc<dyn Connection>,
        message_id: &str,
        success: bool,
    ) {
        let mut delivery = self
            .time_keeper
            .find_and_remove_delivery(from.id(), message_id);
        if delivery.is_none() {
            tokio::time::sleep(Duration::from_millis(1)).await;
            delivery = self
                .time_keeper
                .find_and_remove_delivery(from.id(), message_id);
            if delivery.is_none() {
                tokio::time::sleep(Duration::from_millis(3)).await;
                delivery = self
                    .time_keeper
                    .find_and_remove_delivery(from.id(), message_id);
            }
        }

        if let Some(delivery) = &delivery {
            delivery.mark_acknowledged(success);
        }

        if success {
            self.stats.add_acknowledged();
        } else {
            self.stats.add_negative_acknowledged();
        }

        match self
            .handler
            .acknowledge_received(self, message_id, delivery.as_ref(), success)
            .await
        {
            Ok(decision) => {
                if let Some(delivery) = &delivery {
                    let ack = Outbound::Acknowledge {
                        message_id: Some(message_id.to_string()),
                        negative: !success,
                    };
                    if let Err(error) = self
                        .apply_decision(decision, delivery.message(), Some(ack))
                        .await
                    {
                        self.stats.add_error();
                        self.recover_push_error(Some(delivery.message().clone()), error)
                            .await;
                    }
                }
            }
            Err(error) => {
                self.stats.add_error();
                self.recover_push_error(delivery.as_ref().map(|d| d.message().clone()), error)
                    .await;
            }
        }

        self.release_acknowledge_gate(true);
    }

    /// Blocks the current delivery until the previous acknowledgment cycle
    /// completes, when the queue is configured to serialize on acknowledges.
    pub(crate) async fn wait_for_acknowledge(&self, message: &Arc<QueueMessage>) {
        message.set_pending_acknowledge(true);
        self.ack_gate.wait().await;
    }

    pub(crate) fn arm_acknowledge_gate(&self) {
        self.ack_gate.arm();
    }

    pub(crate) fn release_acknowledge_gate(&self, received: bool) {
        trace!(
            target: "relaymq::queue",
            queue = %self.name,
            received,
            "releasing acknowledge gate"
        );
        self.ack_gate.release();
    }

    // ───────────────────────────────────────────────────────
    // Teardown
    // ───────────────────────────────────────────────────────

    /// Destroys the queue: stops background tasks, drains both lists, drops
    /// pending deliveries and force-releases the acknowledge gate.
    ///
    /// Idempotent and safe to call while pushes or drains are in flight;
    /// in-flight operations observe the destroyed flag and abort cleanly.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        self.time_keeper.reset();
        self.clear_all_messages();
        self.ack_gate.force_release();

        info!(target: "relaymq::queue", queue = %self.name, "queue destroyed");
    }
}

impl Drop for ChannelQueue {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}
