//! Single-slot gate serializing deliveries on acknowledgments.
//!
//! When `wait_for_acknowledge` is configured, the next delivery must not
//! start until the previous one was acknowledged (positively or negatively)
//! or timed out. The gate is armed at the point a message requiring an
//! acknowledgment is sent; later send attempts block on the armed signal;
//! each release lets exactly one waiter through. Destroying the queue forces
//! the gate open so no waiter can be stranded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Default)]
struct AckSignal {
    notify: Notify,
    done: AtomicBool,
}

pub(crate) struct AckGate {
    /// Serializes waiters so one release frees exactly one of them.
    serial: tokio::sync::Mutex<()>,
    /// The armed completion signal, if a delivery is awaiting acknowledgment.
    pending: Mutex<Option<Arc<AckSignal>>>,
    destroyed: AtomicBool,
}

impl AckGate {
    pub(crate) fn new() -> Self {
        Self {
            serial: tokio::sync::Mutex::new(()),
            pending: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Arms the gate for the delivery that was just sent. No-op if a signal
    /// is already armed or the gate was torn down.
    pub(crate) fn arm(&self) {
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }
        let mut pending = self.pending.lock();
        if pending.is_none() {
            *pending = Some(Arc::new(AckSignal::default()));
        }
    }

    /// Blocks until the armed signal completes. Returns immediately when the
    /// gate is idle or torn down.
    pub(crate) async fn wait(&self) {
        let _serial = self.serial.lock().await;

        let signal = { self.pending.lock().clone() };
        let Some(signal) = signal else {
            return;
        };

        // Register interest before the completed check, otherwise a release
        // racing between the check and the await would be lost.
        let notified = signal.notify.notified();
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }
        if !signal.done.load(Ordering::Acquire) {
            notified.await;
        }

        // The released waiter re-arms the slot before giving up its place in
        // line, so each release lets exactly one waiter through.
        if !self.destroyed.load(Ordering::Acquire) {
            let mut pending = self.pending.lock();
            if pending.is_none() {
                *pending = Some(Arc::new(AckSignal::default()));
            }
        }
    }

    /// Completes the armed signal, releasing the waiter at the head of the
    /// line and resetting the gate for the next cycle.
    pub(crate) fn release(&self) {
        if let Some(signal) = self.pending.lock().take() {
            signal.done.store(true, Ordering::Release);
            signal.notify.notify_waiters();
        }
    }

    /// Tears the gate down; current and future waiters pass straight through.
    pub(crate) fn force_release(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn idle_gate_does_not_block() {
        let gate = AckGate::new();
        timeout(Duration::from_millis(50), gate.wait())
            .await
            .expect("idle gate must pass through");
    }

    #[tokio::test]
    async fn armed_gate_blocks_until_release() {
        let gate = Arc::new(AckGate::new());
        gate.arm();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "waiter must block on armed gate");

        gate.release();
        timeout(Duration::from_millis(100), waiter)
            .await
            .expect("released waiter must finish")
            .unwrap();
    }

    #[tokio::test]
    async fn release_before_wait_is_not_lost() {
        let gate = AckGate::new();
        gate.arm();
        gate.release();
        timeout(Duration::from_millis(50), gate.wait())
            .await
            .expect("completed signal must pass waiters through");
    }

    #[tokio::test]
    async fn force_release_frees_blocked_waiter() {
        let gate = Arc::new(AckGate::new());
        gate.arm();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.force_release();

        timeout(Duration::from_millis(100), waiter)
            .await
            .expect("destroyed gate must not strand waiters")
            .unwrap();

        // And the gate stays open afterwards.
        gate.arm();
        timeout(Duration::from_millis(50), gate.wait())
            .await
            .expect("torn-down gate must stay open");
    }
}
