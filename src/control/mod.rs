//! Control Plane (§4.8): per-execution pause gate, resume signal, and
//! cancellation token.
//!
//! The teacher has no pause/cancel concept anywhere in its codebase, so this
//! module has no direct teacher grounding. It is grounded instead on
//! `other_examples/8ba7febb_mondalsuman-boternity__crates-boternity-core-src-workflow-executor.rs.rs`,
//! which keeps a per-run `tokio_util::sync::CancellationToken` and checks it
//! at wave boundaries — the same shape this module generalizes into a
//! reusable, cloneable control block.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Owned jointly per §3: external callers write `paused`/fire the cancel
/// token; the driver reads them at well-defined checkpoints. Cloning shares
/// the same underlying flags (all fields are `Arc`-backed or themselves
/// cheaply cloneable).
#[derive(Clone)]
pub struct ControlPlane {
    paused: Arc<AtomicBool>,
    resume_signal: Arc<Notify>,
    cancel_token: CancellationToken,
}

impl ControlPlane {
    pub fn new() -> Self {
        Self {
            paused: Arc::new(AtomicBool::new(false)),
            resume_signal: Arc::new(Notify::new()),
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// `pauseExecution`'s effect on the control block (legality against
    /// execution status is the Engine Façade's concern, §4.8).
    pub fn request_pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// `resumeExecution`'s effect: clear the flag and wake the driver.
    pub fn request_resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.resume_signal.notify_one();
    }

    /// `cancelExecution`'s effect: if paused, first clear pause and wake the
    /// driver so it can observe cancellation promptly, then fire the token
    /// (§4.8: "if paused, first clear paused and signal resume ... then fire
    /// the cancelToken").
    pub fn request_cancel(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            self.resume_signal.notify_one();
        }
        self.cancel_token.cancel();
    }

    /// Blocks the driver while `paused` is set, waking on resume or cancel.
    /// A no-op if not currently paused.
    pub async fn wait_while_paused(&self) {
        if !self.is_paused() {
            return;
        }
        tokio::select! {
            _ = self.resume_signal.notified() => {}
            _ = self.cancel_token.cancelled() => {}
        }
    }
}

impl Default for ControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_while_paused_returns_immediately_when_not_paused() {
        let control = ControlPlane::new();
        tokio::time::timeout(Duration::from_millis(50), control.wait_while_paused())
            .await
            .expect("should not block");
    }

    #[tokio::test]
    async fn resume_wakes_a_paused_waiter() {
        let control = ControlPlane::new();
        control.request_pause();
        let waiter = control.clone();
        let handle = tokio::spawn(async move {
            waiter.wait_while_paused().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        control.request_resume();
        tokio::time::timeout(Duration::from_millis(200), handle)
            .await
            .expect("resume should unblock the waiter")
            .unwrap();
        assert!(!control.is_paused());
    }

    #[tokio::test]
    async fn cancel_while_paused_clears_pause_and_wakes_waiter() {
        let control = ControlPlane::new();
        control.request_pause();
        let waiter = control.clone();
        let handle = tokio::spawn(async move {
            waiter.wait_while_paused().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        control.request_cancel();
        tokio::time::timeout(Duration::from_millis(200), handle)
            .await
            .expect("cancel should unblock a paused waiter")
            .unwrap();
        assert!(!control.is_paused());
        assert!(control.is_cancelled());
    }

    #[test]
    fn cancellation_is_one_way() {
        let control = ControlPlane::new();
        control.request_cancel();
        assert!(control.is_cancelled());
        // Pausing or resuming after cancellation does not un-cancel.
        control.request_pause();
        control.request_resume();
        assert!(control.is_cancelled());
    }
}
