//! Blocking shutdown signal shared by the control thread and its wakers.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Why the control thread was woken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShutdownReason {
    /// The process received an interrupt (SIGINT).
    Interrupted,
    /// The parent closed its end of the channel.
    ChannelClosed,
    /// The frame source was exhausted.
    CaptureEnded,
    /// The frame source failed.
    CaptureFailed,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownReason::Interrupted => "interrupted",
            ShutdownReason::ChannelClosed => "channel closed",
            ShutdownReason::CaptureEnded => "capture ended",
            ShutdownReason::CaptureFailed => "capture failed",
        })
    }
}

/// One-shot wake-up for the control thread.
///
/// The first trigger wins; later triggers are ignored so the recorded
/// reason is the one that actually ended the run.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    reason: Mutex<Option<ShutdownReason>>,
    cond: Condvar,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self, reason: ShutdownReason) {
        let mut guard = self.lock();
        if guard.is_none() {
            *guard = Some(reason);
            self.cond.notify_all();
        }
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.lock()
    }

    /// Block until triggered.
    pub fn wait(&self) -> ShutdownReason {
        let mut guard = self.lock();
        loop {
            if let Some(reason) = *guard {
                return reason;
            }
            guard = self
                .cond
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until triggered or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ShutdownReason> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock();
        loop {
            if let Some(reason) = *guard {
                return Some(reason);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            guard = self
                .cond
                .wait_timeout(guard, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Route SIGINT to this signal. Only one handler may be installed per
    /// process.
    pub fn install_interrupt_handler(self: &Arc<Self>) -> Result<(), ctrlc::Error> {
        let signal = Arc::clone(self);
        ctrlc::set_handler(move || {
            tracing::info!("interrupt received");
            signal.trigger(ShutdownReason::Interrupted);
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<ShutdownReason>> {
        self.reason.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
