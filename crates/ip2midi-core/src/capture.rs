//! Capture loop running on its own thread.
//!
//! State machine: `FilteringInstalled -> Running -> Stopped`. The idle phase
//! ends inside `open_source`, which opens the source and installs its filter
//! before [`spawn`] is called, so a handle always starts in
//! `FilteringInstalled`. The loop checks a
//! cancellation flag before every poll; sources with a read timeout make
//! that check happen at least once per timeout period.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;

use crate::pipeline::{CaptureStats, FramePipeline};
use crate::shutdown::{ShutdownReason, ShutdownSignal};
use crate::source::FrameSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum CaptureState {
    FilteringInstalled = 1,
    Running = 2,
    Stopped = 3,
}

impl CaptureState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CaptureState::FilteringInstalled,
            2 => CaptureState::Running,
            _ => CaptureState::Stopped,
        }
    }
}

/// How the loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "message")]
pub enum CaptureExit {
    Cancelled,
    Exhausted,
    Failed(String),
}

impl CaptureExit {
    /// Wake `signal` if the loop ended on its own. `wake_on_exhausted`
    /// is false when something else (the parent channel) decides when to
    /// stop.
    pub fn notify(&self, signal: &ShutdownSignal, wake_on_exhausted: bool) {
        match self {
            CaptureExit::Exhausted if wake_on_exhausted => {
                signal.trigger(ShutdownReason::CaptureEnded)
            }
            CaptureExit::Failed(_) => signal.trigger(ShutdownReason::CaptureFailed),
            CaptureExit::Exhausted | CaptureExit::Cancelled => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureReport {
    pub exit: CaptureExit,
    pub stats: CaptureStats,
}

/// Control-side handle to a running capture thread.
#[derive(Debug)]
pub struct CaptureHandle {
    cancel: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    report: mpsc::Receiver<CaptureReport>,
    thread: Option<JoinHandle<()>>,
}

/// Start the capture loop on a dedicated thread.
///
/// `on_exit` runs on the capture thread once the loop has ended, before the
/// report is handed to [`CaptureHandle::stop`].
pub fn spawn<S, F>(source: S, pipeline: FramePipeline, on_exit: F) -> io::Result<CaptureHandle>
where
    S: FrameSource + Send + 'static,
    F: FnOnce(&CaptureExit) + Send + 'static,
{
    let cancel = Arc::new(AtomicBool::new(false));
    let state = Arc::new(AtomicU8::new(CaptureState::FilteringInstalled as u8));
    let (tx, rx) = mpsc::channel();

    let thread = thread::Builder::new().name("capture".to_string()).spawn({
        let cancel = Arc::clone(&cancel);
        let state = Arc::clone(&state);
        move || {
            let mut source = source;
            let mut pipeline = pipeline;
            state.store(CaptureState::Running as u8, Ordering::Release);
            tracing::info!("capture running");

            let exit = run_loop(&mut source, &mut pipeline, &cancel);

            state.store(CaptureState::Stopped as u8, Ordering::Release);
            let stats = pipeline.stats();
            tracing::info!(?exit, frames = stats.frames_seen, "capture stopped");
            on_exit(&exit);
            let _ = tx.send(CaptureReport { exit, stats });
        }
    })?;

    Ok(CaptureHandle {
        cancel,
        state,
        report: rx,
        thread: Some(thread),
    })
}

fn run_loop<S: FrameSource>(
    source: &mut S,
    pipeline: &mut FramePipeline,
    cancel: &AtomicBool,
) -> CaptureExit {
    loop {
        if cancel.load(Ordering::Acquire) {
            return CaptureExit::Cancelled;
        }
        match source.next_frame() {
            Ok(Some(frame)) => {
                pipeline.process(&frame);
            }
            Ok(None) => return CaptureExit::Exhausted,
            Err(err) if err.is_transient() => {}
            Err(err) => {
                tracing::error!(%err, "capture source failed");
                return CaptureExit::Failed(err.to_string());
            }
        }
    }
}

impl CaptureHandle {
    pub fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Request cancellation without waiting.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Cancel and wait up to `timeout` for the loop to finish.
    ///
    /// Returns `None` if the thread did not finish in time; it is then left
    /// detached and any resource it still uses must tolerate being closed.
    pub fn stop(mut self, timeout: Duration) -> Option<CaptureReport> {
        self.cancel();
        match self.report.recv_timeout(timeout) {
            Ok(report) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                Some(report)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.take() {
                    if thread.join().is_err() {
                        tracing::error!("capture thread panicked");
                    }
                }
                None
            }
        }
    }
}
