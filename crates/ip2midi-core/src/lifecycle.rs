//! Lifecycle controller: setup, run-mode wait, ordered teardown.
//!
//! Startup: connect the channel (attached mode), create the output endpoint,
//! open the frame source, spawn the capture thread. The control thread then
//! blocks on a [`ShutdownSignal`] woken by the parent closing the channel
//! (attached), SIGINT (standalone), or the capture loop ending.
//!
//! Teardown always runs in the same order: cancel capture, join with a
//! bounded wait, invalidate the channel, dispose the output endpoint.

use std::io;
use std::sync::Arc;
use std::thread;

use serde::Serialize;
use thiserror::Error;

use crate::capture::{self, CaptureExit, CaptureReport};
use crate::config::{Config, ConfigError};
use crate::ipc::{Channel, IpcError, IpcForwarder};
use crate::pipeline::FramePipeline;
use crate::shutdown::{ShutdownReason, ShutdownSignal};
use crate::sink::{EventSink, OutputPort, SinkError, open_sink};
use crate::source::{FrameSource, SourceError, open_source};

/// Failures that prevent capture from starting.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("channel setup failed: {0}")]
    Channel(#[from] IpcError),
    #[error("output setup failed: {0}")]
    Output(#[from] SinkError),
    #[error("capture setup failed: {0}")]
    Source(#[from] SourceError),
    #[error("failed to install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error("failed to start capture thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Where the helper reports to and what ends the run.
#[derive(Debug, Clone)]
pub enum RunMode {
    /// Forward frames to the parent; stop when it closes the channel.
    Attached(Arc<Channel>),
    /// No parent; stop on SIGINT or when the source ends.
    Standalone,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Attached(_) => "attached",
            RunMode::Standalone => "standalone",
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: &'static str,
    pub reason: ShutdownReason,
    /// `None` when the capture thread missed the join deadline.
    pub capture: Option<CaptureReport>,
}

impl RunSummary {
    /// True unless the capture source failed after startup.
    pub fn is_clean(&self) -> bool {
        self.reason != ShutdownReason::CaptureFailed
    }
}

#[derive(Debug)]
pub struct Controller {
    config: Config,
    signal: Arc<ShutdownSignal>,
    handle_interrupts: bool,
}

impl Controller {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            signal: Arc::new(ShutdownSignal::new()),
            handle_interrupts: true,
        }
    }

    /// Skip installing the process-wide SIGINT handler. The shutdown signal
    /// can still be triggered through [`Controller::shutdown_signal`].
    pub fn without_interrupt_handler(mut self) -> Self {
        self.handle_interrupts = false;
        self
    }

    pub fn shutdown_signal(&self) -> Arc<ShutdownSignal> {
        Arc::clone(&self.signal)
    }

    /// Set up from configuration and run until shutdown. A channel name
    /// selects attached mode.
    pub fn run(self, channel_name: Option<&str>) -> Result<RunSummary, SetupError> {
        self.config.validate()?;
        let mode = match channel_name {
            Some(name) => {
                let channel = Channel::connect(name)?;
                channel.set_send_timeout(self.config.send_timeout())?;
                RunMode::Attached(Arc::new(channel))
            }
            None => RunMode::Standalone,
        };
        let sink = open_sink(&self.config.output)?;
        let source = open_source(&self.config.capture)?;
        self.run_with(mode, source, sink)
    }

    /// Run with an already opened source and sink.
    pub fn run_with<S>(
        self,
        mode: RunMode,
        source: S,
        sink: Box<dyn EventSink + Send>,
    ) -> Result<RunSummary, SetupError>
    where
        S: FrameSource + Send + 'static,
    {
        let output = OutputPort::new(sink);
        let (forwarder, channel) = match &mode {
            RunMode::Attached(channel) => (
                IpcForwarder::attached(Arc::clone(channel)),
                Some(Arc::clone(channel)),
            ),
            RunMode::Standalone => (IpcForwarder::detached(), None),
        };

        if channel.is_none() && self.handle_interrupts {
            self.signal.install_interrupt_handler()?;
        }

        let pipeline = FramePipeline::new(
            self.config.translate.payload_mode,
            self.config.translate.address_filter(),
            output.clone(),
            forwarder,
        );

        let wake_on_exhausted = channel.is_none();
        let waker = Arc::clone(&self.signal);
        let handle = capture::spawn(source, pipeline, move |exit: &CaptureExit| {
            exit.notify(&waker, wake_on_exhausted)
        })
        .map_err(SetupError::Spawn)?;

        if let Some(channel) = &channel {
            watch_channel(Arc::clone(channel), Arc::clone(&self.signal))
                .map_err(SetupError::Spawn)?;
        }

        tracing::info!(
            mode = mode.as_str(),
            payload_mode = %self.config.translate.payload_mode,
            "helper running"
        );
        let reason = self.signal.wait();
        tracing::info!(%reason, "shutting down");

        let timeout = self.config.shutdown_timeout();
        let report = handle.stop(timeout);
        if report.is_none() {
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                "capture thread did not stop in time; proceeding with teardown"
            );
        }
        if let Some(channel) = &channel {
            channel.invalidate();
        }
        output.dispose();

        if let Some(report) = &report {
            let stats = &report.stats;
            tracing::info!(
                frames_seen = stats.frames_seen,
                frames_matched = stats.frames_matched,
                events_delivered = stats.events_delivered,
                messages_forwarded = stats.messages_forwarded,
                "capture stats"
            );
        }

        Ok(RunSummary {
            mode: mode.as_str(),
            reason,
            capture: report,
        })
    }
}

/// Wake `signal` when the parent closes the channel. The watcher thread is
/// detached; it also returns once the channel is invalidated locally.
fn watch_channel(channel: Arc<Channel>, signal: Arc<ShutdownSignal>) -> io::Result<()> {
    thread::Builder::new()
        .name("channel-watch".to_string())
        .spawn(move || {
            channel.wait_for_invalidation();
            signal.trigger(ShutdownReason::ChannelClosed);
        })?;
    Ok(())
}
