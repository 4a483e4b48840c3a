//! Frame sources feeding the capture loop.
//!
//! A source hands out one borrowed [`CapturedFrame`] at a time. The borrow
//! ends before the next frame is requested, so a frame can never be held
//! past the pipeline invocation that processes it.

mod memory;
mod replay;

#[cfg(feature = "live-capture")]
mod live;

#[cfg(feature = "live-capture")]
pub use live::LiveCapture;
pub use memory::MemorySource;
pub use replay::PcapFileSource;

use pcap_parser::Linktype;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::config::CaptureConfig;

/// Capture metadata delivered alongside every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureMeta {
    /// Capture timestamp, whole seconds since the Unix epoch.
    pub ts_sec: i64,
    /// Sub-second part of the capture timestamp, in microseconds.
    pub ts_usec: u32,
    /// Number of bytes actually captured.
    pub caplen: u32,
    /// Length of the frame on the wire.
    pub orig_len: u32,
}

impl CaptureMeta {
    /// Metadata for a frame captured in full.
    pub fn full(ts_sec: i64, ts_usec: u32, len: usize) -> Self {
        let len = u32::try_from(len).unwrap_or(u32::MAX);
        Self {
            ts_sec,
            ts_usec,
            caplen: len,
            orig_len: len,
        }
    }

    /// RFC3339 rendering of the capture timestamp, if representable.
    pub fn timestamp_rfc3339(&self) -> Option<String> {
        let nanos = i128::from(self.ts_sec) * 1_000_000_000 + i128::from(self.ts_usec) * 1_000;
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .ok()
            .and_then(|dt| dt.format(&Rfc3339).ok())
    }
}

/// One frame as delivered by the capture facility.
#[derive(Debug, Clone, Copy)]
pub struct CapturedFrame<'a> {
    pub meta: CaptureMeta,
    pub linktype: Linktype,
    pub data: &'a [u8],
}

/// A producer of captured frames.
///
/// `Ok(None)` means the source is exhausted. [`SourceError::TimedOut`] is
/// transient: the caller is expected to poll again.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<CapturedFrame<'_>>, SourceError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<CapturedFrame<'_>>, SourceError> {
        (**self).next_frame()
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCAP parse error: {0}")]
    Pcap(String),
    #[error("failed to open capture on interface '{interface}': {message}")]
    Open { interface: String, message: String },
    #[error("failed to install capture filter '{filter}': {message}")]
    Filter { filter: String, message: String },
    #[error("live capture support is not compiled in (enable the `live-capture` feature)")]
    LiveCaptureUnavailable,
    #[error("capture read timed out")]
    TimedOut,
    #[error("capture handle failed: {0}")]
    Capture(String),
}

impl SourceError {
    /// Whether the error only signals an idle read period.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::TimedOut)
    }
}

impl From<replay::error::ReplayError> for SourceError {
    fn from(value: replay::error::ReplayError) -> Self {
        match value {
            replay::error::ReplayError::Io(err) => SourceError::Io(err),
            replay::error::ReplayError::Pcap { context, message } => {
                SourceError::Pcap(format!("{context}: {message}"))
            }
        }
    }
}

/// Open the source described by `config`: a replay file when one is set,
/// otherwise a live capture on the configured interface.
pub fn open_source(config: &CaptureConfig) -> Result<Box<dyn FrameSource + Send>, SourceError> {
    if let Some(path) = config.replay.as_deref() {
        tracing::info!(path = %path.display(), "replaying capture file");
        return Ok(Box::new(PcapFileSource::open(path)?));
    }
    open_live(config)
}

#[cfg(feature = "live-capture")]
fn open_live(config: &CaptureConfig) -> Result<Box<dyn FrameSource + Send>, SourceError> {
    Ok(Box::new(LiveCapture::open(config)?))
}

#[cfg(not(feature = "live-capture"))]
fn open_live(_config: &CaptureConfig) -> Result<Box<dyn FrameSource + Send>, SourceError> {
    Err(SourceError::LiveCaptureUnavailable)
}
