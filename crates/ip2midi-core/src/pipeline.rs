//! Per-frame pipeline: header parser, translator, output sink, forwarder.
//!
//! A [`FramePipeline`] is owned by the capture thread and processes one frame
//! at a time. It holds the only reusable event list and transmit buffer, so
//! frames are never processed concurrently.

use std::net::Ipv4Addr;

use serde::Serialize;

use crate::headers::parse_udp_datagram;
use crate::ipc::IpcForwarder;
use crate::sink::OutputPort;
use crate::source::CapturedFrame;
use crate::translate::{PayloadMode, Translator};

/// Which senders are translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressFilter {
    /// Every sender.
    #[default]
    None,
    /// Only frames whose IPv4 source equals the address.
    ExactMatch(Ipv4Addr),
}

impl AddressFilter {
    pub fn matches(&self, addr: Ipv4Addr) -> bool {
        match self {
            AddressFilter::None => true,
            AddressFilter::ExactMatch(expected) => *expected == addr,
        }
    }
}

/// What happened to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Not UDP over IPv4 over Ethernet.
    Ignored,
    /// Truncated or malformed headers.
    Malformed,
    /// Sender rejected by the address filter.
    FilteredOut,
    /// Zero or negative payload length.
    Empty,
    /// Events were handed to the output sink.
    Delivered { forwarded: bool },
}

/// Counters kept by the capture thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub frames_seen: u64,
    pub frames_matched: u64,
    pub frames_ignored: u64,
    pub frames_malformed: u64,
    pub frames_filtered: u64,
    pub frames_empty: u64,
    pub events_delivered: u64,
    pub messages_forwarded: u64,
}

impl CaptureStats {
    fn record(&mut self, outcome: FrameOutcome, sink_accepted: bool) {
        self.frames_seen += 1;
        match outcome {
            FrameOutcome::Ignored => self.frames_ignored += 1,
            FrameOutcome::Malformed => self.frames_malformed += 1,
            FrameOutcome::FilteredOut => self.frames_filtered += 1,
            FrameOutcome::Empty => self.frames_empty += 1,
            FrameOutcome::Delivered { forwarded } => {
                self.frames_matched += 1;
                if sink_accepted {
                    self.events_delivered += 1;
                }
                if forwarded {
                    self.messages_forwarded += 1;
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct FramePipeline {
    translator: Translator,
    filter: AddressFilter,
    output: OutputPort,
    forwarder: IpcForwarder,
    stats: CaptureStats,
}

impl FramePipeline {
    pub fn new(
        mode: PayloadMode,
        filter: AddressFilter,
        output: OutputPort,
        forwarder: IpcForwarder,
    ) -> Self {
        Self {
            translator: Translator::new(mode),
            filter,
            output,
            forwarder,
            stats: CaptureStats::default(),
        }
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// Run one frame through the pipeline. Never fails: every per-frame
    /// problem is reported as an outcome and otherwise dropped.
    pub fn process(&mut self, frame: &CapturedFrame<'_>) -> FrameOutcome {
        let (outcome, sink_accepted) = self.process_inner(frame);
        self.stats.record(outcome, sink_accepted);
        outcome
    }

    fn process_inner(&mut self, frame: &CapturedFrame<'_>) -> (FrameOutcome, bool) {
        let datagram = match parse_udp_datagram(frame.linktype, frame.data) {
            Ok(Some(datagram)) => datagram,
            Ok(None) => return (FrameOutcome::Ignored, false),
            Err(err) => {
                tracing::trace!(%err, caplen = frame.meta.caplen, "dropping malformed frame");
                return (FrameOutcome::Malformed, false);
            }
        };

        if !self.filter.matches(datagram.src_addr) {
            tracing::trace!(src = %datagram.src_addr, "sender filtered out");
            return (FrameOutcome::FilteredOut, false);
        }
        if datagram.payload_len <= 0 {
            tracing::trace!(len = datagram.payload_len, "empty payload");
            return (FrameOutcome::Empty, false);
        }

        let mode = self.translator.mode();
        let Some(translation) = self.translator.translate(datagram.payload) else {
            return (FrameOutcome::Empty, false);
        };
        if mode == PayloadMode::HexString {
            tracing::info!(src = %datagram.src_addr, "{}", translation.provenance);
        }

        let sink_accepted = self.output.deliver(translation.events);
        if sink_accepted {
            tracing::debug!(
                src = %datagram.src_addr,
                provenance = translation.provenance,
                "event delivered"
            );
        }
        let forwarded = self
            .forwarder
            .forward(&frame.meta, frame.data, translation.provenance);
        (FrameOutcome::Delivered { forwarded }, sink_accepted)
    }
}
