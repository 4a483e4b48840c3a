use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use pcap_parser::Linktype;

use super::{CaptureMeta, CapturedFrame, FrameSource, SourceError};

/// In-memory frame source.
///
/// Frames are yielded in insertion order. With [`MemorySource::hold_open`]
/// the source behaves like an idle interface once drained: every poll waits
/// one tick and reports [`SourceError::TimedOut`] instead of ending.
#[derive(Debug, Default)]
pub struct MemorySource {
    pending: VecDeque<(CaptureMeta, Linktype, Vec<u8>)>,
    current: Vec<u8>,
    idle_tick: Option<Duration>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an Ethernet frame captured in full.
    pub fn push_ethernet(&mut self, ts_sec: i64, data: Vec<u8>) {
        let meta = CaptureMeta::full(ts_sec, 0, data.len());
        self.pending.push_back((meta, Linktype::ETHERNET, data));
    }

    pub fn push_frame(&mut self, meta: CaptureMeta, linktype: Linktype, data: Vec<u8>) {
        self.pending.push_back((meta, linktype, data));
    }

    pub fn hold_open(mut self, tick: Duration) -> Self {
        self.idle_tick = Some(tick);
        self
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<CapturedFrame<'_>>, SourceError> {
        match self.pending.pop_front() {
            Some((meta, linktype, data)) => {
                self.current = data;
                Ok(Some(CapturedFrame {
                    meta,
                    linktype,
                    data: &self.current,
                }))
            }
            None => match self.idle_tick {
                Some(tick) => {
                    thread::sleep(tick);
                    Err(SourceError::TimedOut)
                }
                None => Ok(None),
            },
        }
    }
}
