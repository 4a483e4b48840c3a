//! Live interface capture through libpcap.

use pcap::{Active, Capture};
use pcap_parser::Linktype;

use super::{CaptureMeta, CapturedFrame, FrameSource, SourceError};
use crate::config::CaptureConfig;

/// A libpcap handle opened on a network interface with its filter installed.
pub struct LiveCapture {
    cap: Capture<Active>,
    linktype: Linktype,
}

impl LiveCapture {
    /// Open `config.interface` and install `config.filter`.
    ///
    /// # Errors
    /// Fails with [`SourceError::Open`] when the interface cannot be opened
    /// and with [`SourceError::Filter`] when the expression does not compile
    /// or cannot be installed.
    pub fn open(config: &CaptureConfig) -> Result<Self, SourceError> {
        let open_err = |e: pcap::Error| SourceError::Open {
            interface: config.interface.clone(),
            message: e.to_string(),
        };
        let mut cap = Capture::from_device(config.interface.as_str())
            .map_err(open_err)?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(config.timeout_ms)
            .open()
            .map_err(open_err)?;

        cap.filter(&config.filter, true)
            .map_err(|e| SourceError::Filter {
                filter: config.filter.clone(),
                message: e.to_string(),
            })?;

        let linktype = Linktype(cap.get_datalink().0);
        tracing::info!(
            interface = %config.interface,
            filter = %config.filter,
            linktype = linktype.0,
            "capture filter installed"
        );
        Ok(Self { cap, linktype })
    }
}

impl FrameSource for LiveCapture {
    fn next_frame(&mut self) -> Result<Option<CapturedFrame<'_>>, SourceError> {
        match self.cap.next_packet() {
            Ok(packet) => {
                let header = packet.header;
                Ok(Some(CapturedFrame {
                    meta: CaptureMeta {
                        ts_sec: header.ts.tv_sec as i64,
                        ts_usec: header.ts.tv_usec as u32,
                        caplen: header.caplen,
                        orig_len: header.len,
                    },
                    linktype: self.linktype,
                    data: packet.data,
                }))
            }
            Err(pcap::Error::TimeoutExpired) => Err(SourceError::TimedOut),
            Err(pcap::Error::NoMorePackets) => Ok(None),
            Err(e) => Err(SourceError::Capture(e.to_string())),
        }
    }
}
