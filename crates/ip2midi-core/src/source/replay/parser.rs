use std::fs::File;
use std::path::Path;

use pcap_parser::{
    Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapNGReader, traits::PcapReaderIterator,
};

use crate::source::{CaptureMeta, CapturedFrame, FrameSource, SourceError};

use super::error::ReplayError;
use super::layout;
use super::reader::{
    is_pcapng_magic, linktype_for_interface, pcapng_ts_to_timeval, read_magic_and_rewind,
};

/// Replays frames from a `.pcap` or `.pcapng` file.
pub struct PcapFileSource {
    inner: PcapReader,
    frame: Vec<u8>,
}

enum PcapReader {
    Legacy {
        reader: LegacyPcapReader<File>,
        linktype: Option<Linktype>,
    },
    Ng {
        reader: PcapNGReader<File>,
        linktypes: Vec<Linktype>,
    },
}

impl PcapFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(SourceError::from)?;
        let inner = create_reader(file).map_err(SourceError::from)?;
        Ok(Self {
            inner,
            frame: Vec::with_capacity(layout::FRAME_BUFFER_CAPACITY),
        })
    }
}

impl FrameSource for PcapFileSource {
    fn next_frame(&mut self) -> Result<Option<CapturedFrame<'_>>, SourceError> {
        let Self { inner, frame } = self;
        match next_block(inner, frame)? {
            Some((meta, linktype)) => Ok(Some(CapturedFrame {
                meta,
                linktype,
                data: frame.as_slice(),
            })),
            None => Ok(None),
        }
    }
}

fn create_reader(file: File) -> Result<PcapReader, ReplayError> {
    let mut file = file;
    let magic = read_magic_and_rewind(&mut file)?;

    if is_pcapng_magic(&magic) {
        let reader = PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            ReplayError::Pcap {
                context: "pcapng reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Ng {
            reader,
            linktypes: Vec::new(),
        })
    } else {
        let reader = LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            ReplayError::Pcap {
                context: "pcap reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Legacy {
            reader,
            linktype: None,
        })
    }
}

/// Advance to the next packet block, copying its bytes into `frame`.
fn next_block(
    reader: &mut PcapReader,
    frame: &mut Vec<u8>,
) -> Result<Option<(CaptureMeta, Linktype)>, ReplayError> {
    loop {
        match reader {
            PcapReader::Legacy { reader, linktype } => match reader.next() {
                Ok((offset, block)) => {
                    let header = match block {
                        PcapBlockOwned::LegacyHeader(header) => {
                            *linktype = Some(header.network);
                            None
                        }
                        PcapBlockOwned::Legacy(packet) => {
                            frame.clear();
                            frame.extend_from_slice(packet.data);
                            let meta = CaptureMeta {
                                ts_sec: i64::from(packet.ts_sec),
                                ts_usec: packet.ts_usec,
                                caplen: frame.len() as u32,
                                orig_len: packet.origlen,
                            };
                            Some((meta, linktype.unwrap_or(Linktype::ETHERNET)))
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if header.is_some() {
                        return Ok(header);
                    }
                }
                Err(pcap_parser::PcapError::Eof) => return Ok(None),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| ReplayError::Pcap {
                        context: "pcap reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(ReplayError::Pcap {
                        context: "pcap reader next",
                        message: e.to_string(),
                    });
                }
            },
            PcapReader::Ng { reader, linktypes } => match reader.next() {
                Ok((offset, block)) => {
                    let header = match block {
                        PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                            linktypes.push(intf.linktype);
                            None
                        }
                        PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => {
                            // EPB data is padded to 32 bits; only caplen bytes belong to the frame.
                            let caplen = (packet.caplen as usize).min(packet.data.len());
                            frame.clear();
                            frame.extend_from_slice(&packet.data[..caplen]);
                            let (ts_sec, ts_usec) =
                                pcapng_ts_to_timeval(packet.ts_high, packet.ts_low);
                            let meta = CaptureMeta {
                                ts_sec,
                                ts_usec,
                                caplen: caplen as u32,
                                orig_len: packet.origlen,
                            };
                            Some((meta, linktype_for_interface(linktypes, packet.if_id)))
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if header.is_some() {
                        return Ok(header);
                    }
                }
                Err(pcap_parser::PcapError::Eof) => return Ok(None),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| ReplayError::Pcap {
                        context: "pcapng reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(ReplayError::Pcap {
                        context: "pcapng reader next",
                        message: e.to_string(),
                    });
                }
            },
        }
    }
}
