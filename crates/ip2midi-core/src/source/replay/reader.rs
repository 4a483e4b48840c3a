use std::io::{Read, Seek, SeekFrom};

use super::error::ReplayError;
use super::layout;
use pcap_parser::Linktype;

/// Read the magic bytes and rewind the reader to the start.
///
/// # Errors
/// Returns `ReplayError` when the reader cannot be read or rewound.
pub fn read_magic_and_rewind<R: Read + Seek>(reader: &mut R) -> Result<[u8; 4], ReplayError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(magic)
}

pub fn is_pcapng_magic(magic: &[u8; 4]) -> bool {
    magic == &layout::PCAPNG_MAGIC
}

/// Resolve the linktype for a given interface id, defaulting to Ethernet.
pub fn linktype_for_interface(linktypes: &[Linktype], if_id: u32) -> Linktype {
    linktypes
        .get(if_id as usize)
        .copied()
        .unwrap_or(Linktype::ETHERNET)
}

/// Split a PCAPNG high/low microsecond timestamp into seconds and
/// microseconds.
///
/// ```text
/// let (sec, usec) = pcapng_ts_to_timeval(0, 1_500_000);
/// assert_eq!((sec, usec), (1, 500_000));
/// ```
pub fn pcapng_ts_to_timeval(ts_high: u32, ts_low: u32) -> (i64, u32) {
    let ts = (u64::from(ts_high) << 32) | u64::from(ts_low);
    let sec = i64::try_from(ts / 1_000_000).unwrap_or(i64::MAX);
    (sec, (ts % 1_000_000) as u32)
}
