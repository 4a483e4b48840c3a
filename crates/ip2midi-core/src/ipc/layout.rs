//! Byte layout of the forwarded message and the channel envelope.

use std::ops::Range;

/// Size of the capture-metadata record at the start of every message.
pub const META_LEN: usize = 20;
pub const TS_SEC_RANGE: Range<usize> = 0..8;
pub const TS_USEC_RANGE: Range<usize> = 8..12;
pub const CAPLEN_RANGE: Range<usize> = 12..16;
pub const ORIG_LEN_RANGE: Range<usize> = 16..20;

pub const PROVENANCE_TERMINATOR: u8 = 0;

pub const ENVELOPE_MAGIC: &[u8; 4] = b"IP2M";
pub const ENVELOPE_LEN: usize = 12;
pub const MAGIC_RANGE: Range<usize> = 0..4;
pub const MESSAGE_ID_RANGE: Range<usize> = 4..8;
pub const BODY_LEN_RANGE: Range<usize> = 8..12;

/// Largest body a receiver accepts.
pub const MAX_BODY_LEN: usize = 16 * 1024 * 1024;
