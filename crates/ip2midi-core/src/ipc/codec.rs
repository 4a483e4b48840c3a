use std::ops::Range;

use super::error::IpcError;
use super::layout;
use crate::source::CaptureMeta;

/// A decoded forwarded message, borrowing the received body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardedMessage<'a> {
    pub meta: CaptureMeta,
    pub frame: &'a [u8],
    pub provenance: &'a str,
}

impl<'a> ForwardedMessage<'a> {
    /// Slice a message body into metadata, frame bytes and provenance.
    ///
    /// The frame length comes from the metadata record; the provenance runs
    /// up to the first NUL after the frame.
    pub fn decode(body: &'a [u8]) -> Result<Self, IpcError> {
        let reader = BodyReader::new(body);
        let meta = decode_meta(reader.read_slice(0..layout::META_LEN)?)?;
        let frame_end = layout::META_LEN + meta.caplen as usize;
        let frame = reader.read_slice(layout::META_LEN..frame_end)?;
        let tail = reader.read_slice(frame_end..body.len())?;
        let nul = tail
            .iter()
            .position(|&b| b == layout::PROVENANCE_TERMINATOR)
            .ok_or(IpcError::MissingTerminator)?;
        let provenance = std::str::from_utf8(&tail[..nul])?;
        Ok(Self {
            meta,
            frame,
            provenance,
        })
    }
}

/// Reusable encoder for forwarded messages.
///
/// Each call overwrites the previous message. The buffer grows to the
/// largest message seen and is never shrunk.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    buf: Vec<u8>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode one message and return its bytes.
    ///
    /// `caplen` is taken from `frame.len()` so the receiver's slicing always
    /// matches the bytes written. An embedded NUL ends the provenance string.
    pub fn encode(&mut self, meta: &CaptureMeta, frame: &[u8], provenance: &str) -> &[u8] {
        let meta = CaptureMeta {
            caplen: u32::try_from(frame.len()).unwrap_or(u32::MAX),
            ..*meta
        };
        let provenance = provenance.as_bytes();
        let provenance = provenance
            .iter()
            .position(|&b| b == layout::PROVENANCE_TERMINATOR)
            .map_or(provenance, |nul| &provenance[..nul]);

        self.buf.clear();
        self.buf.extend_from_slice(&encode_meta(&meta));
        self.buf.extend_from_slice(&frame[..meta.caplen as usize]);
        self.buf.extend_from_slice(provenance);
        self.buf.push(layout::PROVENANCE_TERMINATOR);
        &self.buf
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }
}

pub fn encode_meta(meta: &CaptureMeta) -> [u8; layout::META_LEN] {
    let mut out = [0u8; layout::META_LEN];
    out[layout::TS_SEC_RANGE].copy_from_slice(&meta.ts_sec.to_le_bytes());
    out[layout::TS_USEC_RANGE].copy_from_slice(&meta.ts_usec.to_le_bytes());
    out[layout::CAPLEN_RANGE].copy_from_slice(&meta.caplen.to_le_bytes());
    out[layout::ORIG_LEN_RANGE].copy_from_slice(&meta.orig_len.to_le_bytes());
    out
}

pub fn decode_meta(bytes: &[u8]) -> Result<CaptureMeta, IpcError> {
    let reader = BodyReader::new(bytes);
    reader.require_len(layout::META_LEN)?;
    Ok(CaptureMeta {
        ts_sec: i64::from_le_bytes(reader.read_array(layout::TS_SEC_RANGE)?),
        ts_usec: u32::from_le_bytes(reader.read_array(layout::TS_USEC_RANGE)?),
        caplen: u32::from_le_bytes(reader.read_array(layout::CAPLEN_RANGE)?),
        orig_len: u32::from_le_bytes(reader.read_array(layout::ORIG_LEN_RANGE)?),
    })
}

pub fn encode_envelope(id: u32, body_len: usize) -> Result<[u8; layout::ENVELOPE_LEN], IpcError> {
    if body_len > layout::MAX_BODY_LEN {
        return Err(IpcError::TooLarge {
            len: body_len,
            max: layout::MAX_BODY_LEN,
        });
    }
    let mut out = [0u8; layout::ENVELOPE_LEN];
    out[layout::MAGIC_RANGE].copy_from_slice(layout::ENVELOPE_MAGIC);
    out[layout::MESSAGE_ID_RANGE].copy_from_slice(&id.to_le_bytes());
    out[layout::BODY_LEN_RANGE].copy_from_slice(&(body_len as u32).to_le_bytes());
    Ok(out)
}

/// Returns `(message id, body length)`.
pub fn decode_envelope(bytes: &[u8]) -> Result<(u32, usize), IpcError> {
    let reader = BodyReader::new(bytes);
    let magic: [u8; 4] = reader.read_array(layout::MAGIC_RANGE)?;
    if &magic != layout::ENVELOPE_MAGIC {
        return Err(IpcError::BadMagic(magic));
    }
    let id = u32::from_le_bytes(reader.read_array(layout::MESSAGE_ID_RANGE)?);
    let len = u32::from_le_bytes(reader.read_array(layout::BODY_LEN_RANGE)?) as usize;
    if len > layout::MAX_BODY_LEN {
        return Err(IpcError::TooLarge {
            len,
            max: layout::MAX_BODY_LEN,
        });
    }
    Ok((id, len))
}

struct BodyReader<'a> {
    bytes: &'a [u8],
}

impl<'a> BodyReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn require_len(&self, needed: usize) -> Result<(), IpcError> {
        if self.bytes.len() < needed {
            return Err(IpcError::TooShort {
                needed,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }

    fn read_slice(&self, range: Range<usize>) -> Result<&'a [u8], IpcError> {
        self.bytes.get(range.clone()).ok_or(IpcError::TooShort {
            needed: range.end,
            actual: self.bytes.len(),
        })
    }

    fn read_array<const N: usize>(&self, range: Range<usize>) -> Result<[u8; N], IpcError> {
        let slice = self.read_slice(range)?;
        slice.try_into().map_err(|_| IpcError::TooShort {
            needed: N,
            actual: slice.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ForwardedMessage, MessageBuffer, decode_envelope, decode_meta, encode_envelope, encode_meta};
    use crate::ipc::error::IpcError;
    use crate::ipc::layout;
    use crate::source::CaptureMeta;

    fn meta(len: usize) -> CaptureMeta {
        CaptureMeta {
            ts_sec: 1_300_000_000,
            ts_usec: 250_000,
            caplen: len as u32,
            orig_len: len as u32 + 10,
        }
    }

    #[test]
    fn message_round_trip() {
        let frame: Vec<u8> = (0..60).collect();
        let mut buffer = MessageBuffer::new();
        let body = buffer.encode(&meta(frame.len()), &frame, "90:3c:40:").to_vec();

        let decoded = ForwardedMessage::decode(&body).unwrap();
        assert_eq!(decoded.meta, meta(frame.len()));
        assert_eq!(decoded.frame, frame.as_slice());
        assert_eq!(decoded.provenance, "90:3c:40:");
        assert_eq!(body.last(), Some(&0));
        assert_eq!(body.len(), layout::META_LEN + frame.len() + "90:3c:40:".len() + 1);
    }

    #[test]
    fn smaller_message_after_large_one_has_no_residue() {
        let mut buffer = MessageBuffer::new();
        let large = vec![0xab; 1500];
        buffer.encode(&meta(large.len()), &large, &"x".repeat(200));
        let high_water = buffer.capacity();

        for len in [800usize, 64, 3] {
            let frame = vec![len as u8; len];
            let body = buffer.encode(&meta(len), &frame, "p").to_vec();
            assert_eq!(body.len(), layout::META_LEN + len + 2);
            let decoded = ForwardedMessage::decode(&body).unwrap();
            assert_eq!(decoded.frame, frame.as_slice());
            assert_eq!(decoded.provenance, "p");
        }
        assert_eq!(buffer.capacity(), high_water);
    }

    #[test]
    fn caplen_follows_frame_bytes() {
        let mut buffer = MessageBuffer::new();
        let frame = [1u8, 2, 3];
        let body = buffer.encode(&meta(999), &frame, "").to_vec();
        let decoded = ForwardedMessage::decode(&body).unwrap();
        assert_eq!(decoded.meta.caplen, 3);
        assert_eq!(decoded.frame, &frame);
        assert_eq!(decoded.provenance, "");
    }

    #[test]
    fn embedded_nul_truncates_provenance() {
        let mut buffer = MessageBuffer::new();
        let body = buffer.encode(&meta(1), &[7], "abc\0def").to_vec();
        let decoded = ForwardedMessage::decode(&body).unwrap();
        assert_eq!(decoded.provenance, "abc");
    }

    #[test]
    fn decode_rejects_short_frame_section() {
        let mut body = encode_meta(&meta(10)).to_vec();
        body.extend_from_slice(&[1, 2, 3]);
        let err = ForwardedMessage::decode(&body).unwrap_err();
        assert!(matches!(err, IpcError::TooShort { needed: 30, actual: 23 }));
    }

    #[test]
    fn decode_requires_terminator() {
        let mut body = encode_meta(&meta(1)).to_vec();
        body.extend_from_slice(&[1, b'a', b'b']);
        let err = ForwardedMessage::decode(&body).unwrap_err();
        assert!(matches!(err, IpcError::MissingTerminator));
    }

    #[test]
    fn meta_record_is_little_endian() {
        let bytes = encode_meta(&meta(4));
        assert_eq!(&bytes[layout::CAPLEN_RANGE], &4u32.to_le_bytes());
        assert_eq!(decode_meta(&bytes).unwrap(), meta(4));
        assert!(decode_meta(&bytes[..19]).is_err());
    }

    #[test]
    fn envelope_round_trip_and_limits() {
        let header = encode_envelope(42, 1234).unwrap();
        assert_eq!(decode_envelope(&header).unwrap(), (42, 1234));

        let mut bad = header;
        bad[0] = b'X';
        assert!(matches!(decode_envelope(&bad), Err(IpcError::BadMagic(_))));

        assert!(matches!(
            encode_envelope(1, layout::MAX_BODY_LEN + 1),
            Err(IpcError::TooLarge { .. })
        ));
    }
}
