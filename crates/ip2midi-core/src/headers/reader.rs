use super::error::HeaderError;
use super::layout;

pub struct FrameReader<'a> {
    data: &'a [u8],
}

impl<'a> FrameReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn require_len(&self, needed: usize) -> Result<(), HeaderError> {
        if self.data.len() < needed {
            return Err(HeaderError::TooShort {
                needed,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn read_from(&self, offset: usize) -> Result<&'a [u8], HeaderError> {
        self.data.get(offset..).ok_or(HeaderError::TooShort {
            needed: offset,
            actual: self.data.len(),
        })
    }

    /// IPv4 header length in bytes, from the low nibble of the first IPv4
    /// byte.
    pub fn ipv4_header_len(&self) -> Result<usize, HeaderError> {
        self.require_len(layout::ETHERNET_HEADER_LEN + 1)?;
        let ihl = self.data[layout::ETHERNET_HEADER_LEN] & layout::IPV4_IHL_MASK;
        let len = usize::from(ihl) * layout::IPV4_IHL_UNIT;
        if len < layout::IPV4_MIN_HEADER_LEN {
            return Err(HeaderError::InvalidHeaderLength { ihl });
        }
        Ok(len)
    }

    /// Payload bytes starting at `offset`, `declared_len` long as far as the
    /// capture reaches. A non-positive length yields an empty slice.
    pub fn payload_window(&self, offset: usize, declared_len: i32) -> &'a [u8] {
        let Ok(declared_len) = usize::try_from(declared_len) else {
            return &[];
        };
        let start = offset.min(self.data.len());
        let end = offset.saturating_add(declared_len).min(self.data.len());
        &self.data[start..end]
    }
}
