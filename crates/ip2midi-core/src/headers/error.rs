use thiserror::Error;

/// Errors returned by header decoding.
///
/// ```text
/// use ip2midi_core::headers::HeaderError;
///
/// let err = HeaderError::TooShort { needed: 34, actual: 20 };
/// assert!(err.to_string().contains("frame too short"));
/// ```
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("header slice error: {0}")]
    Slice(String),
    #[error("frame too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("invalid IPv4 header length: {ihl} words")]
    InvalidHeaderLength { ihl: u8 },
}
