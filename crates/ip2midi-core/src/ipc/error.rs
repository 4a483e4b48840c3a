use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("invalid channel name '{0}'")]
    InvalidName(String),
    #[error("failed to connect to channel '{name}': {source}")]
    Connect {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to bind channel at {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("channel is closed")]
    Closed,
    #[error("parent is not reading; message dropped")]
    Stalled,
    #[error("message too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("bad envelope magic {0:02x?}")]
    BadMagic([u8; 4]),
    #[error("message body of {len} bytes exceeds limit of {max}")]
    TooLarge { len: usize, max: usize },
    #[error("provenance string is not NUL-terminated")]
    MissingTerminator,
    #[error("provenance string is not valid UTF-8: {0}")]
    InvalidProvenance(#[from] std::str::Utf8Error),
}
