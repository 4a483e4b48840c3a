//! Payload to instrument-event translation.
//!
//! Payload bytes are used as event bytes verbatim; nothing is re-encoded.
//! The translator owns a reusable event list and a reusable provenance
//! string, both reset at the start of every frame.

pub mod error;
pub mod events;
pub mod layout;

use std::fmt::{self, Write as _};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use error::TranslateError;
pub use events::EventList;

/// How a payload is turned into events and provenance text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadMode {
    /// One event carrying the whole payload; provenance `90:3c:40:`.
    #[default]
    RawBytes,
    /// One event from the first three payload bytes; provenance `90 3c 40`.
    HexString,
}

impl PayloadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadMode::RawBytes => "raw-bytes",
            PayloadMode::HexString => "hex-string",
        }
    }
}

impl fmt::Display for PayloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadMode {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw-bytes" => Ok(PayloadMode::RawBytes),
            "hex-string" => Ok(PayloadMode::HexString),
            other => Err(TranslateError::UnknownMode(other.to_string())),
        }
    }
}

/// Events and provenance produced for one payload.
#[derive(Debug, Clone, Copy)]
pub struct Translation<'a> {
    pub events: &'a EventList,
    pub provenance: &'a str,
}

#[derive(Debug)]
pub struct Translator {
    mode: PayloadMode,
    events: EventList,
    provenance: String,
}

impl Translator {
    pub fn new(mode: PayloadMode) -> Self {
        Self {
            mode,
            events: EventList::with_capacity(layout::EVENT_LIST_CAPACITY),
            provenance: String::new(),
        }
    }

    pub fn mode(&self) -> PayloadMode {
        self.mode
    }

    /// Translate one payload. Returns `None` for an empty payload.
    pub fn translate(&mut self, payload: &[u8]) -> Option<Translation<'_>> {
        self.events.reset();
        self.provenance.clear();
        if payload.is_empty() {
            return None;
        }

        let event = match self.mode {
            PayloadMode::RawBytes => {
                let len = payload.len().min(self.events.capacity());
                &payload[..len]
            }
            PayloadMode::HexString => &payload[..payload.len().min(layout::HEX_EVENT_LEN)],
        };
        // Both branches are capped to the list capacity, so this cannot overflow.
        self.events.push(event).ok()?;
        write_provenance(&mut self.provenance, self.mode, event);

        Some(Translation {
            events: &self.events,
            provenance: &self.provenance,
        })
    }
}

fn write_provenance(out: &mut String, mode: PayloadMode, bytes: &[u8]) {
    match mode {
        PayloadMode::RawBytes => {
            for byte in bytes {
                let _ = write!(out, "{byte:02x}:");
            }
        }
        PayloadMode::HexString => {
            for (i, byte) in bytes.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                let _ = write!(out, "{byte:x}");
            }
        }
    }
}
