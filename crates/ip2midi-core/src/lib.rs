//! IP2MIDI core library: turns UDP datagrams into instrument events.
//!
//! The helper captures frames from a network interface (or a replayed
//! capture file), keeps UDP/IPv4/Ethernet frames, and publishes each
//! payload verbatim as one event on a virtual MIDI source. When a parent
//! process supplies a channel, every delivered frame is also forwarded to it
//! together with its capture metadata and a provenance string.
//!
//! Layering follows the decoders used throughout the crate:
//! - `source`: frame sources (live capture, replay, in-memory)
//! - `headers`: Ethernet/IPv4/UDP decoding (layout/reader/parser/error)
//! - `translate`: payload to event list
//! - `sink`: output endpoint
//! - `ipc`: message codec and local channel
//! - `pipeline` and `capture`: per-frame processing on the capture thread
//! - `lifecycle`: setup, run-mode wait and ordered teardown
//!
//! Invariants:
//! - Frames are processed strictly in arrival order on one thread.
//! - Per-frame failures never stop capture; only setup errors are fatal.
//! - The output endpoint and channel are released only after the capture
//!   thread has stopped or missed its join deadline.
//!
//! # Examples
//! ```no_run
//! use std::path::PathBuf;
//!
//! use ip2midi_core::{Config, Controller};
//!
//! let mut config = Config::default();
//! config.capture.replay = Some(PathBuf::from("session.pcapng"));
//! let summary = Controller::new(config).run(None)?;
//! println!("stopped: {}", summary.reason);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod capture;
pub mod config;
pub mod headers;
pub mod ipc;
pub mod lifecycle;
pub mod pipeline;
pub mod shutdown;
pub mod sink;
pub mod source;
pub mod translate;

pub use capture::{CaptureExit, CaptureHandle, CaptureReport, CaptureState};
pub use config::{Config, ConfigError};
pub use ipc::{Channel, ChannelListener, ChannelReceiver, ForwardedMessage, IpcError};
pub use lifecycle::{Controller, RunMode, RunSummary, SetupError};
pub use pipeline::{AddressFilter, CaptureStats, FrameOutcome, FramePipeline};
pub use shutdown::{ShutdownReason, ShutdownSignal};
pub use sink::{EventSink, OutputPort, SinkError};
pub use source::{CaptureMeta, CapturedFrame, FrameSource, SourceError};
pub use translate::{PayloadMode, Translator};
