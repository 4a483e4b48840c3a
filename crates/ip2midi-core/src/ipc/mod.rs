//! Local IPC forwarding of captured frames to a parent process.
//!
//! A forwarded message is `[metadata record][frame bytes][provenance, NUL]`.
//! On the Unix socket each message is preceded by a 12-byte envelope
//! (`IP2M`, message id, body length) that only delimits messages; the
//! receiver slices the body with the metadata record's length fields.

pub mod channel;
pub mod codec;
pub mod error;
pub mod forwarder;
pub mod layout;

pub use channel::{Channel, ChannelListener, ChannelReceiver, Envelope};
pub use codec::{ForwardedMessage, MessageBuffer};
pub use error::IpcError;
pub use forwarder::IpcForwarder;
