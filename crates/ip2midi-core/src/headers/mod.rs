//! Ethernet/IPv4/UDP header decoding.
//!
//! Follows the same layering as the other decoders in this crate:
//! - `layout`: fixed header sizes and masks
//! - `reader`: bounds-checked byte access and length arithmetic
//! - `parser`: produces a [`UdpDatagram`] view over a captured frame
//! - `error`: truncation and slicing errors
//!
//! Frames that are not UDP over IPv4 over Ethernet are reported as
//! `Ok(None)`; they are expected noise from broad capture filters, not
//! errors.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use error::HeaderError;
pub use parser::{UdpDatagram, parse_udp_datagram};
