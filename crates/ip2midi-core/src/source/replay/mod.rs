//! PCAP/PCAPNG replay source.
//!
//! Replays a capture file through the same `FrameSource` contract as a live
//! interface. Each block is copied into one reusable frame buffer, so the
//! frame handed to the pipeline borrows the source rather than allocating.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::PcapFileSource;
