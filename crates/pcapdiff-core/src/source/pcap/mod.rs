//! PCAP/PCAPNG file source.
//!
//! Handles file I/O and low-level block parsing, emitting one
//! [`PacketEvent`](crate::PacketEvent) per captured frame.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::PcapFileSource;
