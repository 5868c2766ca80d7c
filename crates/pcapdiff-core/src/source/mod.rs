//! Raw packet sources.
//!
//! A source yields link-layer frames with their capture timestamp; decoding
//! into layer trees happens in `decode`.

pub(crate) mod pcap;

pub use pcap::PcapFileSource;

use pcap_parser::Linktype;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct PacketEvent {
    /// Seconds since the Unix epoch, when the capture format carries one.
    pub ts: Option<f64>,
    pub linktype: Linktype,
    /// Length of the packet on the wire; `data` may be shorter.
    pub orig_len: u32,
    pub data: Vec<u8>,
}

pub trait PacketSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCAP parse error: {0}")]
    Pcap(String),
}

impl From<pcap::error::PcapSourceError> for SourceError {
    fn from(value: pcap::error::PcapSourceError) -> Self {
        match value {
            pcap::error::PcapSourceError::Io(err) => SourceError::Io(err),
            pcap::error::PcapSourceError::Pcap { context, message } => {
                SourceError::Pcap(format!("{context}: {message}"))
            }
            pcap::error::PcapSourceError::UnknownMagic(magic) => SourceError::Pcap(format!(
                "not a pcap or pcapng file (magic {:02x}{:02x}{:02x}{:02x})",
                magic[0], magic[1], magic[2], magic[3]
            )),
        }
    }
}
