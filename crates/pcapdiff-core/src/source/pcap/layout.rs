pub const PCAP_READER_BUFFER_SIZE: usize = 64 * 1024;

/// Section header block type; byte-order independent.
pub const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

pub const PCAP_MAGIC_USEC_LE: [u8; 4] = [0xd4, 0xc3, 0xb2, 0xa1];
pub const PCAP_MAGIC_USEC_BE: [u8; 4] = [0xa1, 0xb2, 0xc3, 0xd4];
pub const PCAP_MAGIC_NSEC_LE: [u8; 4] = [0x4d, 0x3c, 0xb2, 0xa1];
pub const PCAP_MAGIC_NSEC_BE: [u8; 4] = [0xa1, 0xb2, 0x3c, 0x4d];

/// Size of the legacy global header; nothing shorter can hold a capture.
pub const MIN_CAPTURE_FILE_LEN: u64 = 24;

/// pcapng timestamp resolution when no interface says otherwise.
pub const DEFAULT_TICKS_PER_SECOND: u64 = 1_000_000;
