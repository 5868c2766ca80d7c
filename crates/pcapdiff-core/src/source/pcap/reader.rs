use std::io::{Read, Seek, SeekFrom};

use super::error::PcapSourceError;
use super::layout;
use pcap_parser::Linktype;

/// Read the magic bytes and rewind the reader to the start.
///
/// # Examples
/// This helper is part of an internal module, so the example is marked as
/// text example.
/// ```text
/// use pcapdiff_core::source::pcap::reader::read_magic_and_rewind;
/// use std::io::Cursor;
///
/// let bytes = [0x0a, 0x0d, 0x0d, 0x0a, 0x01];
/// let mut cursor = Cursor::new(bytes);
/// let magic = read_magic_and_rewind(&mut cursor).unwrap();
/// assert_eq!(magic, [0x0a, 0x0d, 0x0d, 0x0a]);
/// ```
///
/// # Errors
/// Returns `PcapSourceError` when the reader cannot be read or rewound.
pub fn read_magic_and_rewind<R: Read + Seek>(reader: &mut R) -> Result<[u8; 4], PcapSourceError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(magic)
}

pub fn is_pcapng_magic(magic: &[u8; 4]) -> bool {
    magic == &layout::PCAPNG_MAGIC
}

/// Check for any of the four legacy pcap magics (both byte orders, micro-
/// and nanosecond resolution).
///
/// # Examples
/// ```text
/// use pcapdiff_core::source::pcap::reader::is_legacy_pcap_magic;
///
/// assert!(is_legacy_pcap_magic(&[0xd4, 0xc3, 0xb2, 0xa1]));
/// assert!(!is_legacy_pcap_magic(&[0x0a, 0x0d, 0x0d, 0x0a]));
/// ```
pub fn is_legacy_pcap_magic(magic: &[u8; 4]) -> bool {
    [
        layout::PCAP_MAGIC_USEC_LE,
        layout::PCAP_MAGIC_USEC_BE,
        layout::PCAP_MAGIC_NSEC_LE,
        layout::PCAP_MAGIC_NSEC_BE,
    ]
    .contains(magic)
}

pub fn is_capture_magic(magic: &[u8; 4]) -> bool {
    is_pcapng_magic(magic) || is_legacy_pcap_magic(magic)
}

/// Resolve the linktype for a given interface id, defaulting to Ethernet.
///
/// # Examples
/// ```text
/// use pcapdiff_core::source::pcap::reader::linktype_for_interface;
/// use pcap_parser::Linktype;
///
/// let linktypes = [Linktype::RAW];
/// assert_eq!(linktype_for_interface(&linktypes, 0), Linktype::RAW);
/// assert_eq!(linktype_for_interface(&linktypes, 1), Linktype::ETHERNET);
/// ```
pub fn linktype_for_interface(linktypes: &[Linktype], if_id: u32) -> Linktype {
    linktypes
        .get(if_id as usize)
        .copied()
        .unwrap_or(Linktype::ETHERNET)
}

/// Convert a legacy pcap record timestamp to seconds.
///
/// `frac` is microseconds, or nanoseconds when the file header says so.
pub fn legacy_ts_to_seconds(ts_sec: u32, frac: u32, nanosecond: bool) -> f64 {
    let unit = if nanosecond { 1e-9 } else { 1e-6 };
    ts_sec as f64 + frac as f64 * unit
}

/// Ticks per second for a pcapng `if_tsresol` value.
///
/// The high bit selects a power of two, otherwise a power of ten. Values
/// that would overflow fall back to microseconds.
pub fn tsresol_ticks_per_second(tsresol: u8) -> u64 {
    let exponent = u32::from(tsresol & 0x7f);
    let ticks = if tsresol & 0x80 != 0 {
        1u64.checked_shl(exponent)
    } else {
        10u64.checked_pow(exponent)
    };
    match ticks {
        Some(ticks) if ticks > 0 => ticks,
        _ => layout::DEFAULT_TICKS_PER_SECOND,
    }
}

/// Convert PCAPNG high/low timestamp to seconds.
///
/// # Examples
/// ```text
/// use pcapdiff_core::source::pcap::reader::pcapng_ts_to_seconds;
///
/// let seconds = pcapng_ts_to_seconds(0, 1_500_000, 1_000_000);
/// assert!((seconds - 1.5).abs() < f64::EPSILON);
/// ```
pub fn pcapng_ts_to_seconds(ts_high: u32, ts_low: u32, ticks_per_second: u64) -> f64 {
    let ts = ((ts_high as u64) << 32) | (ts_low as u64);
    let secs = ts / ticks_per_second;
    let frac = ts % ticks_per_second;
    secs as f64 + frac as f64 / ticks_per_second as f64
}
