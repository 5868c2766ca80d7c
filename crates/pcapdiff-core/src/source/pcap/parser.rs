use std::fs::File;
use std::path::Path;

use pcap_parser::{
    Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapNGReader, traits::PcapReaderIterator,
};

use crate::source::{PacketEvent, PacketSource, SourceError};

use super::error::PcapSourceError;
use super::layout;
use super::reader::{
    is_legacy_pcap_magic, is_pcapng_magic, legacy_ts_to_seconds, linktype_for_interface,
    pcapng_ts_to_seconds, read_magic_and_rewind, tsresol_ticks_per_second,
};

/// Streams packets out of a `.pcap` or `.pcapng` file.
pub struct PcapFileSource {
    inner: PcapReader,
}

enum PcapReader {
    Legacy {
        reader: LegacyPcapReader<File>,
        linktype: Option<Linktype>,
        nanosecond: bool,
    },
    Ng {
        reader: PcapNGReader<File>,
        linktypes: Vec<Linktype>,
        resolutions: Vec<u64>,
    },
}

impl PcapFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(SourceError::from)?;
        let inner = create_reader(file).map_err(SourceError::from)?;
        Ok(Self { inner })
    }
}

impl PacketSource for PcapFileSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError> {
        next_packet(&mut self.inner).map_err(SourceError::from)
    }
}

fn create_reader(file: File) -> Result<PcapReader, PcapSourceError> {
    let mut file = file;
    let magic = read_magic_and_rewind(&mut file)?;

    if is_pcapng_magic(&magic) {
        let reader = PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            PcapSourceError::Pcap {
                context: "pcapng reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Ng {
            reader,
            linktypes: Vec::new(),
            resolutions: Vec::new(),
        })
    } else if is_legacy_pcap_magic(&magic) {
        let reader = LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            PcapSourceError::Pcap {
                context: "pcap reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Legacy {
            reader,
            linktype: None,
            nanosecond: false,
        })
    } else {
        Err(PcapSourceError::UnknownMagic(magic))
    }
}

fn next_packet(reader: &mut PcapReader) -> Result<Option<PacketEvent>, PcapSourceError> {
    loop {
        match reader {
            PcapReader::Legacy {
                reader,
                linktype,
                nanosecond,
            } => match reader.next() {
                Ok((offset, block)) => {
                    let event = match block {
                        PcapBlockOwned::LegacyHeader(header) => {
                            *linktype = Some(header.network);
                            *nanosecond = header.is_nanosecond_precision();
                            None
                        }
                        PcapBlockOwned::Legacy(packet) => Some(PacketEvent {
                            ts: Some(legacy_ts_to_seconds(
                                packet.ts_sec,
                                packet.ts_usec,
                                *nanosecond,
                            )),
                            linktype: linktype.unwrap_or(Linktype::ETHERNET),
                            orig_len: packet.origlen,
                            data: packet.data.to_vec(),
                        }),
                        _ => None,
                    };
                    reader.consume(offset);
                    if event.is_some() {
                        return Ok(event);
                    }
                }
                Err(pcap_parser::PcapError::Eof) => return Ok(None),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcap reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcap reader next",
                        message: e.to_string(),
                    });
                }
            },
            PcapReader::Ng {
                reader,
                linktypes,
                resolutions,
            } => match reader.next() {
                Ok((offset, block)) => {
                    let event = match block {
                        PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                            // Interface ids are scoped to their section.
                            linktypes.clear();
                            resolutions.clear();
                            None
                        }
                        PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                            linktypes.push(intf.linktype);
                            resolutions.push(tsresol_ticks_per_second(intf.if_tsresol));
                            None
                        }
                        PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => {
                            let ticks = resolutions
                                .get(packet.if_id as usize)
                                .copied()
                                .unwrap_or(layout::DEFAULT_TICKS_PER_SECOND);
                            Some(PacketEvent {
                                ts: Some(pcapng_ts_to_seconds(
                                    packet.ts_high,
                                    packet.ts_low,
                                    ticks,
                                )),
                                linktype: linktype_for_interface(linktypes, packet.if_id),
                                orig_len: packet.origlen,
                                data: packet.data.to_vec(),
                            })
                        }
                        PcapBlockOwned::NG(Block::SimplePacket(packet)) => {
                            // Simple packet blocks carry no timestamp.
                            Some(PacketEvent {
                                ts: None,
                                linktype: linktype_for_interface(linktypes, 0),
                                orig_len: packet.origlen,
                                data: packet.data.to_vec(),
                            })
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if event.is_some() {
                        return Ok(event);
                    }
                }
                Err(pcap_parser::PcapError::Eof) => return Ok(None),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcapng reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcapng reader next",
                        message: e.to_string(),
                    });
                }
            },
        }
    }
}
