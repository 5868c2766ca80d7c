#![allow(dead_code)]

use std::fs;
use std::path::Path;

use etherparse::PacketBuilder;

pub const ETH_SRC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x01];
pub const ETH_DST: [u8; 6] = [0x02, 0, 0, 0, 0, 0x02];

/// Ethernet/IPv4/UDP frame with the given TTL and payload.
pub fn udp_frame(ttl: u8, src_port: u16, payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2(ETH_SRC, ETH_DST)
        .ipv4([10, 0, 0, 1], [10, 0, 0, 2], ttl)
        .udp(src_port, 53);
    let mut packet = Vec::<u8>::with_capacity(builder.size(payload.len()));
    builder.write(&mut packet, payload).expect("build udp frame");
    packet
}

/// Ethernet/IPv4/TCP frame.
pub fn tcp_frame(window: u16, payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2(ETH_SRC, ETH_DST)
        .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
        .tcp(40000, 443, 1, window)
        .ack(1);
    let mut packet = Vec::<u8>::with_capacity(builder.size(payload.len()));
    builder.write(&mut packet, payload).expect("build tcp frame");
    packet
}

/// Write a big-endian pcapng file with one Ethernet interface.
///
/// Timestamps are in units of `10^-tsresol` seconds (6 when `None`).
pub fn write_pcapng(path: &Path, tsresol: Option<u8>, packets: &[(u64, Vec<u8>)]) {
    let mut output = Vec::new();
    output.extend_from_slice(&pcapng_block(0x0A0D0D0A, &section_header_body()));
    output.extend_from_slice(&pcapng_block(1, &interface_desc_body(tsresol)));

    for (ts, data) in packets {
        output.extend_from_slice(&pcapng_block(6, &enhanced_packet_body(*ts, data)));
    }

    fs::write(path, output).expect("write pcapng fixture");
}

/// Write a little-endian legacy pcap file (microsecond timestamps).
pub fn write_pcap(path: &Path, packets: &[(u32, u32, Vec<u8>)]) {
    let mut output = Vec::new();
    output.extend_from_slice(&0xa1b2c3d4u32.to_le_bytes());
    output.extend_from_slice(&2u16.to_le_bytes());
    output.extend_from_slice(&4u16.to_le_bytes());
    output.extend_from_slice(&0i32.to_le_bytes());
    output.extend_from_slice(&0u32.to_le_bytes());
    output.extend_from_slice(&65535u32.to_le_bytes());
    output.extend_from_slice(&1u32.to_le_bytes());

    for (sec, usec, data) in packets {
        output.extend_from_slice(&sec.to_le_bytes());
        output.extend_from_slice(&usec.to_le_bytes());
        output.extend_from_slice(&(data.len() as u32).to_le_bytes());
        output.extend_from_slice(&(data.len() as u32).to_le_bytes());
        output.extend_from_slice(data);
    }

    fs::write(path, output).expect("write pcap fixture");
}

fn pcapng_block(block_type: u32, body: &[u8]) -> Vec<u8> {
    let total_len = (8 + body.len() + 4) as u32;
    let mut block = Vec::with_capacity(total_len as usize);
    block.extend_from_slice(&block_type.to_be_bytes());
    block.extend_from_slice(&total_len.to_be_bytes());
    block.extend_from_slice(body);
    block.extend_from_slice(&total_len.to_be_bytes());
    block
}

fn section_header_body() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&0x1A2B3C4Du32.to_be_bytes());
    body.extend_from_slice(&1u16.to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(&(-1i64).to_be_bytes());
    body
}

fn interface_desc_body(tsresol: Option<u8>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&1u16.to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(&65535u32.to_be_bytes());
    if let Some(tsresol) = tsresol {
        // if_tsresol, padded to 32 bits, then opt_endofopt.
        body.extend_from_slice(&9u16.to_be_bytes());
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&[tsresol, 0, 0, 0]);
        body.extend_from_slice(&0u32.to_be_bytes());
    }
    body
}

fn enhanced_packet_body(ts: u64, data: &[u8]) -> Vec<u8> {
    let ts_high = ((ts >> 32) & 0xFFFF_FFFF) as u32;
    let ts_low = (ts & 0xFFFF_FFFF) as u32;
    let cap_len = data.len() as u32;
    let mut body = Vec::new();
    body.extend_from_slice(&0u32.to_be_bytes());
    body.extend_from_slice(&ts_high.to_be_bytes());
    body.extend_from_slice(&ts_low.to_be_bytes());
    body.extend_from_slice(&cap_len.to_be_bytes());
    body.extend_from_slice(&cap_len.to_be_bytes());
    body.extend_from_slice(data);
    let pad_len = (4 - (data.len() % 4)) % 4;
    body.extend(std::iter::repeat_n(0u8, pad_len));
    body
}
