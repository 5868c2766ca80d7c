use etherparse::{LinkSlice, NetSlice, SlicedPacket, TcpSlice, TransportSlice};
use pcap_parser::Linktype;

use crate::model::LayerBuilder;

use super::error::DecodeError;

/// Split a link-layer frame into protocol layers, in wire order.
///
/// Layers the frame does not carry are simply absent; trailing bytes after
/// the innermost decoded header become a `data` layer.
pub fn decode_layers(linktype: Linktype, data: &[u8]) -> Result<Vec<LayerBuilder>, DecodeError> {
    let sliced = match linktype {
        Linktype::ETHERNET => {
            SlicedPacket::from_ethernet(data).map_err(|e| DecodeError::Slice(e.to_string()))?
        }
        Linktype::RAW => {
            SlicedPacket::from_ip(data).map_err(|e| DecodeError::Slice(e.to_string()))?
        }
        other => return Err(DecodeError::UnsupportedLinktype(other.0)),
    };

    let mut layers = Vec::with_capacity(4);

    if let Some(LinkSlice::Ethernet2(eth)) = &sliced.link {
        layers.push(
            LayerBuilder::new("eth")
                .field("src", mac_to_string(eth.source()))
                .field("dst", mac_to_string(eth.destination()))
                .field("type", eth.ether_type().0),
        );
    }

    let mut payload: Option<&[u8]> = None;
    match &sliced.net {
        Some(NetSlice::Ipv4(ipv4)) => {
            let header = ipv4.header();
            layers.push(
                LayerBuilder::new("ip")
                    .field("src", header.source_addr().to_string())
                    .field("dst", header.destination_addr().to_string())
                    .field("ttl", header.ttl())
                    .field("proto", header.protocol().0)
                    .field("len", header.total_len())
                    .field("id", header.identification())
                    .field("flags_df", header.dont_fragment())
                    .field("flags_mf", header.more_fragments())
                    .field("checksum", header.header_checksum())
                    .raw_data(header.slice()),
            );
            payload = Some(ipv4.payload().payload);
        }
        Some(NetSlice::Ipv6(ipv6)) => {
            let header = ipv6.header();
            layers.push(
                LayerBuilder::new("ipv6")
                    .field("src", header.source_addr().to_string())
                    .field("dst", header.destination_addr().to_string())
                    .field("hlim", header.hop_limit())
                    .field("nxt", header.next_header().0)
                    .field("plen", header.payload_length())
                    .raw_data(header.slice()),
            );
            payload = Some(ipv6.payload().payload);
        }
        _ => {}
    }

    match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => {
            layers.push(
                LayerBuilder::new("tcp")
                    .field("srcport", tcp.source_port())
                    .field("dstport", tcp.destination_port())
                    .field("seq", tcp.sequence_number())
                    .field("ack", tcp.acknowledgment_number())
                    .field("flags", tcp_flags(tcp))
                    .field("window_size", tcp.window_size())
                    .field("checksum", tcp.checksum())
                    .field("len", tcp.payload().len() as u32),
            );
            payload = Some(tcp.payload());
        }
        Some(TransportSlice::Udp(udp)) => {
            layers.push(
                LayerBuilder::new("udp")
                    .field("srcport", udp.source_port())
                    .field("dstport", udp.destination_port())
                    .field("length", udp.length())
                    .field("checksum", udp.checksum()),
            );
            payload = Some(udp.payload());
        }
        Some(TransportSlice::Icmpv4(icmp)) => {
            layers.push(
                LayerBuilder::new("icmp")
                    .field("type", icmp.type_u8())
                    .field("code", icmp.code_u8())
                    .field("checksum", icmp.checksum()),
            );
            payload = Some(icmp.payload());
        }
        Some(TransportSlice::Icmpv6(icmp)) => {
            layers.push(
                LayerBuilder::new("icmpv6")
                    .field("type", icmp.type_u8())
                    .field("code", icmp.code_u8())
                    .field("checksum", icmp.checksum()),
            );
            payload = Some(icmp.payload());
        }
        _ => {}
    }

    if let Some(payload) = payload.filter(|payload| !payload.is_empty()) {
        layers.push(data_layer(payload));
    }

    Ok(layers)
}

/// Payload bytes after the last decoded header.
pub fn data_layer(payload: &[u8]) -> LayerBuilder {
    LayerBuilder::new("data")
        .field("len", payload.len() as u32)
        .field("data", payload)
        .raw_data(payload)
}

fn tcp_flags(tcp: &TcpSlice<'_>) -> u16 {
    [
        (tcp.fin(), 0x001),
        (tcp.syn(), 0x002),
        (tcp.rst(), 0x004),
        (tcp.psh(), 0x008),
        (tcp.ack(), 0x010),
        (tcp.urg(), 0x020),
        (tcp.ece(), 0x040),
        (tcp.cwr(), 0x080),
        (tcp.ns(), 0x100),
    ]
    .into_iter()
    .filter(|(set, _)| *set)
    .fold(0, |flags, (_, bit)| flags | bit)
}

fn mac_to_string(mac: [u8; 6]) -> String {
    mac.iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}
