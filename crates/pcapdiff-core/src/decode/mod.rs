//! Frame decoding: raw packet events to layer trees.
//!
//! Every decoded packet gets a root layer named `frame` carrying capture
//! bookkeeping (number, timestamps, lengths) with the protocol layers as its
//! sublayers. Frames that cannot be sliced still produce a packet, so the
//! packet count always matches the file.

pub mod error;
pub mod parser;

use tracing::debug;

use crate::model::{LayerBuilder, TIMESTAMP_FIELD};
use crate::source::PacketEvent;

use error::DecodeError;
use parser::{data_layer, decode_layers};

/// Running state across the frames of one capture.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameContext {
    number: u64,
    first_ts: Option<f64>,
    prev_ts: Option<f64>,
}

impl FrameContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames decoded so far.
    pub fn frames(&self) -> u64 {
        self.number
    }
}

/// Decode one packet event into a `frame` tree and advance `context`.
///
/// # Examples
/// ```
/// use pcapdiff_core::{Capture, FrameContext, PacketEvent, decode_packet};
/// use pcap_parser::Linktype;
///
/// let event = PacketEvent {
///     ts: Some(1.5),
///     linktype: Linktype::ETHERNET,
///     orig_len: 3,
///     data: vec![0, 1, 2],
/// };
/// let mut context = FrameContext::new();
/// let capture: Capture = [decode_packet(&event, &mut context)].into_iter().collect();
///
/// let frame = capture.packet(0).unwrap();
/// assert_eq!(frame.name(), "frame");
/// assert_eq!(frame.timestamp(), Some(1.5));
/// assert!(frame.find_layer("data").unwrap().has_field("error"));
/// ```
pub fn decode_packet(event: &PacketEvent, context: &mut FrameContext) -> LayerBuilder {
    context.number += 1;

    let mut frame = LayerBuilder::new("frame")
        .field("number", context.number as i64)
        .field("length", event.orig_len)
        .field("caplen", event.data.len() as i64);

    if let Some(ts) = event.ts {
        let first = *context.first_ts.get_or_insert(ts);
        let prev = context.prev_ts.unwrap_or(ts);
        frame.insert_field(TIMESTAMP_FIELD, ts);
        frame.insert_field("time_relative", ts - first);
        frame.insert_field("time_delta", ts - prev);
        context.prev_ts = Some(ts);
    }

    match decode_layers(event.linktype, &event.data) {
        Ok(layers) => {
            for layer in layers {
                frame.push_sublayer(layer);
            }
        }
        Err(err) => {
            debug!(frame = context.number, error = %err, "frame not decoded");
            frame.push_sublayer(undecoded(&event.data, &err));
        }
    }

    frame
}

fn undecoded(data: &[u8], err: &DecodeError) -> LayerBuilder {
    let mut layer = data_layer(data);
    layer.insert_field("error", err.to_string());
    layer
}
