//! Packet layer trees stored in a flat, index-addressed arena.
//!
//! A [`Capture`] owns every layer node of every packet in a single `Vec`;
//! children are referenced by [`LayerId`]. Read access goes through the
//! [`PacketLayer`] view, which borrows the capture and is `Copy`, so two
//! captures can be walked side by side without cloning any subtree.
//!
//! Trees are built with [`LayerBuilder`] and moved into the arena with
//! [`Capture::push_packet`]. Once stored, a capture is read-only.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the root-level field carrying the capture timestamp (seconds).
pub const TIMESTAMP_FIELD: &str = "timestamp";

const SUMMARY_FIELDS: [&str; 9] = [
    "src", "dst", "sport", "dport", "srcport", "dstport", "type", "proto", "len",
];

/// Scalar value of a single layer field.
///
/// Equality is exact: `Int(1)` and `Float(1.0)` are different values.
///
/// # Examples
/// ```
/// use pcapdiff_core::FieldValue;
///
/// assert_eq!(FieldValue::from(64u8), FieldValue::Int(64));
/// assert_ne!(FieldValue::Int(1), FieldValue::Float(1.0));
/// assert_eq!(FieldValue::from(vec![0xde, 0xad]).to_string(), "de:ad");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Numeric view of the value, when it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(value) => Some(*value as f64),
            FieldValue::Float(value) => Some(*value),
            FieldValue::Text(_) | FieldValue::Bytes(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(value) => write!(f, "{value}"),
            FieldValue::Float(value) => write!(f, "{value}"),
            FieldValue::Text(value) => f.write_str(value),
            FieldValue::Bytes(bytes) => {
                for (idx, byte) in bytes.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(":")?;
                    }
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

macro_rules! field_value_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for FieldValue {
            fn from(value: $ty) -> Self {
                FieldValue::Int(i64::from(value))
            }
        })*
    };
}

field_value_from_int!(u8, u16, u32, i32, i64);

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Bytes(value)
    }
}

impl From<&[u8]> for FieldValue {
    fn from(value: &[u8]) -> Self {
        FieldValue::Bytes(value.to_vec())
    }
}

/// Field name to value mapping of one layer, in stable key order.
pub type Fields = BTreeMap<String, FieldValue>;

/// Index of a layer node inside its owning [`Capture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(usize);

#[derive(Debug, Clone, PartialEq)]
struct LayerNode {
    name: String,
    fields: Fields,
    children: Vec<LayerId>,
    raw_data: Option<Vec<u8>>,
}

/// Owned layer tree used to construct packets before they enter a capture.
///
/// # Examples
/// ```
/// use pcapdiff_core::{Capture, LayerBuilder};
///
/// let packet = LayerBuilder::new("frame")
///     .field("timestamp", 10.0)
///     .sublayer(LayerBuilder::new("ip").field("ttl", 64u8));
///
/// let mut capture = Capture::new();
/// let index = capture.push_packet(packet);
/// let stored = capture.packet(index).unwrap();
/// assert_eq!(stored.timestamp(), Some(10.0));
/// assert_eq!(stored.sublayers().count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayerBuilder {
    name: String,
    fields: Fields,
    sublayers: Vec<LayerBuilder>,
    raw_data: Option<Vec<u8>>,
}

impl LayerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert_field(name, value);
        self
    }

    pub fn sublayer(mut self, layer: LayerBuilder) -> Self {
        self.push_sublayer(layer);
        self
    }

    pub fn raw_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.raw_data = Some(data.into());
        self
    }

    pub fn insert_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn push_sublayer(&mut self, layer: LayerBuilder) {
        self.sublayers.push(layer);
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// All packets of one capture, stored as a flat layer arena.
#[derive(Debug, Clone, Default)]
pub struct Capture {
    layers: Vec<LayerNode>,
    packets: Vec<LayerId>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a packet tree into the arena and return its packet index.
    pub fn push_packet(&mut self, root: LayerBuilder) -> usize {
        let id = self.alloc(root);
        self.packets.push(id);
        self.packets.len() - 1
    }

    fn alloc(&mut self, layer: LayerBuilder) -> LayerId {
        let id = LayerId(self.layers.len());
        self.layers.push(LayerNode {
            name: layer.name,
            fields: layer.fields,
            children: Vec::with_capacity(layer.sublayers.len()),
            raw_data: layer.raw_data,
        });
        for sublayer in layer.sublayers {
            let child = self.alloc(sublayer);
            self.layers[id.0].children.push(child);
        }
        id
    }

    /// Number of packets in the capture.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Total number of layer nodes across all packets.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn packet(&self, index: usize) -> Option<PacketLayer<'_>> {
        self.packets.get(index).map(|&id| self.layer(id))
    }

    pub fn packets(&self) -> impl ExactSizeIterator<Item = PacketLayer<'_>> {
        self.packets.iter().map(|&id| self.layer(id))
    }

    /// Per-packet timestamps in capture order.
    pub fn timestamps(&self) -> Vec<Option<f64>> {
        self.packets().map(PacketLayer::timestamp).collect()
    }

    fn layer(&self, id: LayerId) -> PacketLayer<'_> {
        PacketLayer { capture: self, id }
    }
}

impl FromIterator<LayerBuilder> for Capture {
    fn from_iter<I: IntoIterator<Item = LayerBuilder>>(iter: I) -> Self {
        let mut capture = Capture::new();
        for packet in iter {
            capture.push_packet(packet);
        }
        capture
    }
}

/// Borrowed view of one layer node (a packet root or any of its sublayers).
#[derive(Clone, Copy)]
pub struct PacketLayer<'a> {
    capture: &'a Capture,
    id: LayerId,
}

impl<'a> PacketLayer<'a> {
    fn node(self) -> &'a LayerNode {
        &self.capture.layers[self.id.0]
    }

    pub fn id(self) -> LayerId {
        self.id
    }

    pub fn name(self) -> &'a str {
        &self.node().name
    }

    pub fn fields(self) -> &'a Fields {
        &self.node().fields
    }

    pub fn field(self, name: &str) -> Option<&'a FieldValue> {
        self.node().fields.get(name)
    }

    pub fn has_field(self, name: &str) -> bool {
        self.node().fields.contains_key(name)
    }

    /// Wire bytes of this layer, kept for display only.
    pub fn raw_data(self) -> Option<&'a [u8]> {
        self.node().raw_data.as_deref()
    }

    /// Child layers in on-wire order.
    pub fn sublayers(self) -> impl ExactSizeIterator<Item = PacketLayer<'a>> {
        let capture = self.capture;
        self.node()
            .children
            .iter()
            .map(move |&id| PacketLayer { capture, id })
    }

    /// Capture timestamp in seconds, read from the `timestamp` field.
    pub fn timestamp(self) -> Option<f64> {
        self.field(TIMESTAMP_FIELD).and_then(FieldValue::as_f64)
    }

    /// Visit every field of this layer and its descendants.
    ///
    /// The callback receives the dotted path (sublayer names joined with the
    /// field name, this layer's own name omitted), the name of the layer that
    /// owns the field, the bare field name and the value. Parent fields are
    /// visited before sublayer fields.
    pub fn walk_fields<F>(self, mut visit: F)
    where
        F: FnMut(&str, &'a str, &'a str, &'a FieldValue),
    {
        self.walk_inner(None, &mut visit);
    }

    fn walk_inner<F>(self, prefix: Option<&str>, visit: &mut F)
    where
        F: FnMut(&str, &'a str, &'a str, &'a FieldValue),
    {
        let node = self.node();
        for (name, value) in &node.fields {
            match prefix {
                Some(prefix) => visit(&format!("{prefix}.{name}"), &node.name, name, value),
                None => visit(name, &node.name, name, value),
            }
        }
        for sublayer in self.sublayers() {
            let path = match prefix {
                Some(prefix) => format!("{prefix}.{}", sublayer.name()),
                None => sublayer.name().to_string(),
            };
            sublayer.walk_inner(Some(&path), visit);
        }
    }

    /// All fields of this layer and its sublayers keyed by dotted path.
    ///
    /// On path collisions (two sibling sublayers with the same name) the
    /// later layer wins.
    pub fn flatten_fields(self) -> BTreeMap<String, &'a FieldValue> {
        let mut flat = BTreeMap::new();
        self.walk_fields(|path, _, _, value| {
            flat.insert(path.to_string(), value);
        });
        flat
    }

    /// Depth-first search for a layer by name (ASCII case-insensitive),
    /// starting with this layer itself.
    pub fn find_layer(self, name: &str) -> Option<PacketLayer<'a>> {
        if self.name().eq_ignore_ascii_case(name) {
            return Some(self);
        }
        self.sublayers().find_map(|sublayer| sublayer.find_layer(name))
    }

    /// Short one-line description, e.g. `ip src=10.0.0.1 dst=10.0.0.2`.
    pub fn summary(self) -> String {
        let mut parts = vec![self.name().to_string()];
        for name in SUMMARY_FIELDS {
            if let Some(value) = self.field(name) {
                parts.push(format!("{name}={value}"));
            }
        }
        parts.join(" ")
    }
}

impl fmt::Debug for PacketLayer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketLayer")
            .field("name", &self.name())
            .field("fields", self.fields())
            .field("sublayers", &self.sublayers().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Capture, FieldValue, LayerBuilder};

    fn sample_packet() -> LayerBuilder {
        LayerBuilder::new("frame")
            .field("timestamp", 1.5)
            .field("number", 1u32)
            .sublayer(
                LayerBuilder::new("ip")
                    .field("src", "10.0.0.1")
                    .field("ttl", 64u8)
                    .sublayer(LayerBuilder::new("opt").field("kind", 7u8)),
            )
            .sublayer(
                LayerBuilder::new("udp")
                    .field("srcport", 5000u16)
                    .raw_data(vec![1, 2, 3]),
            )
    }

    #[test]
    fn arena_keeps_children_in_wire_order() {
        let capture: Capture = [sample_packet()].into_iter().collect();
        assert_eq!(capture.len(), 1);
        assert_eq!(capture.layer_count(), 4);

        let packet = capture.packet(0).unwrap();
        let names: Vec<_> = packet.sublayers().map(|layer| layer.name()).collect();
        assert_eq!(names, ["ip", "udp"]);
        assert_eq!(
            packet.sublayers().nth(1).unwrap().raw_data(),
            Some(&[1u8, 2, 3][..])
        );
        assert!(capture.packet(1).is_none());
    }

    #[test]
    fn timestamp_accepts_integers() {
        let capture: Capture = [
            LayerBuilder::new("frame").field("timestamp", 3i64),
            LayerBuilder::new("frame"),
        ]
        .into_iter()
        .collect();
        assert_eq!(capture.timestamps(), vec![Some(3.0), None]);
    }

    #[test]
    fn flatten_prefixes_sublayer_names_recursively() {
        let capture: Capture = [sample_packet()].into_iter().collect();
        let flat = capture.packet(0).unwrap().flatten_fields();
        let keys: Vec<_> = flat.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "ip.opt.kind",
                "ip.src",
                "ip.ttl",
                "number",
                "timestamp",
                "udp.srcport"
            ]
        );
        assert_eq!(flat["ip.ttl"], &FieldValue::Int(64));
    }

    #[test]
    fn walk_reports_owning_layer() {
        let capture: Capture = [sample_packet()].into_iter().collect();
        let mut seen = Vec::new();
        capture
            .packet(0)
            .unwrap()
            .walk_fields(|path, layer, field, _| {
                seen.push((path.to_string(), layer, field));
            });
        assert!(seen.contains(&("ip.opt.kind".to_string(), "opt", "kind")));
        assert!(seen.contains(&("number".to_string(), "frame", "number")));
    }

    #[test]
    fn find_layer_is_case_insensitive_and_recursive() {
        let capture: Capture = [sample_packet()].into_iter().collect();
        let packet = capture.packet(0).unwrap();
        assert_eq!(packet.find_layer("FRAME").unwrap().name(), "frame");
        assert_eq!(packet.find_layer("Opt").unwrap().field("kind"), Some(&FieldValue::Int(7)));
        assert!(packet.find_layer("tcp").is_none());
    }

    #[test]
    fn summary_lists_known_fields() {
        let capture: Capture = [sample_packet()].into_iter().collect();
        let ip = capture.packet(0).unwrap().find_layer("ip").unwrap();
        assert_eq!(ip.summary(), "ip src=10.0.0.1");
    }

    #[test]
    fn field_value_display_and_json() {
        assert_eq!(FieldValue::Text("abc".into()).to_string(), "abc");
        assert_eq!(FieldValue::Bytes(vec![0x0a, 0xff]).to_string(), "0a:ff");
        let json = serde_json::to_string(&FieldValue::Int(5)).unwrap();
        assert_eq!(json, "5");
        let back: FieldValue = serde_json::from_str("2.5").unwrap();
        assert_eq!(back, FieldValue::Float(2.5));
    }
}
