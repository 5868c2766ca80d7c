use std::collections::{BTreeMap, BTreeSet};

use crate::config::IgnoreSet;
use crate::model::{FieldValue, PacketLayer};

/// Share of comparable fields with identical values, in `0.0..=1.0`.
///
/// The sublayers of both packets are flattened to dotted paths prefixed
/// with the sublayer name, with ignored fields removed; the score is
/// `|agreeing keys| / |union of keys|`. Fields of the root layer itself
/// never count, matching [`compare_layers`](super::compare_layers). Two
/// packets with no comparable fields score `1.0`.
pub fn similarity(packet_1: PacketLayer<'_>, packet_2: PacketLayer<'_>, ignore: &IgnoreSet) -> f64 {
    let fields_1 = comparable_fields(packet_1, ignore);
    let fields_2 = comparable_fields(packet_2, ignore);

    let union: BTreeSet<&str> = fields_1
        .keys()
        .chain(fields_2.keys())
        .map(String::as_str)
        .collect();
    if union.is_empty() {
        return 1.0;
    }

    let matching = union
        .iter()
        .filter(|key| fields_1.get(**key) == fields_2.get(**key))
        .count();
    matching as f64 / union.len() as f64
}

fn comparable_fields<'a>(
    packet: PacketLayer<'a>,
    ignore: &IgnoreSet,
) -> BTreeMap<String, &'a FieldValue> {
    let mut flat = BTreeMap::new();
    for sublayer in packet.sublayers() {
        let prefix = sublayer.name();
        sublayer.walk_fields(|path, layer, field, value| {
            let path = format!("{prefix}.{path}");
            if ignore.is_ignored(Some(layer), field) || ignore.contains(&path) {
                return;
            }
            flat.insert(path, value);
        });
    }
    flat
}
