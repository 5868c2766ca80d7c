use std::collections::{BTreeMap, BTreeSet};

use crate::config::IgnoreSet;
use crate::model::PacketLayer;
use crate::{DiffType, LayerDiffs};

use super::fields::{compare_fields, mark_all};

/// Compare the first-level sublayers of two packets, matched by name.
///
/// Deeper nesting is not diffed on its own: a layer's fields are the whole
/// contract at its level. When a packet repeats a layer name, the last
/// occurrence is the one compared.
pub fn compare_layers(
    packet_1: PacketLayer<'_>,
    packet_2: PacketLayer<'_>,
    ignore: &IgnoreSet,
) -> LayerDiffs {
    let layers_1 = layers_by_name(packet_1);
    let layers_2 = layers_by_name(packet_2);
    let names: BTreeSet<&str> = layers_1.keys().chain(layers_2.keys()).copied().collect();

    let mut diffs = LayerDiffs::new();
    for name in names {
        let field_diffs = match (layers_1.get(name), layers_2.get(name)) {
            (None, Some(layer_2)) => mark_all(layer_2.fields(), DiffType::Added),
            (Some(layer_1), None) => mark_all(layer_1.fields(), DiffType::Removed),
            (Some(layer_1), Some(layer_2)) => {
                compare_fields(Some(name), layer_1.fields(), layer_2.fields(), ignore)
            }
            (None, None) => continue,
        };
        if !field_diffs.is_empty() {
            diffs.insert(name.to_string(), field_diffs);
        }
    }
    diffs
}

fn layers_by_name(packet: PacketLayer<'_>) -> BTreeMap<&str, PacketLayer<'_>> {
    packet
        .sublayers()
        .map(|layer| (layer.name(), layer))
        .collect()
}
