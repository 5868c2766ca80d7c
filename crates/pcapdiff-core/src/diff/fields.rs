use crate::config::IgnoreSet;
use crate::model::Fields;
use crate::{DiffType, FieldDiffs};

/// Classify every field of two layers that is not unchanged.
///
/// `layer` is used only to match layer-qualified ignore entries such as
/// `tcp.checksum`. Values are compared exactly.
pub fn compare_fields(
    layer: Option<&str>,
    fields_1: &Fields,
    fields_2: &Fields,
    ignore: &IgnoreSet,
) -> FieldDiffs {
    let mut diffs = FieldDiffs::new();

    for (name, value_1) in fields_1 {
        if ignore.is_ignored(layer, name) {
            continue;
        }
        match fields_2.get(name) {
            None => {
                diffs.insert(name.clone(), DiffType::Removed);
            }
            Some(value_2) if value_2 != value_1 => {
                diffs.insert(name.clone(), DiffType::Modified);
            }
            Some(_) => {}
        }
    }

    for name in fields_2.keys() {
        if fields_1.contains_key(name) || ignore.is_ignored(layer, name) {
            continue;
        }
        diffs.insert(name.clone(), DiffType::Added);
    }

    diffs
}

/// Mark every field of a one-sided layer with the same classification.
pub(crate) fn mark_all(fields: &Fields, diff_type: DiffType) -> FieldDiffs {
    fields
        .keys()
        .map(|name| (name.clone(), diff_type))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{compare_fields, mark_all};
    use crate::config::IgnoreSet;
    use crate::model::{FieldValue, Fields};
    use crate::DiffType;

    fn fields(entries: &[(&str, FieldValue)]) -> Fields {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn classifies_added_removed_modified() {
        let one = fields(&[
            ("ttl", FieldValue::Int(64)),
            ("id", FieldValue::Int(1)),
            ("src", FieldValue::Text("10.0.0.1".into())),
        ]);
        let two = fields(&[
            ("ttl", FieldValue::Int(32)),
            ("src", FieldValue::Text("10.0.0.1".into())),
            ("flags", FieldValue::Int(2)),
        ]);

        let diffs = compare_fields(Some("ip"), &one, &two, &IgnoreSet::empty());
        assert_eq!(diffs.len(), 3);
        assert_eq!(diffs["ttl"], DiffType::Modified);
        assert_eq!(diffs["id"], DiffType::Removed);
        assert_eq!(diffs["flags"], DiffType::Added);
        assert!(!diffs.contains_key("src"));
    }

    #[test]
    fn swapping_sides_swaps_added_and_removed() {
        let one = fields(&[("a", FieldValue::Int(1))]);
        let two = fields(&[("b", FieldValue::Int(1))]);
        let ignore = IgnoreSet::empty();

        let forward = compare_fields(None, &one, &two, &ignore);
        let backward = compare_fields(None, &two, &one, &ignore);
        assert_eq!(forward["a"], DiffType::Removed);
        assert_eq!(forward["b"], DiffType::Added);
        assert_eq!(backward["a"], DiffType::Added);
        assert_eq!(backward["b"], DiffType::Removed);
    }

    #[test]
    fn values_of_different_kinds_are_modified() {
        let one = fields(&[("len", FieldValue::Int(1))]);
        let two = fields(&[("len", FieldValue::Float(1.0))]);
        let diffs = compare_fields(None, &one, &two, &IgnoreSet::empty());
        assert_eq!(diffs["len"], DiffType::Modified);
    }

    #[test]
    fn ignored_fields_never_reported() {
        let one = fields(&[
            ("checksum", FieldValue::Int(0x1234)),
            ("seq", FieldValue::Int(1)),
        ]);
        let two = fields(&[("seq", FieldValue::Int(1))]);
        let diffs = compare_fields(Some("tcp"), &one, &two, &IgnoreSet::default());
        assert!(diffs.is_empty());

        let diffs = compare_fields(Some("eth"), &one, &two, &IgnoreSet::default());
        assert_eq!(diffs["checksum"], DiffType::Removed);
    }

    #[test]
    fn mark_all_covers_every_field() {
        let layer = fields(&[("a", FieldValue::Int(1)), ("b", FieldValue::Int(2))]);
        let diffs = mark_all(&layer, DiffType::Added);
        assert_eq!(diffs.len(), 2);
        assert!(diffs.values().all(|diff| *diff == DiffType::Added));
    }
}
