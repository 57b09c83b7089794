//! Collapse records that describe the same real-world place.

use std::cmp::Ordering;
use std::collections::HashMap;

use log::debug;

use crate::source::PlaceRecord;

/// Keep one record per correlation key.
///
/// `key_property` and `comparator_property` are looked up with
/// [`PlaceRecord::property`]. For each key the record with the strictly
/// greatest comparator wins, so ties keep the record seen first. When the
/// comparator is missing on both records the newer one replaces the older;
/// when it is missing on one, the record that has it wins. Values of
/// different kinds do not compare and keep the existing record. Records
/// without a key are passed through.
///
/// Output follows the order in which each key (or keyless record) was first
/// seen. The whole input is consumed before anything is returned.
///
/// # Examples
/// ```
/// use kartlag_data::{GeoJsonFeature, GeoJsonOptions, PlaceRecord, SourcePlace, deduplicate};
///
/// let feature = |id: &str, area: f64| {
///     let json = serde_json::json!({
///         "type": "Feature",
///         "id": id,
///         "properties": { "ref": "X", "area": area },
///     });
///     let feature: GeoJsonFeature = serde_json::from_value(json).expect("valid feature");
///     SourcePlace::from_feature(feature, &GeoJsonOptions::default()).expect("adapted")
/// };
///
/// let kept = deduplicate(vec![feature("small", 5.0), feature("large", 20.0)], "ref", "area");
/// assert_eq!(kept.len(), 1);
/// assert_eq!(kept[0].id(), "large");
/// ```
#[must_use]
pub fn deduplicate<T, I>(records: I, key_property: &str, comparator_property: &str) -> Vec<T>
where
    T: PlaceRecord,
    I: IntoIterator<Item = T>,
{
    let mut kept: Vec<T> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut seen = 0_usize;
    for record in records {
        seen += 1;
        let Some(key) = record.property(key_property).map(|value| value.to_string()) else {
            kept.push(record);
            continue;
        };
        match by_key.get(&key) {
            None => {
                by_key.insert(key, kept.len());
                kept.push(record);
            }
            Some(&slot) => {
                if replaces(&kept[slot], &record, comparator_property) {
                    kept[slot] = record;
                }
            }
        }
    }
    debug!(
        "Deduplicated {seen} records on {key_property:?} by {comparator_property:?}: kept {}",
        kept.len()
    );
    kept
}

fn replaces<T: PlaceRecord>(existing: &T, candidate: &T, comparator_property: &str) -> bool {
    match (
        existing.property(comparator_property),
        candidate.property(comparator_property),
    ) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(current), Some(challenger)) => {
            challenger.compare(&current) == Some(Ordering::Greater)
        }
    }
}
