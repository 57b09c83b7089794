//! Source records to canonical places.

use kartlag_core::{
    CanonicalPlace, ParentSlot, PlaceNames, PlaceType, StopAttributes, StopMode,
};
use log::debug;

use crate::hierarchy::PlaceHierarchy;
use crate::source::PlaceRecord;

/// Mapper settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MapperConfig {
    /// Slot receiving a standalone record's `parent_id`; `None` drops it.
    pub parent_slot: Option<ParentSlot>,
}

/// Counters gathered while mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MapperStats {
    /// Places produced.
    pub mapped: u64,
    /// Records dropped because they reported themselves invalid.
    pub dropped_invalid: u64,
    /// Places flagged low quality for lacking a primary name.
    pub low_quality: u64,
}

/// Converts source records into [`CanonicalPlace`]s.
#[derive(Debug, Default)]
pub struct CanonicalMapper {
    config: MapperConfig,
    stats: MapperStats,
}

impl CanonicalMapper {
    /// Create a mapper.
    #[must_use]
    pub fn new(config: MapperConfig) -> Self {
        Self {
            config,
            stats: MapperStats::default(),
        }
    }

    /// Counters accumulated so far.
    #[must_use]
    pub const fn stats(&self) -> MapperStats {
        self.stats
    }

    /// Map one standalone record; `None` when the record is invalid.
    ///
    /// # Examples
    /// ```
    /// use kartlag_core::ParentSlot;
    /// use kartlag_data::{
    ///     CanonicalMapper, GeoJsonFeature, GeoJsonOptions, MapperConfig, SourcePlace,
    /// };
    ///
    /// let json = serde_json::json!({
    ///     "type": "Feature",
    ///     "id": "0301",
    ///     "properties": { "placeType": "locality", "parentId": "03" },
    /// });
    /// let feature: GeoJsonFeature = serde_json::from_value(json)?;
    /// let record = SourcePlace::from_feature(feature, &GeoJsonOptions::default()).expect("adapted");
    ///
    /// let mut mapper = CanonicalMapper::new(MapperConfig {
    ///     parent_slot: Some(ParentSlot::County),
    /// });
    /// let place = mapper.to_canonical_place(&record).expect("valid record");
    /// assert_eq!(place.parent.county_id.as_deref(), Some("03"));
    /// assert!(place.low_quality, "the feature has no name");
    /// # Ok::<(), serde_json::Error>(())
    /// ```
    pub fn to_canonical_place<R: PlaceRecord + ?Sized>(
        &mut self,
        record: &R,
    ) -> Option<CanonicalPlace> {
        let parent = self.config.parent_slot.zip(record.parent_id());
        self.build(record, parent)
    }

    /// Map a hierarchy: the root first, then each child linked to it by id.
    ///
    /// Children link through the slot the root's type implies, falling back
    /// to the configured slot. A stop place root gathers its own mode and
    /// every child's mode.
    pub fn to_canonical_places<R: PlaceRecord>(
        &mut self,
        hierarchy: &PlaceHierarchy<R>,
    ) -> Vec<CanonicalPlace> {
        let root = hierarchy.root();
        let mut places = Vec::with_capacity(1 + hierarchy.children().len());
        if let Some(mut place) = self.to_canonical_place(root) {
            if let Some(stop) = place.stop.as_mut() {
                stop.modes
                    .extend(hierarchy.children().iter().map(stop_mode_of));
            }
            places.push(place);
        }
        let child_slot = root
            .place_type()
            .child_parent_slot()
            .or(self.config.parent_slot);
        for child in hierarchy.children() {
            let parent = child_slot.map(|slot| (slot, root.id()));
            places.extend(self.build(child, parent));
        }
        places
    }

    fn build<R: PlaceRecord + ?Sized>(
        &mut self,
        record: &R,
        parent: Option<(ParentSlot, &str)>,
    ) -> Option<CanonicalPlace> {
        if !record.is_valid() {
            debug!("Dropped invalid record {} from {}", record.id(), record.source());
            self.stats.dropped_invalid += 1;
            return None;
        }
        let mut place = CanonicalPlace::new(record.id(), record.source(), record.place_type());
        place.names = PlaceNames::new(record.name().map(str::to_owned), record.alternative_names());
        if place.names.default.is_none() {
            place.low_quality = true;
            self.stats.low_quality += 1;
        }
        for category in record.categories() {
            place.push_category(category);
        }
        if let Some((slot, id)) = parent {
            place.parent.set(slot, id);
        }
        place.geometry = record.default_geometry().cloned();
        record.country_ref().clone_into(&mut place.country_ref);
        place.iso_code = record.iso_code().map(str::to_owned);
        if place.place_type == PlaceType::StopPlace {
            place.stop = Some(StopAttributes {
                modes: vec![stop_mode_of(record)],
                interchange: record.interchange_weighting(),
            });
        }
        self.stats.mapped += 1;
        Some(place)
    }
}

fn stop_mode_of<R: PlaceRecord + ?Sized>(record: &R) -> StopMode {
    StopMode::new(record.stop_place_type(), record.sub_mode())
}
