//! GeoJSON readers.
//!
//! [`GeoJsonFeatureReader`] treats every input as one `Feature`.
//! [`GeoJsonCollectionReader`] walks the `features` array of a
//! `FeatureCollection` one element at a time, so only the feature being
//! adapted is held in memory.

use std::fmt;
use std::io::Read;

use log::{info, warn};
use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Unexpected, Visitor};
use serde_json::Value;

use crate::error::ReadError;
use crate::input::InputSource;
use crate::reader::{PlaceReader, ReadSummary, RecordVisitor};
use crate::source::{GeoJsonFeature, GeoJsonOptions, SourceFormat, SourcePlace};

/// Reads inputs that each hold a single GeoJSON `Feature`.
#[derive(Debug)]
pub struct GeoJsonFeatureReader {
    inputs: Vec<InputSource>,
    options: GeoJsonOptions,
}

impl GeoJsonFeatureReader {
    /// Create a reader over `inputs`.
    #[must_use]
    pub const fn new(inputs: Vec<InputSource>, options: GeoJsonOptions) -> Self {
        Self { inputs, options }
    }
}

impl PlaceReader for GeoJsonFeatureReader {
    fn format(&self) -> SourceFormat {
        SourceFormat::SingleGeoJson
    }

    fn for_each_record(&mut self, visit: &mut RecordVisitor<'_>) -> Result<ReadSummary, ReadError> {
        let mut summary = ReadSummary::default();
        for input in &mut self.inputs {
            let label = input.label().to_owned();
            let feature: GeoJsonFeature =
                serde_json::from_reader(input.open()?).map_err(|source| ReadError::ParseJson {
                    input: label.clone(),
                    source,
                })?;
            summary.inputs += 1;
            match SourcePlace::from_feature(feature, &self.options) {
                Some(place) => {
                    visit(place)?;
                    summary.records += 1;
                }
                None => {
                    warn!("Skipped the feature in {label}");
                    summary.skipped += 1;
                }
            }
        }
        Ok(summary)
    }
}

/// Reads inputs that each hold a GeoJSON `FeatureCollection`.
///
/// A collection without a `features` member reads as empty. Array elements
/// that are not well-formed feature objects are skipped and counted.
#[derive(Debug)]
pub struct GeoJsonCollectionReader {
    inputs: Vec<InputSource>,
    options: GeoJsonOptions,
}

impl GeoJsonCollectionReader {
    /// Create a reader over `inputs`.
    #[must_use]
    pub const fn new(inputs: Vec<InputSource>, options: GeoJsonOptions) -> Self {
        Self { inputs, options }
    }
}

impl PlaceReader for GeoJsonCollectionReader {
    fn format(&self) -> SourceFormat {
        SourceFormat::MultiGeoJson
    }

    fn for_each_record(&mut self, visit: &mut RecordVisitor<'_>) -> Result<ReadSummary, ReadError> {
        let mut summary = ReadSummary::default();
        for input in &mut self.inputs {
            let label = input.label().to_owned();
            let read = read_collection(input.open()?, &label, &self.options, visit)?;
            info!(
                "Read {label}: {} features adapted, {} skipped",
                read.records, read.skipped
            );
            summary = summary.combine(read);
        }
        Ok(summary)
    }
}

fn read_collection<R: Read>(
    reader: R,
    label: &str,
    options: &GeoJsonOptions,
    visit: &mut RecordVisitor<'_>,
) -> Result<ReadSummary, ReadError> {
    let parse_error = |source: serde_json::Error| ReadError::ParseJson {
        input: label.to_owned(),
        source,
    };
    let mut sink = FeatureSink {
        options,
        visit,
        label,
        summary: ReadSummary {
            inputs: 1,
            ..ReadSummary::default()
        },
        stopped: None,
    };
    let mut deserializer = serde_json::Deserializer::from_reader(reader);
    let parsed = CollectionSeed(&mut sink)
        .deserialize(&mut deserializer)
        .and_then(|seen| deserializer.end().map(|()| seen));
    // A visitor error surfaces as a serde error; report the original instead.
    if let Some(error) = sink.stopped.take() {
        return Err(error);
    }
    if !parsed.map_err(parse_error)? {
        warn!("{label} has no features member");
    }
    Ok(sink.summary)
}

struct FeatureSink<'s, 'v> {
    options: &'s GeoJsonOptions,
    visit: &'s mut RecordVisitor<'v>,
    label: &'s str,
    summary: ReadSummary,
    stopped: Option<ReadError>,
}

impl FeatureSink<'_, '_> {
    fn accept(&mut self, element: Value) -> Result<(), ReadError> {
        let feature = match serde_json::from_value::<GeoJsonFeature>(element) {
            Ok(feature) => feature,
            Err(error) => {
                warn!("Skipped malformed feature in {}: {error}", self.label);
                self.summary.skipped += 1;
                return Ok(());
            }
        };
        match SourcePlace::from_feature(feature, self.options) {
            Some(place) => {
                (self.visit)(place)?;
                self.summary.records += 1;
            }
            None => self.summary.skipped += 1,
        }
        Ok(())
    }
}

/// Visits the top-level collection object; yields whether `features` was present.
struct CollectionSeed<'a, 's, 'v>(&'a mut FeatureSink<'s, 'v>);

impl<'de> DeserializeSeed<'de> for CollectionSeed<'_, '_, '_> {
    type Value = bool;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for CollectionSeed<'_, '_, '_> {
    type Value = bool;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a GeoJSON FeatureCollection object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut saw_features = false;
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "type" => {
                    let kind: String = map.next_value()?;
                    if kind != "FeatureCollection" {
                        return Err(de::Error::invalid_value(
                            Unexpected::Str(&kind),
                            &"FeatureCollection",
                        ));
                    }
                }
                "features" => {
                    map.next_value_seed(FeaturesSeed(&mut *self.0))?;
                    saw_features = true;
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(saw_features)
    }
}

struct FeaturesSeed<'a, 's, 'v>(&'a mut FeatureSink<'s, 'v>);

impl<'de> DeserializeSeed<'de> for FeaturesSeed<'_, '_, '_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for FeaturesSeed<'_, '_, '_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an array of GeoJSON features")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(element) = seq.next_element::<Value>()? {
            if let Err(error) = self.0.accept(element) {
                self.0.stopped = Some(error);
                return Err(de::Error::custom("record visitor stopped"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::source::PlaceRecord;

    fn collection_reader(json: &'static str) -> GeoJsonCollectionReader {
        GeoJsonCollectionReader::new(
            vec![InputSource::stream("memory.geojson", json.as_bytes())],
            GeoJsonOptions::default(),
        )
    }

    #[rstest]
    fn streams_features_in_order() {
        let mut reader = collection_reader(
            r#"{"type":"FeatureCollection","name":"test","features":[
                {"type":"Feature","id":"a","properties":{"name":"Alpha"},"geometry":{"type":"Point","coordinates":[10.0,59.0]}},
                {"type":"Feature","properties":{"name":"No id"},"geometry":null},
                {"type":"Feature","id":2,"properties":{"name":"Beta"},"geometry":null},
                "not a feature"
            ],"bbox":[0,0,1,1]}"#,
        );

        let mut ids = Vec::new();
        let summary = reader
            .for_each_record(&mut |place| {
                ids.push(place.id().to_owned());
                Ok(())
            })
            .expect("collection reads");

        assert_eq!(ids, ["a", "2"]);
        assert_eq!(summary.records, 2);
        assert_eq!(summary.skipped, 2);
    }

    #[rstest]
    fn visitor_error_stops_the_read() {
        let mut reader = collection_reader(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","id":"a","properties":{}},
                {"type":"Feature","id":"b","properties":{}}
            ]}"#,
        );

        let mut seen = 0;
        let err = reader
            .for_each_record(&mut |_| {
                seen += 1;
                Err(ReadError::SinkClosed)
            })
            .expect_err("visitor refuses records");

        assert!(matches!(err, ReadError::SinkClosed));
        assert_eq!(seen, 1);
    }

    #[rstest]
    #[case(r#"{"type":"Feature","features":[]}"#)]
    #[case(r#"{"type":"FeatureCollection","features":[}"#)]
    #[case(r#"[]"#)]
    fn malformed_collections_fail_to_parse(#[case] json: &'static str) {
        let err = collection_reader(json).read().expect_err("input is malformed");

        assert!(matches!(err, ReadError::ParseJson { ref input, .. } if input == "memory.geojson"));
    }

    #[rstest]
    fn collection_without_features_reads_empty() {
        let places = collection_reader(r#"{"type":"FeatureCollection"}"#)
            .read()
            .expect("empty collection reads");

        assert!(places.is_empty());
    }

    #[rstest]
    fn single_feature_reader_skips_rejected_features() {
        let mut reader = GeoJsonFeatureReader::new(
            vec![
                InputSource::stream(
                    "one.geojson",
                    &br#"{"type":"Feature","id":"n1","properties":{"name":"Nordre"}}"#[..],
                ),
                InputSource::stream(
                    "two.geojson",
                    &br#"{"type":"Feature","properties":{"placeType":"Planet"}}"#[..],
                ),
            ],
            GeoJsonOptions::default(),
        );

        let mut names = Vec::new();
        let summary = reader
            .for_each_record(&mut |place| {
                names.push(place.name().map(str::to_owned));
                Ok(())
            })
            .expect("both inputs parse");

        assert_eq!(names, [Some("Nordre".to_owned())]);
        assert_eq!(
            summary,
            ReadSummary {
                inputs: 2,
                records: 1,
                skipped: 1
            }
        );
    }
}
