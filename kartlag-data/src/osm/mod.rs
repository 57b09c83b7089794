//! OpenStreetMap PBF reading.
//!
//! Each input is read in up to three passes: a parallel pass collecting the
//! elements the [`PoiFilter`] accepts, a pass collecting the ways that area
//! relations refer to, and a pass resolving node coordinates those ways
//! need. Streams and compressed inputs are spooled to a temporary file first
//! so the passes can reopen them.

use std::io::Read;

use log::{info, warn};
use osmpbf::{Element, ElementReader};

mod accumulator;
mod filter;
mod ids;

use accumulator::PlaceAccumulator;
pub use filter::{FilterError, PoiFilter};

use crate::error::ReadError;
use crate::input::{InputSource, LocalInput};
use crate::reader::{PlaceReader, ReadSummary, RecordVisitor};
use crate::source::{OsmPlace, SourceFormat, SourcePlace};

/// Element counts for one PBF input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PbfSummary {
    /// Nodes seen, including dense-node entries.
    pub nodes: u64,
    /// Ways seen.
    pub ways: u64,
    /// Relations seen.
    pub relations: u64,
    /// Records produced.
    pub places: u64,
    /// Filter matches dropped for unusable geometry.
    pub discarded: u64,
}

impl PbfSummary {
    const fn combine(self, other: Self) -> Self {
        Self {
            nodes: self.nodes + other.nodes,
            ways: self.ways + other.ways,
            relations: self.relations + other.relations,
            places: self.places + other.places,
            discarded: self.discarded + other.discarded,
        }
    }
}

/// Reads POI records from OSM PBF inputs.
///
/// # Examples
/// ```no_run
/// use camino::Utf8PathBuf;
/// use kartlag_data::{PbfReader, PlaceReader, PoiFilter};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let filter = PoiFilter::parse(["amenity=cinema", "tourism"])?;
/// let mut reader = PbfReader::new(vec![Utf8PathBuf::from("oslo.osm.pbf").into()], filter);
/// let places = reader.read()?;
/// println!("Read {} places", places.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PbfReader {
    inputs: Vec<InputSource>,
    filter: PoiFilter,
}

impl PbfReader {
    /// Create a reader over `inputs`, keeping elements `filter` accepts.
    #[must_use]
    pub const fn new(inputs: Vec<InputSource>, filter: PoiFilter) -> Self {
        Self { inputs, filter }
    }
}

impl PlaceReader for PbfReader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Pbf
    }

    fn for_each_record(&mut self, visit: &mut RecordVisitor<'_>) -> Result<ReadSummary, ReadError> {
        if self.filter.is_empty() {
            warn!("POI filter is empty; no OSM elements will be kept");
        }
        let mut total = ReadSummary::default();
        for input in &mut self.inputs {
            let label = input.label().to_owned();
            let local = input.localise()?;
            let (places, summary) = read_places(&local, &label, &self.filter)?;
            info!(
                "Read {label}: {} nodes, {} ways, {} relations, {} places ({} discarded)",
                summary.nodes, summary.ways, summary.relations, summary.places, summary.discarded
            );
            let mut read = ReadSummary {
                inputs: 1,
                records: 0,
                skipped: summary.discarded,
            };
            for place in places {
                visit(SourcePlace::Osm(place))?;
                read.records += 1;
            }
            total = total.combine(read);
        }
        Ok(total)
    }
}

fn element_reader(
    local: &LocalInput,
    label: &str,
) -> Result<ElementReader<impl Read + Send>, ReadError> {
    local.open(label).map(ElementReader::new)
}

fn decode_error(label: &str) -> impl Fn(osmpbf::Error) -> ReadError + '_ {
    move |source| ReadError::Decode {
        input: label.to_owned(),
        source,
    }
}

fn read_places(
    local: &LocalInput,
    label: &str,
    filter: &PoiFilter,
) -> Result<(Vec<OsmPlace>, PbfSummary), ReadError> {
    let mut accumulator = element_reader(local, label)?
        .par_map_reduce(
            |element| {
                let mut accumulator = PlaceAccumulator::default();
                accumulator.process_element(element, filter);
                accumulator
            },
            PlaceAccumulator::default,
            PlaceAccumulator::combine,
        )
        .map_err(decode_error(label))?;

    if accumulator.has_pending_ways() {
        let accumulator_ref = &mut accumulator;
        element_reader(local, label)?
            .for_each(|element| {
                if let Element::Way(way) = element {
                    accumulator_ref.resolve_member_way(way.id(), way.refs());
                }
            })
            .map_err(decode_error(label))?;
        if accumulator.has_pending_ways() {
            warn!(
                "{label}: {} relation member ways are missing from the file",
                accumulator.pending_way_count()
            );
        }
    }

    if accumulator.has_pending_nodes() {
        let accumulator_ref = &mut accumulator;
        element_reader(local, label)?
            .for_each(|element| match element {
                Element::Node(node) => {
                    accumulator_ref.resolve_pending_node(node.id(), node.lon(), node.lat());
                }
                Element::DenseNode(node) => {
                    accumulator_ref.resolve_pending_node(node.id(), node.lon(), node.lat());
                }
                Element::Way(_) | Element::Relation(_) => {}
            })
            .map_err(decode_error(label))?;
        if accumulator.has_pending_nodes() {
            warn!(
                "{label}: skipped {} node references without coordinates",
                accumulator.pending_node_count()
            );
        }
    }

    Ok(accumulator.into_places())
}
