//! Internal accumulator for PBF reading.
//!
//! Collects filter-matching elements during the parallel pass, then the
//! member ways and node coordinates their geometries need during the
//! resolution passes.
use std::collections::{BTreeMap, HashMap, HashSet};

use geo::{Centroid, Contains, Coord, LineString, Point, Polygon};
use kartlag_core::geometry::{validated_coord, validated_polygon};
use kartlag_core::{GeometryError, PlaceGeometry};
use log::debug;
use osmpbf::{Element, RelMemberType};
use thiserror::Error;

use super::PbfSummary;
use super::filter::PoiFilter;
use super::ids::{OsmElementKind, decode_element_id, encode_element_id};
use crate::source::OsmPlace;

#[derive(Debug, Default)]
pub(super) struct PlaceAccumulator {
    summary: PbfSummary,
    nodes: HashMap<u64, Coord<f64>>,
    pending_nodes: HashSet<u64>,
    member_ways: HashMap<u64, Vec<u64>>,
    pending_ways: HashSet<u64>,
    candidates: Vec<Candidate>,
}

impl PlaceAccumulator {
    pub(super) fn process_element(&mut self, element: Element<'_>, filter: &PoiFilter) {
        match element {
            Element::Node(node) => self.process_node(
                filter,
                node.id(),
                node.lon(),
                node.lat(),
                node.tags(),
                node.tags(),
            ),
            Element::DenseNode(node) => self.process_node(
                filter,
                node.id(),
                node.lon(),
                node.lat(),
                node.tags(),
                node.tags(),
            ),
            Element::Way(way) => self.process_way(filter, &way),
            Element::Relation(relation) => self.process_relation(filter, &relation),
        }
    }

    fn process_node<'a, R, C>(
        &mut self,
        filter: &PoiFilter,
        raw_id: i64,
        lon: f64,
        lat: f64,
        relevance_tags: R,
        tags: C,
    ) where
        R: IntoIterator<Item = (&'a str, &'a str)>,
        C: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.summary.nodes += 1;
        let Some(encoded_id) = encode_element_id(OsmElementKind::Node, raw_id) else {
            return;
        };
        let is_relevant = filter.matches(relevance_tags);
        let was_pending = self.pending_nodes.remove(&encoded_id);
        if !is_relevant && !was_pending {
            return;
        }
        let Ok(location) = validated_coord(lon, lat) else {
            if is_relevant {
                self.summary.discarded += 1;
            }
            return;
        };
        self.nodes.insert(encoded_id, location);
        if is_relevant {
            let tags = collect_tags(tags);
            let categories = filter.categories(
                tags.iter()
                    .map(|(key, value)| (key.as_str(), value.as_str())),
            );
            self.candidates.push(Candidate {
                id: encoded_id,
                tags,
                categories,
                shape: CandidateShape::Node(location),
            });
        }
    }

    fn process_way(&mut self, filter: &PoiFilter, way: &osmpbf::Way<'_>) {
        self.summary.ways += 1;
        if !filter.matches(way.tags()) {
            return;
        }
        let Some(encoded_id) = encode_element_id(OsmElementKind::Way, way.id()) else {
            return;
        };
        let node_refs: Vec<u64> = way
            .refs()
            .filter_map(|node_id| encode_element_id(OsmElementKind::Node, node_id))
            .collect();
        self.mark_pending_nodes(&node_refs);
        self.candidates.push(Candidate {
            id: encoded_id,
            tags: collect_tags(way.tags()),
            categories: filter.categories(way.tags()),
            shape: CandidateShape::Way(node_refs),
        });
    }

    fn process_relation(&mut self, filter: &PoiFilter, relation: &osmpbf::Relation<'_>) {
        self.summary.relations += 1;
        if !filter.matches(relation.tags()) {
            return;
        }
        let Some(encoded_id) = encode_element_id(OsmElementKind::Relation, relation.id()) else {
            return;
        };
        let is_area = relation
            .tags()
            .any(|(key, value)| key == "type" && matches!(value, "multipolygon" | "boundary"));
        if !is_area {
            debug!(
                "Discarded relation {}: only multipolygon and boundary relations carry areas",
                relation.id()
            );
            self.summary.discarded += 1;
            return;
        }
        let members: Vec<AreaMember> = relation
            .members()
            .filter(|member| member.member_type == RelMemberType::Way)
            .filter_map(|member| {
                let way = encode_element_id(OsmElementKind::Way, member.member_id)?;
                let inner = member.role().is_ok_and(|role| role == "inner");
                Some(AreaMember { way, inner })
            })
            .collect();
        self.pending_ways
            .extend(members.iter().map(|member| member.way));
        self.candidates.push(Candidate {
            id: encoded_id,
            tags: collect_tags(relation.tags()),
            categories: filter.categories(relation.tags()),
            shape: CandidateShape::Relation(members),
        });
    }

    fn mark_pending_nodes(&mut self, node_refs: &[u64]) {
        for node_id in node_refs {
            if !self.nodes.contains_key(node_id) {
                self.pending_nodes.insert(*node_id);
            }
        }
    }

    pub(super) fn combine(mut self, other: Self) -> Self {
        self.summary = self.summary.combine(other.summary);
        for (id, coord) in other.nodes {
            self.nodes.entry(id).or_insert(coord);
        }
        self.candidates.extend(other.candidates);
        self.member_ways.extend(other.member_ways);
        self.pending_ways.extend(other.pending_ways);
        self.pending_nodes.extend(other.pending_nodes);
        self.pending_nodes
            .retain(|node_id| !self.nodes.contains_key(node_id));
        self
    }

    pub(super) fn has_pending_ways(&self) -> bool {
        !self.pending_ways.is_empty()
    }

    pub(super) fn pending_way_count(&self) -> usize {
        self.pending_ways.len()
    }

    pub(super) fn has_pending_nodes(&self) -> bool {
        !self.pending_nodes.is_empty()
    }

    pub(super) fn pending_node_count(&self) -> usize {
        self.pending_nodes.len()
    }

    /// Record the node list of a way some relation refers to.
    pub(super) fn resolve_member_way<I>(&mut self, raw_id: i64, refs: I)
    where
        I: IntoIterator<Item = i64>,
    {
        let Some(encoded_id) = encode_element_id(OsmElementKind::Way, raw_id) else {
            return;
        };
        if !self.pending_ways.remove(&encoded_id) {
            return;
        }
        let node_refs: Vec<u64> = refs
            .into_iter()
            .filter_map(|node_id| encode_element_id(OsmElementKind::Node, node_id))
            .collect();
        self.mark_pending_nodes(&node_refs);
        self.member_ways.insert(encoded_id, node_refs);
    }

    pub(super) fn resolve_pending_node(&mut self, raw_id: i64, lon: f64, lat: f64) {
        let Some(encoded_id) = encode_element_id(OsmElementKind::Node, raw_id) else {
            return;
        };
        if !self.pending_nodes.remove(&encoded_id) {
            return;
        }
        if let Ok(location) = validated_coord(lon, lat) {
            self.nodes.insert(encoded_id, location);
        }
    }

    /// Build records for every candidate whose geometry resolves, in id order.
    pub(super) fn into_places(self) -> (Vec<OsmPlace>, PbfSummary) {
        let Self {
            mut summary,
            nodes,
            member_ways,
            mut candidates,
            ..
        } = self;
        candidates.sort_by_key(|candidate| candidate.id);
        let resolver = ShapeResolver {
            nodes: &nodes,
            member_ways: &member_ways,
        };
        let mut places = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let element = decode_element_id(candidate.id);
            match resolver.geometry(&candidate.shape) {
                Ok(geometry) => places.push(OsmPlace::new(
                    element,
                    candidate.tags,
                    candidate.categories,
                    Some(geometry),
                )),
                Err(reason) => {
                    debug!("Discarded {element}: {reason}");
                    summary.discarded += 1;
                }
            }
        }
        summary.places = places.len() as u64;
        (places, summary)
    }
}

#[derive(Debug)]
struct Candidate {
    id: u64,
    tags: BTreeMap<String, String>,
    categories: Vec<String>,
    shape: CandidateShape,
}

#[derive(Debug)]
enum CandidateShape {
    Node(Coord<f64>),
    Way(Vec<u64>),
    Relation(Vec<AreaMember>),
}

#[derive(Debug, Clone, Copy)]
struct AreaMember {
    way: u64,
    inner: bool,
}

#[derive(Debug, Error)]
enum ShapeError {
    #[error("{missing} referenced nodes have no coordinates")]
    MissingNodes { missing: usize },
    #[error("member way {0} was not found")]
    MissingWay(u64),
    #[error("no closed outer ring could be assembled")]
    NoOuterRing,
    #[error("way has fewer than two resolvable nodes")]
    TooShort,
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

struct ShapeResolver<'a> {
    nodes: &'a HashMap<u64, Coord<f64>>,
    member_ways: &'a HashMap<u64, Vec<u64>>,
}

impl ShapeResolver<'_> {
    fn geometry(&self, shape: &CandidateShape) -> Result<PlaceGeometry, ShapeError> {
        match shape {
            CandidateShape::Node(coord) => Ok(PlaceGeometry::point(coord.x, coord.y)?),
            CandidateShape::Way(node_refs) => self.way_geometry(node_refs),
            CandidateShape::Relation(members) => self.relation_geometry(members),
        }
    }

    fn coords(&self, node_refs: &[u64]) -> Result<Vec<Coord<f64>>, ShapeError> {
        let coords: Vec<Coord<f64>> = node_refs
            .iter()
            .filter_map(|node_id| self.nodes.get(node_id).copied())
            .collect();
        match node_refs.len() - coords.len() {
            0 => Ok(coords),
            missing => Err(ShapeError::MissingNodes { missing }),
        }
    }

    /// Closed ways become polygons; open ways collapse to their centroid.
    fn way_geometry(&self, node_refs: &[u64]) -> Result<PlaceGeometry, ShapeError> {
        let coords = self.coords(node_refs)?;
        if is_closed(node_refs) && node_refs.len() >= 4 {
            return Ok(PlaceGeometry::polygon(coords, Vec::new())?);
        }
        if coords.len() < 2 {
            return Err(ShapeError::TooShort);
        }
        let centroid = LineString::new(coords)
            .centroid()
            .ok_or(ShapeError::TooShort)?;
        Ok(PlaceGeometry::point(centroid.x(), centroid.y())?)
    }

    fn relation_geometry(&self, members: &[AreaMember]) -> Result<PlaceGeometry, ShapeError> {
        let mut outer_ways = Vec::new();
        let mut inner_ways = Vec::new();
        for member in members {
            let node_refs = self
                .member_ways
                .get(&member.way)
                .ok_or(ShapeError::MissingWay(member.way))?;
            if member.inner {
                inner_ways.push(node_refs.as_slice());
            } else {
                outer_ways.push(node_refs.as_slice());
            }
        }

        let mut shells: Vec<Shell> = Vec::new();
        for ring in assemble_rings(outer_ways) {
            let exterior = self.coords(&ring)?;
            let outline = Polygon::new(LineString::new(exterior.clone()), Vec::new());
            shells.push(Shell {
                exterior,
                outline,
                holes: Vec::new(),
            });
        }
        if shells.is_empty() {
            return Err(ShapeError::NoOuterRing);
        }
        for ring in assemble_rings(inner_ways) {
            let hole = self.coords(&ring)?;
            let Some(anchor) = hole.first().copied() else {
                continue;
            };
            // Holes outside every outer ring are dropped.
            if let Some(shell) = shells
                .iter_mut()
                .find(|shell| shell.outline.contains(&Point::from(anchor)))
            {
                shell.holes.push(hole);
            }
        }

        let mut polygons = Vec::with_capacity(shells.len());
        for shell in shells {
            match validated_polygon(shell.exterior, shell.holes) {
                Ok(polygon) => polygons.push(polygon),
                Err(error) => debug!("Dropped relation ring: {error}"),
            }
        }
        Ok(PlaceGeometry::multi_polygon(polygons)?)
    }
}

struct Shell {
    exterior: Vec<Coord<f64>>,
    outline: Polygon<f64>,
    holes: Vec<Vec<Coord<f64>>>,
}

fn is_closed(node_refs: &[u64]) -> bool {
    node_refs.first().is_some() && node_refs.first() == node_refs.last()
}

/// Join member ways end to end into closed rings; rings that cannot close are dropped.
fn assemble_rings(ways: Vec<&[u64]>) -> Vec<Vec<u64>> {
    let mut remaining: Vec<&[u64]> = ways.into_iter().filter(|way| way.len() >= 2).collect();
    let mut rings = Vec::new();
    while !remaining.is_empty() {
        let mut ring: Vec<u64> = remaining.remove(0).to_vec();
        let closed = loop {
            if is_closed(&ring) {
                break true;
            }
            let Some(tail) = ring.last().copied() else {
                break false;
            };
            let Some(index) = remaining
                .iter()
                .position(|way| way.first() == Some(&tail) || way.last() == Some(&tail))
            else {
                break false;
            };
            let next = remaining.swap_remove(index);
            if next.first() == Some(&tail) {
                ring.extend(next.iter().skip(1));
            } else {
                ring.extend(next.iter().rev().skip(1));
            }
        };
        if closed && ring.len() >= 4 {
            rings.push(ring);
        } else {
            debug!("Dropped open ring of {} nodes", ring.len());
        }
    }
    rings
}

fn collect_tags<'a, I>(tags: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    tags.into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(vec![vec![1, 2, 3], vec![3, 4, 1]], vec![vec![1, 2, 3, 4, 1]])]
    #[case(vec![vec![1, 2, 3], vec![1, 4, 3]], vec![vec![1, 2, 3, 4, 1]])]
    #[case(vec![vec![1, 2, 3, 1]], vec![vec![1, 2, 3, 1]])]
    #[case(vec![vec![1, 2, 3], vec![5, 6]], vec![])]
    fn joins_member_ways_into_rings(#[case] ways: Vec<Vec<u64>>, #[case] expected: Vec<Vec<u64>>) {
        let ways: Vec<&[u64]> = ways.iter().map(Vec::as_slice).collect();

        assert_eq!(assemble_rings(ways), expected);
    }

    fn resolver_nodes() -> HashMap<u64, Coord<f64>> {
        [
            (1, Coord { x: 10.0, y: 59.0 }),
            (2, Coord { x: 10.1, y: 59.0 }),
            (3, Coord { x: 10.1, y: 59.1 }),
            (4, Coord { x: 10.0, y: 59.1 }),
        ]
        .into_iter()
        .collect()
    }

    #[rstest]
    fn closed_way_becomes_polygon() {
        let nodes = resolver_nodes();
        let member_ways = HashMap::new();
        let resolver = ShapeResolver {
            nodes: &nodes,
            member_ways: &member_ways,
        };

        let geometry = resolver
            .geometry(&CandidateShape::Way(vec![1, 2, 3, 4, 1]))
            .expect("closed way resolves");

        assert!(geometry.has_shape());
    }

    #[rstest]
    fn open_way_collapses_to_centroid() {
        let nodes = resolver_nodes();
        let member_ways = HashMap::new();
        let resolver = ShapeResolver {
            nodes: &nodes,
            member_ways: &member_ways,
        };

        let geometry = resolver
            .geometry(&CandidateShape::Way(vec![1, 2]))
            .expect("open way resolves");

        let PlaceGeometry::Point(point) = geometry else {
            panic!("expected a point, got {geometry:?}");
        };
        assert!((point.x() - 10.05).abs() < 1e-9);
        assert!((point.y() - 59.0).abs() < 1e-9);
    }

    #[rstest]
    fn missing_nodes_discard_the_way() {
        let nodes = resolver_nodes();
        let member_ways = HashMap::new();
        let resolver = ShapeResolver {
            nodes: &nodes,
            member_ways: &member_ways,
        };

        let err = resolver
            .geometry(&CandidateShape::Way(vec![1, 2, 99]))
            .expect_err("node 99 is unknown");

        assert!(matches!(err, ShapeError::MissingNodes { missing: 1 }));
    }

    #[rstest]
    fn relation_without_outer_ring_is_discarded() {
        let nodes = resolver_nodes();
        let member_ways = [(7, vec![1, 2, 3])].into_iter().collect();
        let resolver = ShapeResolver {
            nodes: &nodes,
            member_ways: &member_ways,
        };

        let err = resolver
            .geometry(&CandidateShape::Relation(vec![AreaMember {
                way: 7,
                inner: false,
            }]))
            .expect_err("ring never closes");

        assert!(matches!(err, ShapeError::NoOuterRing));
    }
}
