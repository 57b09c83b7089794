//! Line-level SOSI parsing.
//!
//! A SOSI file is a sequence of dotted lines (`..NAVN "Tromsø"`) where the
//! number of leading dots is the nesting level, interleaved with bare data
//! lines holding coordinates or curve references. Level one opens a section:
//! `.HODE`, an object such as `.PUNKT 12:`, or the closing `.SLUTT`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufRead;

use geo::Coord;
use kartlag_core::PlaceGeometry;
use log::{debug, warn};

use super::utm::CoordinateSystem;
use crate::error::ReadError;
use crate::source::{SurveyObjectKind, SurveyPlace};

/// One classified input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Line<'a> {
    Dotted {
        level: usize,
        keyword: &'a str,
        value: &'a str,
    },
    Data(&'a str),
    Blank,
}

/// Split a line into level, keyword and value, dropping `!` comments.
pub(super) fn classify(raw: &str) -> Line<'_> {
    let line = strip_comment(raw).trim();
    if line.is_empty() {
        return Line::Blank;
    }
    let body = line.trim_start_matches('.');
    let level = line.len() - body.len();
    if level == 0 {
        return Line::Data(line);
    }
    let (keyword, value) = body
        .split_once(char::is_whitespace)
        .map_or((body, ""), |(keyword, value)| (keyword, value.trim()));
    Line::Dotted {
        level,
        keyword,
        value: unquote(value),
    }
}

fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    for (index, ch) in line.char_indices() {
        match (quote, ch) {
            (None, '"' | '\'') => quote = Some(ch),
            (Some(open), _) if open == ch => quote = None,
            (None, '!') => return &line[..index],
            _ => {}
        }
    }
    line
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|quote| {
            value
                .strip_prefix(*quote)
                .and_then(|inner| inner.strip_suffix(*quote))
        })
        .unwrap_or(value)
}

/// Read `reader` line by line, decoding Latin-1 when a line is not UTF-8.
pub(super) fn for_each_line<R, F>(mut reader: R, label: &str, mut visit: F) -> Result<(), ReadError>
where
    R: BufRead,
    F: FnMut(usize, &str) -> Result<bool, ReadError>,
{
    let mut buffer = Vec::new();
    let mut number = 0;
    loop {
        buffer.clear();
        let read = reader
            .read_until(b'\n', &mut buffer)
            .map_err(|source| ReadError::SurveyIo {
                input: label.to_owned(),
                source,
            })?;
        if read == 0 {
            return Ok(());
        }
        number += 1;
        let line = match std::str::from_utf8(&buffer) {
            Ok(text) => Cow::Borrowed(text),
            Err(_) => Cow::Owned(buffer.iter().copied().map(char::from).collect()),
        };
        if !visit(number, &line)? {
            return Ok(());
        }
    }
}

/// A curve used by a surface; `reversed` curves are walked end to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct CurveRef {
    pub(super) serial: u64,
    pub(super) reversed: bool,
}

/// The `REF` list of a surface: outer boundary curves plus one group per hole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct RefList {
    pub(super) outer: Vec<CurveRef>,
    pub(super) holes: Vec<Vec<CurveRef>>,
    open_hole: Option<Vec<CurveRef>>,
}

impl RefList {
    /// Parse reference tokens such as `:3 :-5 (:8 :9)`; may span several lines.
    pub(super) fn extend_from(&mut self, text: &str) -> Result<(), String> {
        for token in text.split_whitespace() {
            let mut rest = token;
            if let Some(stripped) = rest.strip_prefix('(') {
                if self.open_hole.is_some() {
                    return Err(format!("nested hole in REF token {token}"));
                }
                self.open_hole = Some(Vec::new());
                rest = stripped;
            }
            let closes = rest.ends_with(')');
            rest = rest.trim_end_matches(')');
            for part in rest.split(':').filter(|part| !part.is_empty()) {
                let raw: i64 = part
                    .parse()
                    .map_err(|_| format!("invalid REF token {token}"))?;
                let curve = CurveRef {
                    serial: raw.unsigned_abs(),
                    reversed: raw < 0,
                };
                match &mut self.open_hole {
                    Some(hole) => hole.push(curve),
                    None => self.outer.push(curve),
                }
            }
            if closes {
                let hole = self
                    .open_hole
                    .take()
                    .ok_or_else(|| format!("unbalanced ')' in REF token {token}"))?;
                self.holes.push(hole);
            }
        }
        Ok(())
    }

    pub(super) fn curves(&self) -> impl Iterator<Item = &CurveRef> {
        self.outer.iter().chain(self.holes.iter().flatten())
    }
}

/// Count how many surfaces refer to each curve.
pub(super) fn referenced_curves<R: BufRead>(
    reader: R,
    label: &str,
) -> Result<HashMap<u64, usize>, ReadError> {
    let mut uses: HashMap<u64, usize> = HashMap::new();
    let mut in_surface = false;
    let mut refs: Option<RefList> = None;
    let flush = |refs: &mut Option<RefList>, uses: &mut HashMap<u64, usize>| {
        if let Some(list) = refs.take() {
            for curve in list.curves() {
                *uses.entry(curve.serial).or_default() += 1;
            }
        }
    };
    for_each_line(reader, label, |number, raw| {
        let survey_error = |message: String| ReadError::Survey {
            input: label.to_owned(),
            line: number,
            message,
        };
        match classify(raw) {
            Line::Blank => {}
            Line::Data(text) => {
                if let Some(list) = refs.as_mut() {
                    list.extend_from(text).map_err(survey_error)?;
                }
            }
            Line::Dotted { level, keyword, value } => {
                if level <= 2 {
                    flush(&mut refs, &mut uses);
                }
                if level == 1 {
                    in_surface = keyword == "FLATE";
                    if keyword == "SLUTT" {
                        return Ok(false);
                    }
                } else if level == 2 && in_surface && keyword == "REF" {
                    let mut list = RefList::default();
                    list.extend_from(value).map_err(survey_error)?;
                    refs = Some(list);
                }
            }
        }
        Ok(true)
    })?;
    flush(&mut refs, &mut uses);
    Ok(uses)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataMode {
    None,
    Coordinates,
    Refs,
}

#[derive(Debug)]
struct ObjectBuilder {
    kind: SurveyObjectKind,
    serial: u64,
    path: Vec<String>,
    attributes: Vec<(String, String)>,
    coords: Vec<Coord<f64>>,
    refs: RefList,
    mode: DataMode,
}

impl ObjectBuilder {
    fn new(kind: SurveyObjectKind, serial: u64) -> Self {
        Self {
            kind,
            serial,
            path: Vec::new(),
            attributes: Vec::new(),
            coords: Vec::new(),
            refs: RefList::default(),
            mode: DataMode::None,
        }
    }
}

#[derive(Debug)]
enum Section {
    Preamble,
    Header(Vec<String>, Vec<(String, String)>),
    Object(ObjectBuilder),
    Skipped,
    Ended,
}

#[derive(Debug)]
struct StoredCurve {
    coords: Vec<Coord<f64>>,
    remaining_uses: usize,
}

fn survey_error(label: &str, line: usize, message: impl Into<String>) -> ReadError {
    ReadError::Survey {
        input: label.to_owned(),
        line,
        message: message.into(),
    }
}

/// Callback receiving finished objects.
pub(super) type ObjectSink<'a> = dyn FnMut(SurveyPlace) -> Result<(), ReadError> + 'a;

/// Counts from one parse.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) struct ParseStats {
    pub(super) emitted: u64,
    pub(super) skipped: u64,
    pub(super) unresolved: u64,
}

/// Streaming object assembler for the second pass.
#[derive(Debug)]
pub(super) struct SurveyParser<'a> {
    label: &'a str,
    system: Option<CoordinateSystem>,
    section: Section,
    wanted: HashMap<u64, usize>,
    curves: HashMap<u64, StoredCurve>,
    pending: Vec<ObjectBuilder>,
    stats: ParseStats,
}

impl<'a> SurveyParser<'a> {
    /// `wanted` maps curve serials to the number of surfaces using them.
    pub(super) fn new(label: &'a str, wanted: HashMap<u64, usize>) -> Self {
        Self {
            label,
            system: None,
            section: Section::Preamble,
            wanted,
            curves: HashMap::new(),
            pending: Vec::new(),
            stats: ParseStats::default(),
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> ReadError {
        survey_error(self.label, line, message)
    }

    /// Feed one line; returns `false` once `.SLUTT` has been seen.
    pub(super) fn feed(
        &mut self,
        number: usize,
        raw: &str,
        sink: &mut ObjectSink<'_>,
    ) -> Result<bool, ReadError> {
        match classify(raw) {
            Line::Blank => Ok(true),
            Line::Data(text) => {
                self.data_line(number, text)?;
                Ok(true)
            }
            Line::Dotted {
                level: 1,
                keyword,
                value,
            } => self.open_section(number, keyword, value, sink),
            Line::Dotted {
                level,
                keyword,
                value,
            } => {
                self.nested_line(number, level, keyword, value)?;
                Ok(true)
            }
        }
    }

    fn open_section(
        &mut self,
        number: usize,
        keyword: &str,
        value: &str,
        sink: &mut ObjectSink<'_>,
    ) -> Result<bool, ReadError> {
        self.close_section(number, sink)?;
        self.section = match keyword {
            "HODE" => Section::Header(Vec::new(), Vec::new()),
            "SLUTT" => Section::Ended,
            _ => match SurveyObjectKind::from_keyword(keyword) {
                Some(kind) => {
                    let serial = value
                        .trim_end_matches(':')
                        .trim()
                        .parse::<u64>()
                        .map_err(|_| self.error(number, format!(".{keyword} has no serial number")))?;
                    Section::Object(ObjectBuilder::new(kind, serial))
                }
                None => {
                    debug!("{}:{number}: skipping .{keyword}", self.label);
                    self.stats.skipped += 1;
                    Section::Skipped
                }
            },
        };
        Ok(!matches!(self.section, Section::Ended))
    }

    fn close_section(&mut self, number: usize, sink: &mut ObjectSink<'_>) -> Result<(), ReadError> {
        match std::mem::replace(&mut self.section, Section::Preamble) {
            Section::Header(_, attributes) => {
                let system = CoordinateSystem::from_header(&attributes)
                    .map_err(|message| self.error(number, message))?;
                self.system = Some(system);
            }
            Section::Object(object) => self.finish_object(object, sink)?,
            Section::Preamble | Section::Skipped | Section::Ended => {}
        }
        Ok(())
    }

    fn nested_line(
        &mut self,
        number: usize,
        level: usize,
        keyword: &str,
        value: &str,
    ) -> Result<(), ReadError> {
        let (path, attributes) = match &mut self.section {
            Section::Header(path, attributes) => (path, attributes),
            Section::Object(object) => {
                object.mode = match (level, keyword) {
                    (2, "NØ" | "NØH") => DataMode::Coordinates,
                    (2, "REF") => DataMode::Refs,
                    _ => DataMode::None,
                };
                if object.mode != DataMode::None {
                    return self.data_line(number, value);
                }
                (&mut object.path, &mut object.attributes)
            }
            Section::Preamble | Section::Skipped | Section::Ended => return Ok(()),
        };
        path.truncate(level.saturating_sub(2));
        path.push(keyword.to_owned());
        if !value.is_empty() {
            attributes.push((path.join("."), value.to_owned()));
        }
        Ok(())
    }

    fn data_line(&mut self, number: usize, text: &str) -> Result<(), ReadError> {
        let (label, system) = (self.label, self.system);
        let Section::Object(object) = &mut self.section else {
            return Ok(());
        };
        if text.is_empty() {
            return Ok(());
        }
        match object.mode {
            DataMode::None => Ok(()),
            DataMode::Refs => object
                .refs
                .extend_from(text)
                .map_err(|message| survey_error(label, number, message)),
            DataMode::Coordinates => {
                let Some(system) = system else {
                    return Err(survey_error(
                        label,
                        number,
                        "coordinates appear before the .HODE header",
                    ));
                };
                let invalid = || survey_error(label, number, format!("invalid coordinate line {text:?}"));
                let values: Vec<f64> = text
                    .split_whitespace()
                    .map(str::parse::<f64>)
                    .collect::<Result<_, _>>()
                    .map_err(|_| invalid())?;
                // A trailing height value is ignored.
                let [north, east, ..] = values.as_slice() else {
                    return Err(invalid());
                };
                object.coords.push(system.to_wgs84(*north, *east));
                Ok(())
            }
        }
    }

    fn finish_object(
        &mut self,
        object: ObjectBuilder,
        sink: &mut ObjectSink<'_>,
    ) -> Result<(), ReadError> {
        match object.kind {
            SurveyObjectKind::Point | SurveyObjectKind::Text => {
                let geometry = object
                    .coords
                    .first()
                    .and_then(|coord| PlaceGeometry::point(coord.x, coord.y).ok());
                self.emit(object, geometry, sink)
            }
            SurveyObjectKind::Curve => {
                if let Some(&remaining_uses) = self.wanted.get(&object.serial) {
                    self.curves.insert(
                        object.serial,
                        StoredCurve {
                            coords: object.coords,
                            remaining_uses,
                        },
                    );
                }
                Ok(())
            }
            SurveyObjectKind::Surface => {
                if self.can_resolve(&object.refs) {
                    let geometry = self.surface_geometry(&object);
                    self.emit(object, geometry, sink)
                } else {
                    self.pending.push(object);
                    Ok(())
                }
            }
        }
    }

    fn emit(
        &mut self,
        object: ObjectBuilder,
        geometry: Option<PlaceGeometry>,
        sink: &mut ObjectSink<'_>,
    ) -> Result<(), ReadError> {
        self.stats.emitted += 1;
        sink(SurveyPlace::new(
            object.kind,
            object.serial,
            object.attributes,
            geometry,
        ))
    }

    fn can_resolve(&self, refs: &RefList) -> bool {
        refs.curves()
            .all(|curve| self.curves.contains_key(&curve.serial))
    }

    /// Build the polygon and release curves no other surface needs.
    fn surface_geometry(&mut self, object: &ObjectBuilder) -> Option<PlaceGeometry> {
        let exterior = self.ring(&object.refs.outer);
        let holes: Option<Vec<_>> = object
            .refs
            .holes
            .iter()
            .map(|hole| self.ring(hole))
            .collect();
        for curve in object.refs.curves() {
            if let Some(stored) = self.curves.get_mut(&curve.serial) {
                stored.remaining_uses = stored.remaining_uses.saturating_sub(1);
                if stored.remaining_uses == 0 {
                    self.curves.remove(&curve.serial);
                }
            }
        }
        let geometry = PlaceGeometry::polygon(exterior?, holes?);
        match geometry {
            Ok(geometry) => Some(geometry),
            Err(error) => {
                debug!("{}: FLATE {} has unusable geometry: {error}", self.label, object.serial);
                None
            }
        }
    }

    fn ring(&self, refs: &[CurveRef]) -> Option<Vec<Coord<f64>>> {
        let mut ring: Vec<Coord<f64>> = Vec::new();
        for curve in refs {
            let stored = self.curves.get(&curve.serial)?;
            let coords: Box<dyn Iterator<Item = &Coord<f64>>> = if curve.reversed {
                Box::new(stored.coords.iter().rev())
            } else {
                Box::new(stored.coords.iter())
            };
            for coord in coords {
                if ring.last() != Some(coord) {
                    ring.push(*coord);
                }
            }
        }
        (!ring.is_empty()).then_some(ring)
    }

    /// Emit surfaces still waiting for curves; call at end of input.
    pub(super) fn finish(&mut self, sink: &mut ObjectSink<'_>) -> Result<ParseStats, ReadError> {
        // Input that stops without .SLUTT still closes its last section.
        self.close_section(0, sink)?;
        self.section = Section::Ended;
        for object in std::mem::take(&mut self.pending) {
            let geometry = if self.can_resolve(&object.refs) {
                self.surface_geometry(&object)
            } else {
                warn!(
                    "{}: FLATE {} refers to curves missing from the file",
                    self.label, object.serial
                );
                self.stats.unresolved += 1;
                None
            };
            self.emit(object, geometry, sink)?;
        }
        self.curves.clear();
        Ok(self.stats)
    }
}
