//! SOSI survey text reading.
//!
//! Each input is read twice. The first pass counts which curves (`.KURVE`)
//! surfaces (`.FLATE`) refer to, so the second pass keeps only those curves'
//! coordinates and can release each one after its last surface is built.
//! Points and text objects are emitted as soon as they end.

mod parser;
mod utm;

use log::info;

use crate::error::ReadError;
use crate::input::InputSource;
use crate::reader::{PlaceReader, ReadSummary, RecordVisitor};
use crate::source::{SourceFormat, SourcePlace, SurveyPlace};
use parser::{SurveyParser, for_each_line, referenced_curves};

/// Reads SOSI survey files.
///
/// Supported coordinate systems are EUREF89 UTM (`KOORDSYS` 21 to 26, zones
/// 31 to 36) and geographic degrees (`KOORDSYS` 84). Curves are not emitted
/// on their own; they only contribute surface outlines.
///
/// # Examples
/// ```
/// use kartlag_data::{InputSource, PlaceReader, PlaceRecord, SurveyReader};
///
/// let text = "\
/// .HODE
/// ..TRANSPAR
/// ...KOORDSYS 84
/// .PUNKT 1:
/// ..OBJTYPE Stedsnavn
/// ..STEDSNUMMER 42
/// ..NAVN \"Tromsø\"
/// ..NØ
/// 69.65 18.96
/// .SLUTT
/// ";
/// let mut reader = SurveyReader::new(vec![InputSource::stream("places.sos", text.as_bytes())]);
/// let places = reader.read()?;
/// assert_eq!(places[0].id(), "42");
/// assert_eq!(places[0].name(), Some("Tromsø"));
/// # Ok::<(), kartlag_data::ReadError>(())
/// ```
#[derive(Debug)]
pub struct SurveyReader {
    inputs: Vec<InputSource>,
}

impl SurveyReader {
    /// Create a reader over `inputs`.
    #[must_use]
    pub const fn new(inputs: Vec<InputSource>) -> Self {
        Self { inputs }
    }
}

impl PlaceReader for SurveyReader {
    fn format(&self) -> SourceFormat {
        SourceFormat::SurveyText
    }

    fn for_each_record(&mut self, visit: &mut RecordVisitor<'_>) -> Result<ReadSummary, ReadError> {
        let mut summary = ReadSummary::default();
        for input in &mut self.inputs {
            let label = input.label().to_owned();
            let local = input.localise()?;
            let wanted = referenced_curves(local.open(&label)?, &label)?;
            let mut parser = SurveyParser::new(&label, wanted);
            let mut sink = |place: SurveyPlace| visit(SourcePlace::Survey(place));
            for_each_line(local.open(&label)?, &label, |number, line| {
                parser.feed(number, line, &mut sink)
            })?;
            let stats = parser.finish(&mut sink)?;
            info!(
                "Read {label}: {} objects, {} skipped sections, {} surfaces without curves",
                stats.emitted, stats.skipped, stats.unresolved
            );
            summary = summary.combine(ReadSummary {
                inputs: 1,
                records: stats.emitted,
                skipped: stats.skipped,
            });
        }
        Ok(summary)
    }
}
