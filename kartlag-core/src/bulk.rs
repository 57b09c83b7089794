//! Bulk command stream for the search index.
//!
//! Each command is written as two newline-terminated JSON lines: an action
//! header naming the index, document type and id, then the document body.

use std::cmp::Reverse;
use std::io::{self, Write};

use serde::Serialize;
use thiserror::Error;

use crate::document::IndexDocument;

/// Popularity assumed for unscored documents when sorting.
const UNSCORED_POPULARITY: i64 = 1;

/// Action header preceding each document body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionHeader {
    /// Target index name.
    #[serde(rename = "_index")]
    pub index: String,
    /// Document type (the layer).
    #[serde(rename = "_type")]
    pub doc_type: String,
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,
}

#[derive(Serialize)]
struct ActionLine<'a> {
    index: &'a ActionHeader,
}

/// One index operation: header plus document body.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexCommand {
    /// Action header.
    pub header: ActionHeader,
    /// Document body.
    pub document: IndexDocument,
}

impl IndexCommand {
    /// Build an index command with the id `source:layer:source_id`.
    #[must_use]
    pub fn index(index_name: &str, document: IndexDocument) -> Self {
        let header = ActionHeader {
            index: index_name.to_owned(),
            doc_type: document.layer.as_str().to_owned(),
            id: format!(
                "{}:{}:{}",
                document.source,
                document.layer.as_str(),
                document.source_id
            ),
        };
        Self { header, document }
    }
}

/// Errors raised while writing the bulk stream.
#[derive(Debug, Error)]
pub enum BulkWriteError {
    /// Serialising a header or body failed.
    #[error("failed to serialise bulk command {id}")]
    Serialise {
        /// Id of the command being written.
        id: String,
        /// Source error from `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// Writing to the sink failed.
    #[error("failed to write bulk stream")]
    Io(#[from] io::Error),
}

/// Streams bulk commands into a line-oriented sink.
#[derive(Debug)]
pub struct BulkWriter<W: Write> {
    sink: W,
    lines: u64,
}

impl<W: Write> BulkWriter<W> {
    /// Wrap a sink.
    pub const fn new(sink: W) -> Self {
        Self { sink, lines: 0 }
    }

    /// Number of lines written so far.
    #[must_use]
    pub const fn lines_written(&self) -> u64 {
        self.lines
    }

    /// Write the header and body lines of one command.
    pub fn write_command(&mut self, command: &IndexCommand) -> Result<(), BulkWriteError> {
        let serialise_error = |source| BulkWriteError::Serialise {
            id: command.header.id.clone(),
            source,
        };
        let header = serde_json::to_string(&ActionLine {
            index: &command.header,
        })
        .map_err(serialise_error)?;
        let body = serde_json::to_string(&command.document).map_err(serialise_error)?;
        writeln!(self.sink, "{header}")?;
        writeln!(self.sink, "{body}")?;
        self.lines += 2;
        Ok(())
    }

    /// Flush and return the sink.
    pub fn finish(mut self) -> Result<W, BulkWriteError> {
        self.sink.flush()?;
        Ok(self.sink)
    }
}

/// Write `commands` to `out` in input order, returning the number of lines written.
///
/// # Examples
/// ```
/// use std::collections::BTreeMap;
/// use kartlag_core::{IndexCommand, IndexDocument, Layer, DocumentParent, write};
///
/// let document = IndexDocument {
///     layer: Layer::Venue,
///     source: "nsr".into(),
///     source_id: "NSR:StopPlace:337".into(),
///     name: BTreeMap::from([("default".into(), "Oslo S".into())]),
///     center_point: None,
///     shape: None,
///     parent: DocumentParent::default(),
///     category: Vec::new(),
///     popularity: Some(60_000),
/// };
/// let mut out = Vec::new();
/// let lines = write([IndexCommand::index("places", document)], &mut out)?;
/// assert_eq!(lines, 2);
/// assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
/// # Ok::<(), kartlag_core::BulkWriteError>(())
/// ```
pub fn write<I, W>(commands: I, out: W) -> Result<u64, BulkWriteError>
where
    I: IntoIterator<Item = IndexCommand>,
    W: Write,
{
    let mut writer = BulkWriter::new(out);
    for command in commands {
        writer.write_command(&command)?;
    }
    let lines = writer.lines_written();
    writer.finish()?;
    Ok(lines)
}

/// Sort commands by descending popularity; unscored documents count as `1`.
///
/// The sort is stable, so equally popular commands keep their input order.
pub fn sort_by_popularity(commands: &mut [IndexCommand]) {
    commands.sort_by_key(|command| {
        Reverse(
            command
                .document
                .popularity
                .unwrap_or(UNSCORED_POPULARITY),
        )
    });
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rstest::rstest;
    use serde_json::Value;

    use super::*;
    use crate::document::{DocumentParent, Layer};

    fn document(id: &str, popularity: Option<i64>) -> IndexDocument {
        IndexDocument {
            layer: Layer::Venue,
            source: "nsr".to_owned(),
            source_id: id.to_owned(),
            name: BTreeMap::from([("default".to_owned(), id.to_owned())]),
            center_point: None,
            shape: None,
            parent: DocumentParent::default(),
            category: Vec::new(),
            popularity,
        }
    }

    fn commands(popularities: &[Option<i64>]) -> Vec<IndexCommand> {
        popularities
            .iter()
            .enumerate()
            .map(|(index, popularity)| {
                IndexCommand::index("places", document(&format!("stop-{index}"), *popularity))
            })
            .collect()
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(5)]
    fn writes_two_lines_per_command_in_order(#[case] count: usize) {
        let input = commands(&vec![Some(10); count]);
        let mut out = Vec::new();

        let lines = write(input, &mut out).expect("write bulk stream");

        let text = String::from_utf8(out).expect("utf-8 output");
        let written: Vec<&str> = text.lines().collect();
        assert_eq!(lines, 2 * count as u64);
        assert_eq!(written.len(), 2 * count);
        for (index, pair) in written.chunks(2).enumerate() {
            let header: Value = serde_json::from_str(pair[0]).expect("header json");
            let body: Value = serde_json::from_str(pair[1]).expect("body json");
            assert_eq!(header["index"]["_index"], "places");
            assert_eq!(header["index"]["_type"], "venue");
            assert_eq!(
                header["index"]["_id"],
                format!("nsr:venue:stop-{index}").as_str()
            );
            assert_eq!(body["source_id"], format!("stop-{index}").as_str());
        }
    }

    #[rstest]
    fn sorts_unscored_just_below_scored() {
        let mut input = commands(&[None, Some(0), Some(5), Some(1), None, Some(100)]);

        sort_by_popularity(&mut input);

        let order: Vec<&str> = input
            .iter()
            .map(|command| command.document.source_id.as_str())
            .collect();
        assert_eq!(
            order,
            ["stop-5", "stop-2", "stop-0", "stop-3", "stop-4", "stop-1"]
        );
    }
}
