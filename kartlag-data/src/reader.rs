//! The contract shared by every format reader.

use crate::error::ReadError;
use crate::queue::QueueSender;
use crate::source::{SourceFormat, SourcePlace};

/// Counts gathered while reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadSummary {
    /// Inputs read to the end.
    pub inputs: u64,
    /// Records handed to the visitor.
    pub records: u64,
    /// Records dropped by the reader (rejected features, unusable geometry).
    pub skipped: u64,
}

impl ReadSummary {
    /// Sum two summaries.
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        Self {
            inputs: self.inputs + other.inputs,
            records: self.records + other.records,
            skipped: self.skipped + other.skipped,
        }
    }
}

/// Visitor receiving each record; an error stops the reader.
pub type RecordVisitor<'a> = dyn FnMut(SourcePlace) -> Result<(), ReadError> + 'a;

/// A reader over one or more inputs of a single format.
///
/// Implementations only provide [`PlaceReader::for_each_record`]; the
/// materialising and queue-feeding entry points are built on it. Inputs are
/// read in order and the first failing input ends the call with its error;
/// callers that need sibling inputs to survive a failure run one reader per
/// input.
pub trait PlaceReader: Send {
    /// Format this reader understands.
    fn format(&self) -> SourceFormat;

    /// Visit every record of every input in order.
    ///
    /// # Errors
    /// Returns the first input's [`ReadError`], or the visitor's error.
    fn for_each_record(&mut self, visit: &mut RecordVisitor<'_>) -> Result<ReadSummary, ReadError>;

    /// Read every record into memory.
    ///
    /// # Errors
    /// As [`PlaceReader::for_each_record`].
    fn read(&mut self) -> Result<Vec<SourcePlace>, ReadError> {
        let mut records = Vec::new();
        self.for_each_record(&mut |record| {
            records.push(record);
            Ok(())
        })?;
        Ok(records)
    }

    /// Feed records into a bounded queue without holding them all.
    ///
    /// # Errors
    /// [`ReadError::Cancelled`] when the queue's signal fires,
    /// [`ReadError::SinkClosed`] when the consumer hangs up, otherwise as
    /// [`PlaceReader::for_each_record`].
    fn stream_into(&mut self, sink: &QueueSender<SourcePlace>) -> Result<ReadSummary, ReadError> {
        self.for_each_record(&mut |record| sink.put(record).map_err(ReadError::from))
    }
}

impl<R: PlaceReader + ?Sized> PlaceReader for Box<R> {
    fn format(&self) -> SourceFormat {
        (**self).format()
    }

    fn for_each_record(&mut self, visit: &mut RecordVisitor<'_>) -> Result<ReadSummary, ReadError> {
        (**self).for_each_record(visit)
    }
}
