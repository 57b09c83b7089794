//! Reader to bulk sink plumbing.
//!
//! A [`Pipeline`] owns one reader. `run` starts the reader on a scoped thread
//! that feeds a bounded queue, and drains the queue on the calling thread
//! through the mapper, the scorer and the emitter into a [`CommandSink`].
//! Either side failing fires the shared [`CancellationSignal`], which
//! unblocks the other.

use std::io::Write;
use std::thread;

use kartlag_core::{
    BulkWriteError, BulkWriter, CanonicalPlace, DocumentEmitter, EmitterConfig, EmitterStats,
    IndexCommand,
};
use kartlag_scorer::PopularityScorer;
use log::{info, warn};
use thiserror::Error;

use crate::dedup::deduplicate;
use crate::error::ReadError;
use crate::hierarchy::assemble;
use crate::mapper::{CanonicalMapper, MapperConfig, MapperStats};
use crate::queue::{CancellationSignal, QueueReceiver, bounded_queue};
use crate::reader::{PlaceReader, ReadSummary};
use crate::source::SourcePlace;

/// Queue capacity used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 512;

/// Index name used when none is configured.
pub const DEFAULT_INDEX_NAME: &str = "places";

/// Destination for bulk commands.
pub trait CommandSink {
    /// Accept one command.
    ///
    /// # Errors
    /// Returns [`BulkWriteError`] when the command cannot be stored.
    fn accept(&mut self, command: IndexCommand) -> Result<(), BulkWriteError>;
}

impl<W: Write> CommandSink for BulkWriter<W> {
    fn accept(&mut self, command: IndexCommand) -> Result<(), BulkWriteError> {
        self.write_command(&command)
    }
}

impl CommandSink for Vec<IndexCommand> {
    fn accept(&mut self, command: IndexCommand) -> Result<(), BulkWriteError> {
        self.push(command);
        Ok(())
    }
}

/// How records travel from the queue to the mapper.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PipelineMode {
    /// Map each record as it arrives.
    #[default]
    Streaming,
    /// Gather every record, keep one per `key` by greatest `comparator`.
    Deduplicated {
        /// Correlation key property.
        key: String,
        /// Comparator property.
        comparator: String,
    },
    /// Gather every record and group children under their parents.
    Hierarchical,
}

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Index named in every action header.
    pub index_name: String,
    /// Records the queue holds before the reader blocks.
    pub queue_capacity: usize,
    /// Record routing.
    pub mode: PipelineMode,
    /// Mapper settings.
    pub mapper: MapperConfig,
    /// Emitter settings.
    pub emitter: EmitterConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            index_name: DEFAULT_INDEX_NAME.to_owned(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            mode: PipelineMode::default(),
            mapper: MapperConfig::default(),
            emitter: EmitterConfig::default(),
        }
    }
}

/// Counters from one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineReport {
    /// Reader counters.
    pub read: ReadSummary,
    /// Records removed by deduplication.
    pub deduplicated: u64,
    /// Mapper counters.
    pub mapped: MapperStats,
    /// Emitter counters.
    pub emitted: EmitterStats,
    /// Commands accepted by the sink.
    pub commands: u64,
}

/// Failure of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The reader failed.
    #[error("failed to read input")]
    Read(#[source] ReadError),
    /// The sink rejected a command.
    #[error("failed to write bulk output")]
    Sink(#[from] BulkWriteError),
    /// The run was cancelled before the reader finished.
    #[error("pipeline was cancelled")]
    Cancelled,
    /// A worker thread panicked.
    #[error("pipeline worker panicked")]
    WorkerPanicked,
}

impl From<ReadError> for PipelineError {
    fn from(error: ReadError) -> Self {
        match error {
            ReadError::Cancelled => Self::Cancelled,
            other => Self::Read(other),
        }
    }
}

/// One reader wired to the mapping stages.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use kartlag_core::IndexCommand;
/// use kartlag_data::{
///     GeoJsonCollectionReader, GeoJsonOptions, InputSource, Pipeline, PipelineConfig,
/// };
/// use kartlag_scorer::{BoostConfig, PopularityScorer};
///
/// let json = r#"{"type": "FeatureCollection", "features": [
///     {"type": "Feature", "id": "1", "properties": {"name": "Torget"},
///      "geometry": {"type": "Point", "coordinates": [10.4, 63.43]}}
/// ]}"#;
/// let reader = GeoJsonCollectionReader::new(
///     vec![InputSource::stream("poi.json", json.as_bytes())],
///     GeoJsonOptions::default(),
/// );
/// let scorer = PopularityScorer::new(Arc::new(BoostConfig::default()));
/// let mut commands: Vec<IndexCommand> = Vec::new();
///
/// let report = Pipeline::new(reader, scorer, PipelineConfig::default()).run(&mut commands)?;
/// assert_eq!(report.commands, 1);
/// assert_eq!(commands[0].header.id, "geojson:venue:1");
/// # Ok::<(), kartlag_data::PipelineError>(())
/// ```
#[derive(Debug)]
pub struct Pipeline<R> {
    reader: R,
    scorer: PopularityScorer,
    config: PipelineConfig,
    cancel: CancellationSignal,
}

impl<R: PlaceReader> Pipeline<R> {
    /// Create a pipeline with its own cancellation signal.
    #[must_use]
    pub fn new(reader: R, scorer: PopularityScorer, config: PipelineConfig) -> Self {
        Self {
            reader,
            scorer,
            config,
            cancel: CancellationSignal::new(),
        }
    }

    /// Share `cancel` with other pipelines or a signal handler.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// The signal this pipeline observes.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationSignal {
        &self.cancel
    }

    /// Read everything and feed the resulting commands to `sink`.
    ///
    /// In streaming mode commands reach the sink while the reader is still
    /// running, so a read failure can follow partial output. The gathering
    /// modes only touch the sink once the reader has finished cleanly.
    ///
    /// # Errors
    /// The sink's error when it rejects a command, otherwise the reader's
    /// error. [`PipelineError::Cancelled`] when the signal fires.
    pub fn run<S: CommandSink>(self, sink: &mut S) -> Result<PipelineReport, PipelineError> {
        let Self {
            mut reader,
            scorer,
            config,
            cancel,
        } = self;
        let format = reader.format();
        let (sender, receiver) = bounded_queue(config.queue_capacity, cancel.clone());
        let mut stage = Stage::new(&scorer, &config, sink);
        let mut gathered: Vec<SourcePlace> = Vec::new();

        let (drained, produced) = thread::scope(|scope| {
            let producer = scope.spawn(move || reader.stream_into(&sender));
            let drained = match config.mode {
                PipelineMode::Streaming => drain(&receiver, |record| stage.record(&record)),
                _ => drain(&receiver, |record| {
                    gathered.push(record);
                    Ok(())
                }),
            };
            if drained.is_err() {
                cancel.cancel();
            }
            drop(receiver);
            (drained, producer.join())
        });

        let produced = produced.map_err(|_| PipelineError::WorkerPanicked)?;
        drained?;
        stage.report.read = produced?;

        match &config.mode {
            PipelineMode::Streaming => {}
            PipelineMode::Deduplicated { key, comparator } => {
                let before = gathered.len();
                let kept = deduplicate(gathered, key, comparator);
                stage.report.deduplicated = (before - kept.len()) as u64;
                for record in &kept {
                    stage.record(record)?;
                }
            }
            PipelineMode::Hierarchical => {
                for hierarchy in &assemble(gathered) {
                    let places = stage.mapper.to_canonical_places(hierarchy);
                    for place in places {
                        stage.place(place)?;
                    }
                }
            }
        }

        let report = stage.finish();
        info!(
            "{format} pipeline: {} records read, {} places mapped, {} commands written",
            report.read.records, report.mapped.mapped, report.commands
        );
        if report.emitted.dropped_centerless > 0 {
            warn!(
                "{format} pipeline dropped {} places without a center",
                report.emitted.dropped_centerless
            );
        }
        Ok(report)
    }
}

/// Run `jobs` on scoped threads and collect their results in job order.
///
/// A job that panics is reported as [`PipelineError::WorkerPanicked`]
/// without affecting the others.
pub fn run_concurrently<T, F>(jobs: Vec<F>) -> Vec<Result<T, PipelineError>>
where
    T: Send,
    F: FnOnce() -> Result<T, PipelineError> + Send,
{
    thread::scope(|scope| {
        let handles: Vec<_> = jobs.into_iter().map(|job| scope.spawn(job)).collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(PipelineError::WorkerPanicked))
            })
            .collect()
    })
}

fn drain(
    receiver: &QueueReceiver<SourcePlace>,
    mut handle: impl FnMut(SourcePlace) -> Result<(), PipelineError>,
) -> Result<(), PipelineError> {
    while let Some(record) = receiver.take().map_err(|_| PipelineError::Cancelled)? {
        handle(record)?;
    }
    Ok(())
}

struct Stage<'a, S> {
    mapper: CanonicalMapper,
    emitter: DocumentEmitter,
    scorer: &'a PopularityScorer,
    index_name: &'a str,
    sink: &'a mut S,
    report: PipelineReport,
}

impl<'a, S: CommandSink> Stage<'a, S> {
    fn new(scorer: &'a PopularityScorer, config: &'a PipelineConfig, sink: &'a mut S) -> Self {
        Self {
            mapper: CanonicalMapper::new(config.mapper),
            emitter: DocumentEmitter::new(config.emitter),
            scorer,
            index_name: &config.index_name,
            sink,
            report: PipelineReport::default(),
        }
    }

    fn record(&mut self, record: &SourcePlace) -> Result<(), PipelineError> {
        match self.mapper.to_canonical_place(record) {
            Some(place) => self.place(place),
            None => Ok(()),
        }
    }

    fn place(&mut self, place: CanonicalPlace) -> Result<(), PipelineError> {
        let scored = self.scorer.score_place(place);
        for document in self.emitter.to_documents(&scored) {
            self.sink.accept(IndexCommand::index(self.index_name, document))?;
            self.report.commands += 1;
        }
        Ok(())
    }

    fn finish(self) -> PipelineReport {
        PipelineReport {
            mapped: self.mapper.stats(),
            emitted: self.emitter.stats(),
            ..self.report
        }
    }
}

#[cfg(test)]
mod tests;
