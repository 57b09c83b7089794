//! Index command implementation for the Kartlag CLI.

use std::error::Error;
use std::io::BufWriter;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use kartlag_core::{
    BulkWriteError, BulkWriter, EmitterConfig, IndexCommand, ParentSlot, PlaceType,
    sort_by_popularity, write,
};
use kartlag_data::{
    DEFAULT_INDEX_NAME, DEFAULT_QUEUE_CAPACITY, GeoJsonCollectionReader, GeoJsonFeatureReader,
    GeoJsonOptions, InputSource, MapperConfig, PbfReader, Pipeline, PipelineConfig, PipelineError,
    PipelineMode, PipelineReport, PlaceReader, PoiFilter, SurveyReader, run_concurrently,
};
use kartlag_fs::{create_utf8_file, ensure_dir, file_is_file};
use kartlag_scorer::{BoostConfig, PopularityScorer, load_boost_config};
use log::{error, info};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_ALLOW_CENTERLESS, ARG_BOOST_CONFIG, ARG_CATEGORY_DOCUMENTS, ARG_COLLECTION,
    ARG_DEDUP_COMPARE, ARG_DEDUP_KEY, ARG_GEOJSON, ARG_INDEX_NAME, ARG_OUTPUT_DIR, ARG_PBF,
    ARG_POI_FILTER, ARG_QUEUE_CAPACITY, ARG_SORT_BY_POPULARITY, ARG_STOP_PLACES, ARG_SURVEY,
    CliError, ENV_OUTPUT_DIR,
};

/// Source label given to stop place collections.
const STOP_PLACE_SOURCE: &str = "nsr";
const BULK_EXTENSION: &str = "ndjson";

/// CLI arguments for the `index` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Read place files and write one newline-delimited bulk file \
                 per input into the output directory. Each input runs in its \
                 own pipeline, so one broken file does not stop the others. \
                 Options can come from CLI flags, configuration files, or \
                 environment variables.",
    about = "Index place files into bulk commands"
)]
#[ortho_config(prefix = "KARTLAG")]
pub(crate) struct IndexArgs {
    /// OpenStreetMap PBF extracts, optionally bzip2 compressed.
    #[arg(long = ARG_PBF, value_name = "path")]
    #[serde(default)]
    pub(crate) pbf: Vec<Utf8PathBuf>,
    /// Files holding a single GeoJSON feature each.
    #[arg(long = ARG_GEOJSON, value_name = "path")]
    #[serde(default)]
    pub(crate) geojson: Vec<Utf8PathBuf>,
    /// GeoJSON feature collections.
    #[arg(long = ARG_COLLECTION, value_name = "path")]
    #[serde(default)]
    pub(crate) collection: Vec<Utf8PathBuf>,
    /// SOSI survey files with administrative units and place names.
    #[arg(long = ARG_SURVEY, value_name = "path")]
    #[serde(default)]
    pub(crate) survey: Vec<Utf8PathBuf>,
    /// GeoJSON collections of stop places, grouped under their parent stops.
    #[arg(long = ARG_STOP_PLACES, value_name = "path")]
    #[serde(default)]
    pub(crate) stop_places: Vec<Utf8PathBuf>,
    /// OSM tags to keep, as `key` or `key=value`.
    #[arg(long = ARG_POI_FILTER, value_name = "key[=value]", value_delimiter = ',')]
    #[serde(default)]
    pub(crate) poi_filter: Vec<String>,
    /// JSON popularity boost configuration.
    #[arg(long = ARG_BOOST_CONFIG, value_name = "path")]
    #[serde(default)]
    pub(crate) boost_config: Option<Utf8PathBuf>,
    /// Directory receiving the bulk files.
    #[arg(long = ARG_OUTPUT_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) output_dir: Option<Utf8PathBuf>,
    /// Index named in every action header.
    #[arg(long = ARG_INDEX_NAME, value_name = "name")]
    #[serde(default)]
    pub(crate) index_name: Option<String>,
    /// Property correlating duplicate GeoJSON features.
    #[arg(long = ARG_DEDUP_KEY, value_name = "property")]
    #[serde(default)]
    pub(crate) dedup_key: Option<String>,
    /// Property whose greatest value wins among duplicates.
    #[arg(long = ARG_DEDUP_COMPARE, value_name = "property")]
    #[serde(default)]
    pub(crate) dedup_compare: Option<String>,
    /// Records buffered between a reader and its writer.
    #[arg(long = ARG_QUEUE_CAPACITY, value_name = "records")]
    #[serde(default)]
    pub(crate) queue_capacity: Option<usize>,
    /// Write each file's commands in descending popularity.
    #[arg(long = ARG_SORT_BY_POPULARITY)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) sort_by_popularity: bool,
    /// Keep places that have no center point.
    #[arg(long = ARG_ALLOW_CENTERLESS)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) allow_centerless: bool,
    /// Emit one extra document per category.
    #[arg(long = ARG_CATEGORY_DOCUMENTS)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) category_documents: bool,
}

impl IndexArgs {
    pub(crate) fn into_config(self) -> Result<IndexConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        IndexConfig::try_from(merged)
    }
}

/// Format of one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputKind {
    Pbf,
    GeoJson,
    Collection,
    Survey,
    StopPlaces,
}

impl InputKind {
    /// Flag that names inputs of this kind.
    pub(crate) const fn flag(self) -> &'static str {
        match self {
            Self::Pbf => ARG_PBF,
            Self::GeoJson => ARG_GEOJSON,
            Self::Collection => ARG_COLLECTION,
            Self::Survey => ARG_SURVEY,
            Self::StopPlaces => ARG_STOP_PLACES,
        }
    }

    fn reader(self, path: &Utf8Path, filter: &PoiFilter) -> Box<dyn PlaceReader> {
        let inputs = vec![InputSource::from(path)];
        match self {
            Self::Pbf => Box::new(PbfReader::new(inputs, filter.clone())),
            Self::GeoJson => Box::new(GeoJsonFeatureReader::new(
                inputs,
                GeoJsonOptions::default(),
            )),
            Self::Collection => Box::new(GeoJsonCollectionReader::new(
                inputs,
                GeoJsonOptions::default(),
            )),
            Self::Survey => Box::new(SurveyReader::new(inputs)),
            Self::StopPlaces => Box::new(GeoJsonCollectionReader::new(
                inputs,
                GeoJsonOptions {
                    source: STOP_PLACE_SOURCE.to_owned(),
                    place_type: PlaceType::StopPlace,
                },
            )),
        }
    }

    /// Routing and parent linking for inputs of this kind.
    ///
    /// Deduplication only applies to plain GeoJSON; survey and stop place
    /// files are always grouped into hierarchies.
    fn routing(self, dedup: Option<&DedupRule>) -> (PipelineMode, MapperConfig) {
        match self {
            Self::Pbf => (PipelineMode::Streaming, MapperConfig::default()),
            Self::GeoJson | Self::Collection => {
                let mode = dedup.map_or(PipelineMode::Streaming, |rule| {
                    PipelineMode::Deduplicated {
                        key: rule.key.clone(),
                        comparator: rule.comparator.clone(),
                    }
                });
                (mode, MapperConfig::default())
            }
            Self::Survey => (
                PipelineMode::Hierarchical,
                MapperConfig {
                    parent_slot: Some(ParentSlot::Locality),
                },
            ),
            Self::StopPlaces => (
                PipelineMode::Hierarchical,
                MapperConfig {
                    parent_slot: Some(ParentSlot::StopPlace),
                },
            ),
        }
    }
}

/// One input file and its format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndexInput {
    pub(crate) kind: InputKind,
    pub(crate) path: Utf8PathBuf,
}

/// Correlation key and comparator for GeoJSON deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DedupRule {
    pub(crate) key: String,
    pub(crate) comparator: String,
}

/// Resolved `index` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndexConfig {
    /// Inputs in flag order: PBF, GeoJSON, collections, surveys, stop places.
    pub(crate) inputs: Vec<IndexInput>,
    pub(crate) poi_filter: PoiFilter,
    pub(crate) boost_config: Option<Utf8PathBuf>,
    pub(crate) output_dir: Utf8PathBuf,
    pub(crate) index_name: String,
    pub(crate) dedup: Option<DedupRule>,
    pub(crate) queue_capacity: usize,
    pub(crate) sort_by_popularity: bool,
    pub(crate) emitter: EmitterConfig,
}

impl IndexConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        for input in &self.inputs {
            Self::require_existing(&input.path, input.kind.flag())?;
        }
        if let Some(path) = &self.boost_config {
            Self::require_existing(path, ARG_BOOST_CONFIG)?;
        }
        match file_is_file(&self.output_dir) {
            Ok(true) => Err(CliError::OutputDirectoryNotDirectory {
                path: self.output_dir.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match file_is_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::SourcePathNotFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(CliError::MissingSourceFile {
                    field,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Bulk file written for the input at `position`.
    ///
    /// The position prefix keeps same-named inputs from different
    /// directories apart.
    pub(crate) fn output_path(&self, position: usize, input: &IndexInput) -> Utf8PathBuf {
        let name = input.path.file_name().unwrap_or(input.kind.flag());
        self.output_dir
            .join(format!("{position:02}-{name}.{BULK_EXTENSION}"))
    }

    pub(crate) fn pipeline_config(&self, kind: InputKind) -> PipelineConfig {
        let (mode, mapper) = kind.routing(self.dedup.as_ref());
        PipelineConfig {
            index_name: self.index_name.clone(),
            queue_capacity: self.queue_capacity,
            mode,
            mapper,
            emitter: self.emitter,
        }
    }
}

impl TryFrom<IndexArgs> for IndexConfig {
    type Error = CliError;

    fn try_from(args: IndexArgs) -> Result<Self, Self::Error> {
        let output_dir = args.output_dir.ok_or(CliError::MissingArgument {
            field: ARG_OUTPUT_DIR,
            env: ENV_OUTPUT_DIR,
        })?;

        let inputs: Vec<IndexInput> = [
            (InputKind::Pbf, args.pbf),
            (InputKind::GeoJson, args.geojson),
            (InputKind::Collection, args.collection),
            (InputKind::Survey, args.survey),
            (InputKind::StopPlaces, args.stop_places),
        ]
        .into_iter()
        .flat_map(|(kind, paths)| paths.into_iter().map(move |path| IndexInput { kind, path }))
        .collect();
        if inputs.is_empty() {
            return Err(CliError::NoInputs);
        }

        let dedup = match (args.dedup_key, args.dedup_compare) {
            (Some(key), Some(comparator)) => Some(DedupRule { key, comparator }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(CliError::IncompleteOption {
                    given: ARG_DEDUP_KEY,
                    missing: ARG_DEDUP_COMPARE,
                });
            }
            (None, Some(_)) => {
                return Err(CliError::IncompleteOption {
                    given: ARG_DEDUP_COMPARE,
                    missing: ARG_DEDUP_KEY,
                });
            }
        };

        let queue_capacity = match args.queue_capacity {
            Some(0) => return Err(CliError::ZeroQueueCapacity),
            Some(capacity) => capacity,
            None => DEFAULT_QUEUE_CAPACITY,
        };

        Ok(Self {
            inputs,
            poi_filter: PoiFilter::parse(&args.poi_filter)?,
            boost_config: args.boost_config,
            output_dir,
            index_name: args
                .index_name
                .unwrap_or_else(|| DEFAULT_INDEX_NAME.to_owned()),
            dedup,
            queue_capacity,
            sort_by_popularity: args.sort_by_popularity,
            emitter: EmitterConfig {
                allow_centerless: args.allow_centerless,
                category_documents: args.category_documents,
            },
        })
    }
}

/// Result of indexing one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// The input that was read.
    pub input: Utf8PathBuf,
    /// The bulk file that was written.
    pub output: Utf8PathBuf,
    /// Pipeline counters.
    pub report: PipelineReport,
}

/// Every input of a successful `index` run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexOutcome {
    /// Reports in input order.
    pub files: Vec<FileReport>,
}

pub(crate) fn run_index(args: IndexArgs) -> Result<IndexOutcome, CliError> {
    let config = resolve_index_config(args)?;
    execute_index(&config)
}

fn resolve_index_config(args: IndexArgs) -> Result<IndexConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

/// Index every input of `config` concurrently.
///
/// A failing input is logged and counted; the others still write their
/// bulk files.
pub(crate) fn execute_index(config: &IndexConfig) -> Result<IndexOutcome, CliError> {
    ensure_dir(&config.output_dir).map_err(|source| CliError::CreateOutputDirectory {
        path: config.output_dir.clone(),
        source,
    })?;
    let boost = Arc::new(match &config.boost_config {
        Some(path) => load_boost_config(path)?,
        None => BoostConfig::default(),
    });

    let jobs: Vec<_> = config
        .inputs
        .iter()
        .enumerate()
        .map(|(position, input)| {
            let scorer = PopularityScorer::new(Arc::clone(&boost));
            let output = config.output_path(position, input);
            move || index_file(config, input, scorer, output)
        })
        .collect();
    let total = jobs.len();

    let mut outcome = IndexOutcome::default();
    let mut failed = 0;
    for (input, result) in config.inputs.iter().zip(run_concurrently(jobs)) {
        match result {
            Ok(file) => {
                info!(
                    "Indexed {} into {}: {} commands",
                    file.input, file.output, file.report.commands
                );
                outcome.files.push(file);
            }
            Err(err) => {
                error!("Failed to index {}: {}", input.path, describe(&err));
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(CliError::InputsFailed { failed, total });
    }
    Ok(outcome)
}

fn index_file(
    config: &IndexConfig,
    input: &IndexInput,
    scorer: PopularityScorer,
    output: Utf8PathBuf,
) -> Result<FileReport, PipelineError> {
    let reader = input.kind.reader(&input.path, &config.poi_filter);
    let pipeline = Pipeline::new(reader, scorer, config.pipeline_config(input.kind));
    let file = create_utf8_file(&output).map_err(BulkWriteError::Io)?;
    let sink = BufWriter::new(file);

    let report = if config.sort_by_popularity {
        let mut commands: Vec<IndexCommand> = Vec::new();
        let report = pipeline.run(&mut commands)?;
        sort_by_popularity(&mut commands);
        write(commands, sink)?;
        report
    } else {
        let mut writer = BulkWriter::new(sink);
        let report = pipeline.run(&mut writer)?;
        writer.finish()?;
        report
    };

    Ok(FileReport {
        input: input.path.clone(),
        output,
        report,
    })
}

/// Render an error and its sources on one line.
fn describe(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<IndexConfig, CliError> {
    let merged = IndexArgs::merge_from_layers(layers).map_err(CliError::from)?;
    IndexConfig::try_from(merged)
}
