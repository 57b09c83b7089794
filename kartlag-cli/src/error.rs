//! Error types emitted by the Kartlag CLI.
//!
//! Keep this error type reasonably small, as every CLI helper returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use kartlag_data::FilterError;
use kartlag_scorer::BoostConfigError;
use thiserror::Error;

/// Errors emitted by the Kartlag CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name without the leading dashes.
        field: &'static str,
        /// Environment variable that can supply the value.
        env: &'static str,
    },
    /// No input file of any format was named.
    #[error("no inputs given (pass at least one of --pbf, --geojson, --collection, --survey or --stop-places)")]
    NoInputs,
    /// One option of a pair was given without the other.
    #[error("--{given} requires --{missing}")]
    IncompleteOption {
        /// The option that was set.
        given: &'static str,
        /// The option it depends on.
        missing: &'static str,
    },
    /// The queue capacity must be at least one.
    #[error("--queue-capacity must be at least 1")]
    ZeroQueueCapacity,
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        /// Flag naming the path.
        field: &'static str,
        /// The missing path.
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        /// Flag naming the path.
        field: &'static str,
        /// The offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag naming the path.
        field: &'static str,
        /// The path that could not be inspected.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The output directory exists but is not a directory.
    #[error("output directory {path:?} is not a directory")]
    OutputDirectoryNotDirectory {
        /// The offending path.
        path: Utf8PathBuf,
    },
    /// Creating the output directory failed.
    #[error("failed to create output directory {path:?}: {source}")]
    CreateOutputDirectory {
        /// The directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The POI filter entries were malformed.
    #[error("invalid --poi-filter: {0}")]
    PoiFilter(#[from] FilterError),
    /// The boost configuration could not be loaded.
    #[error(transparent)]
    BoostConfig(#[from] BoostConfigError),
    /// At least one input file failed; the others were still indexed.
    #[error("{failed} of {total} inputs failed to index")]
    InputsFailed {
        /// Inputs that failed.
        failed: usize,
        /// Inputs attempted.
        total: usize,
    },
}
