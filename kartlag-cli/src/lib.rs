//! Command-line interface for building Kartlag bulk index files.
//!
//! `kartlag index` reads OSM PBF extracts, GeoJSON files and SOSI survey
//! text, and writes one newline-delimited bulk file per input into an output
//! directory. Options layer as CLI flags over `KARTLAG_CMDS_INDEX_*`
//! environment variables over configuration files.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod index;

pub use error::CliError;
pub use index::{FileReport, IndexOutcome};

use index::{IndexArgs, run_index};

const ARG_PBF: &str = "pbf";
const ARG_GEOJSON: &str = "geojson";
const ARG_COLLECTION: &str = "collection";
const ARG_SURVEY: &str = "survey";
const ARG_STOP_PLACES: &str = "stop-places";
const ARG_POI_FILTER: &str = "poi-filter";
const ARG_BOOST_CONFIG: &str = "boost-config";
const ARG_OUTPUT_DIR: &str = "output-dir";
const ARG_INDEX_NAME: &str = "index-name";
const ARG_DEDUP_KEY: &str = "dedup-key";
const ARG_DEDUP_COMPARE: &str = "dedup-compare";
const ARG_QUEUE_CAPACITY: &str = "queue-capacity";
const ARG_SORT_BY_POPULARITY: &str = "sort-by-popularity";
const ARG_ALLOW_CENTERLESS: &str = "allow-centerless";
const ARG_CATEGORY_DOCUMENTS: &str = "category-documents";
const ENV_OUTPUT_DIR: &str = "KARTLAG_CMDS_INDEX_OUTPUT_DIR";

/// Run the Kartlag CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments or configuration are invalid, when an
/// input is missing, or when any input fails to index.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Index(args) => {
            run_index(args)?;
        }
    }
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "kartlag",
    about = "Build search index bulk files from geographic place data",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Index place files into newline-delimited bulk commands.
    Index(IndexArgs),
}

#[cfg(test)]
mod tests;
