//! Command-line interface for the osmlite importer.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use log::info;

mod error;
mod import;

pub use error::CliError;
pub use import::ImportOutcome;
use import::{ImportArgs, run_import};

const ARG_INPUT: &str = "input";
const ARG_DATABASE: &str = "database";
const ARG_PREFIX: &str = "prefix";
const ARG_STYLE: &str = "style";
const ARG_BATCH_SIZE: &str = "batch-size";
const ENV_INPUT: &str = "OSMLITE_CMDS_IMPORT_INPUT";
const ENV_DATABASE: &str = "OSMLITE_CMDS_IMPORT_DATABASE";

/// Style file used when none is configured.
pub const DEFAULT_STYLE: &str = "default.style";
/// Table prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "osm";

/// Run the osmlite CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] naming the phase that failed.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Import(args) => {
            let outcome = run_import(args)?;
            info!(
                "imported {} nodes, {} ways and {} relations into {} points, {} lines and {} polygons",
                outcome.extract.nodes,
                outcome.extract.ways,
                outcome.extract.relations,
                outcome.route.points,
                outcome.route.lines,
                outcome.route.polygons,
            );
        }
    }
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "osmlite",
    about = "Stage OpenStreetMap XML extracts into SQLite geometry tables",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import an OSM XML document into a SQLite database.
    Import(ImportArgs),
}

#[cfg(test)]
mod tests;
