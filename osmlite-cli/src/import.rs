//! Import command implementation for the osmlite CLI.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::{debug, info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use osmlite_core::{
    BatchDispatcher, BatchSize, DEFAULT_BATCH_SIZE, DispatchStats, ProjectionOptions, StyleTable,
};
use osmlite_data::{
    ExtractSummary, GeoEngine, GeometryRouter, IndexSummary, RawTableWriter, RouteSummary,
    RouterOptions, TableNames, create_raw_tables, create_spatial_indexes, extract_file,
    open_database,
};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_BATCH_SIZE, ARG_DATABASE, ARG_INPUT, ARG_PREFIX, ARG_STYLE, CliError, DEFAULT_PREFIX,
    DEFAULT_STYLE, ENV_DATABASE, ENV_INPUT,
};

/// CLI arguments for the `import` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Stream an OSM XML document (optionally bzip2-compressed) into \
                 raw staging tables, then route nodes and ways into point, \
                 line and polygon tables using a style file. Options can come \
                 from CLI flags, configuration files, or environment variables.",
    about = "Import an OSM XML document into SQLite"
)]
#[ortho_config(prefix = "OSMLITE")]
pub(crate) struct ImportArgs {
    /// Path to the OSM XML document (`.osm` or `.osm.bz2`).
    #[arg(value_name = "input")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// Path of the SQLite database to create.
    #[arg(value_name = "database")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Prefix for every table name.
    #[arg(long = ARG_PREFIX, value_name = "name")]
    #[serde(default)]
    pub(crate) prefix: Option<String>,
    /// Style file mapping tags to columns (defaults to `default.style`
    /// when that file exists).
    #[arg(long = ARG_STYLE, value_name = "path")]
    #[serde(default)]
    pub(crate) style: Option<Utf8PathBuf>,
    /// Records per staging transaction.
    #[arg(long = ARG_BATCH_SIZE, value_name = "count")]
    #[serde(default)]
    pub(crate) batch_size: Option<usize>,
    /// Keep the full tag map as JSON in a `tags` column.
    #[arg(long)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) json: bool,
    /// Keep the raw staging tables after routing.
    #[arg(long)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) keep_raw: bool,
    /// Build an R*Tree index for each output table.
    #[arg(long)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) index: bool,
    /// Keep features that end up with no columns.
    #[arg(long)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) keep_all: bool,
    /// Replace an existing database.
    #[arg(long)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) force: bool,
}

impl ImportArgs {
    pub(crate) fn into_config(self) -> Result<ImportConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ImportConfig::try_from(merged)
    }
}

/// Where the style rules are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StyleSource {
    /// A style file named by the configuration; it must exist.
    Configured(Utf8PathBuf),
    /// The default style file, read only when present.
    Default(Utf8PathBuf),
}

impl StyleSource {
    fn load(&self) -> Result<StyleTable, CliError> {
        let path = match self {
            Self::Configured(path) => path,
            Self::Default(path) => match osmlite_fs::file_is_file(path) {
                Ok(true) => path,
                Ok(false) => {
                    warn!("no style file at {path}; importing without style rules");
                    return Ok(StyleTable::default());
                }
                Err(source) => {
                    return Err(CliError::InspectSourcePath {
                        field: ARG_STYLE,
                        path: path.clone(),
                        source,
                    });
                }
            },
        };
        let style = StyleTable::load(path).map_err(CliError::LoadStyle)?;
        debug!("loaded {} style rules from {path}", style.len());
        Ok(style)
    }
}

/// Resolved `import` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImportConfig {
    pub(crate) input: Utf8PathBuf,
    pub(crate) database: Utf8PathBuf,
    pub(crate) names: TableNames,
    pub(crate) style: StyleSource,
    pub(crate) batch_size: BatchSize,
    pub(crate) json: bool,
    pub(crate) keep_raw: bool,
    pub(crate) index: bool,
    pub(crate) keep_all: bool,
    pub(crate) force: bool,
}

impl ImportConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        Self::require_existing(&self.input, ARG_INPUT)?;
        if let StyleSource::Configured(path) = &self.style {
            Self::require_existing(path, ARG_STYLE)?;
        }
        Ok(())
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match osmlite_fs::file_is_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub(crate) const fn router_options(&self) -> RouterOptions {
        RouterOptions {
            projection: ProjectionOptions {
                retain_residual_tags: self.json,
                keep_tagless: self.keep_all,
            },
            keep_raw: self.keep_raw,
        }
    }
}

impl TryFrom<ImportArgs> for ImportConfig {
    type Error = CliError;

    fn try_from(args: ImportArgs) -> Result<Self, Self::Error> {
        let input = args.input.ok_or(CliError::MissingArgument {
            field: ARG_INPUT,
            env: ENV_INPUT,
        })?;
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_DATABASE,
        })?;
        let prefix = args.prefix.as_deref().unwrap_or(DEFAULT_PREFIX);
        let names = TableNames::new(prefix).map_err(CliError::Prefix)?;
        let batch_size = BatchSize::new(args.batch_size.unwrap_or(DEFAULT_BATCH_SIZE))?;
        let style = args.style.map_or_else(
            || StyleSource::Default(Utf8PathBuf::from(DEFAULT_STYLE)),
            StyleSource::Configured,
        );

        Ok(Self {
            input,
            database,
            names,
            style,
            batch_size,
            json: args.json,
            keep_raw: args.keep_raw,
            index: args.index,
            keep_all: args.keep_all,
            force: args.force,
        })
    }
}

/// Counters gathered over one import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    /// Primitives seen in the document.
    pub extract: ExtractSummary,
    /// Batches delivered to the staging tables.
    pub dispatch: DispatchStats,
    /// Rows routed into the output tables.
    pub route: RouteSummary,
    /// Spatial index entries, when indexing was requested.
    pub index: Option<IndexSummary>,
    /// Style lines that were skipped as unparsable.
    pub rejected_style_lines: usize,
}

pub(crate) fn run_import(args: ImportArgs) -> Result<ImportOutcome, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    execute_import(&config)
}

pub(crate) fn execute_import(config: &ImportConfig) -> Result<ImportOutcome, CliError> {
    let style = config.style.load()?;

    let mut connection =
        open_database(&config.database, config.force).map_err(CliError::OpenDatabase)?;
    create_raw_tables(&connection, &config.names).map_err(|source| CliError::CreateSchema {
        path: config.database.clone(),
        source,
    })?;

    let (extract, dispatch) = {
        let writer = RawTableWriter::new(&mut connection, config.names.clone());
        let extraction = extract_file(
            &config.input,
            BatchDispatcher::new(writer, config.batch_size),
        )
        .map_err(|source| CliError::Extract {
            path: config.input.clone(),
            source,
        })?;
        (extraction.summary, extraction.dispatch)
    };

    let route = GeometryRouter::new(&style, GeoEngine, &config.names, config.router_options())
        .route(&mut connection)
        .map_err(CliError::Route)?;

    let index = if config.index {
        Some(create_spatial_indexes(&mut connection, &config.names).map_err(CliError::Index)?)
    } else {
        None
    };
    info!("finished import into {}", config.database);

    Ok(ImportOutcome {
        extract,
        dispatch,
        route,
        index,
        rejected_style_lines: style.rejected_lines(),
    })
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ImportConfig, CliError> {
    let merged = ImportArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ImportConfig::try_from(merged)
}
