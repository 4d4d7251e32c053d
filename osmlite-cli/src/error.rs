//! Error types emitted by the osmlite CLI.
//!
//! Each pipeline phase has its own variant so the failing phase leads the
//! message and the library error follows in the source chain.

use std::sync::Arc;

use camino::Utf8PathBuf;
use osmlite_core::{StyleError, ZeroBatchSize};
use osmlite_data::{
    ExtractError, IndexError, RawStoreError, RouteError, SchemaError, StoreError,
};
use thiserror::Error;

/// Errors emitted by the osmlite CLI.
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
        /// Name of the missing option.
        field: &'static str,
        /// Environment variable that can supply it.
        env: &'static str,
    },
    /// The configured batch size was zero.
    #[error("invalid batch size: {0}")]
    BatchSize(#[from] ZeroBatchSize),
    /// The configured table prefix is not a plain SQL identifier.
    #[error("invalid table prefix")]
    Prefix(#[source] SchemaError),
    /// A referenced input path does not exist on disk or is not a file.
    #[error("{field} path {path:?} does not exist or is not a file")]
    MissingSourceFile {
        /// Option naming the path.
        field: &'static str,
        /// Path as configured.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}")]
    InspectSourcePath {
        /// Option naming the path.
        field: &'static str,
        /// Path as configured.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Loading the style file failed.
    #[error("failed to load style rules")]
    LoadStyle(#[source] StyleError),
    /// Opening the output database failed.
    #[error("failed to prepare the output database")]
    OpenDatabase(#[source] StoreError),
    /// Creating the raw staging tables failed.
    #[error("failed to create staging tables in {path:?}")]
    CreateSchema {
        /// Database path.
        path: Utf8PathBuf,
        /// Source schema error.
        #[source]
        source: SchemaError,
    },
    /// Extracting or staging primitives failed.
    #[error("failed to stage {path:?}")]
    Extract {
        /// Input document path.
        path: Utf8PathBuf,
        /// Source extraction error.
        #[source]
        source: ExtractError<RawStoreError>,
    },
    /// Routing staged records into output tables failed.
    #[error("failed to route staged records")]
    Route(#[source] RouteError),
    /// Building spatial indexes failed.
    #[error("failed to build spatial indexes")]
    Index(#[source] IndexError),
}
