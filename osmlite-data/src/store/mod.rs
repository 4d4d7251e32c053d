//! SQLite staging store: database lifecycle, table naming and raw writes.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use osmlite_core::TargetTable;
use rusqlite::{Connection, Error as SqliteError};
use thiserror::Error;

mod raw;
mod schema;

pub use raw::{RawStoreError, RawTableWriter};
pub use schema::{
    ColumnPlan, GEOMETRY_COLUMN, SRID, SchemaError, StyleColumn, create_output_tables,
    create_raw_tables, drop_raw_tables,
};

/// Errors raised while preparing the database file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database already exists and replacement was not requested.
    #[error("database {path} already exists; pass --force to replace it")]
    Exists {
        /// Database path.
        path: Utf8PathBuf,
    },
    /// Checking for or removing an existing database failed.
    #[error("failed to replace existing database {path}")]
    Replace {
        /// Database path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Failed to create the parent directory for the database.
    #[error("failed to create parent directory for {path}")]
    CreateDirectory {
        /// Database path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}")]
    Open {
        /// Database path.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

/// Open a fresh database at `path`.
///
/// An existing file is an error unless `replace` is set, in which case it
/// is deleted first. Parent directories are created automatically.
///
/// # Errors
/// Returns [`StoreError`] when the file cannot be checked, replaced, or
/// opened.
pub fn open_database(path: &Utf8Path, replace: bool) -> Result<Connection, StoreError> {
    let exists = osmlite_fs::file_is_file(path).map_err(|source| StoreError::Replace {
        path: path.to_path_buf(),
        source,
    })?;
    if exists {
        if !replace {
            return Err(StoreError::Exists {
                path: path.to_path_buf(),
            });
        }
        osmlite_fs::remove_file(path).map_err(|source| StoreError::Replace {
            path: path.to_path_buf(),
            source,
        })?;
        info!("removed existing database {path}");
    }
    osmlite_fs::ensure_parent_dir(path).map_err(|source| StoreError::CreateDirectory {
        path: path.to_path_buf(),
        source,
    })?;
    Connection::open(path.as_std_path()).map_err(|source| StoreError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Quote an SQL identifier, doubling embedded quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Report whether `name` is a plain SQL identifier.
#[must_use]
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Table names derived from a validated prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    prefix: String,
}

impl TableNames {
    /// Validate `prefix` and derive table names from it.
    ///
    /// # Errors
    /// Returns [`SchemaError::InvalidPrefix`] unless the prefix is a plain
    /// SQL identifier.
    pub fn new(prefix: &str) -> Result<Self, SchemaError> {
        if !is_plain_identifier(prefix) {
            return Err(SchemaError::InvalidPrefix {
                prefix: prefix.to_owned(),
            });
        }
        Ok(Self {
            prefix: prefix.to_owned(),
        })
    }

    /// The table prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn with_suffix(&self, suffix: &str) -> String {
        format!("{}_{suffix}", self.prefix)
    }

    /// Tagged nodes: `(id, tags)`.
    #[must_use]
    pub fn nodes(&self) -> String {
        self.with_suffix("nodes")
    }

    /// Node positions: `(id, lat, lon)`.
    #[must_use]
    pub fn coords(&self) -> String {
        self.with_suffix("coords")
    }

    /// Ways: `(id, tags)`.
    #[must_use]
    pub fn ways(&self) -> String {
        self.with_suffix("ways")
    }

    /// Ordered way node references: `(id_way, id_node, seq)`.
    #[must_use]
    pub fn ways_coords(&self) -> String {
        self.with_suffix("ways_coords")
    }

    /// Relations: `(id, tags)`.
    #[must_use]
    pub fn relations(&self) -> String {
        self.with_suffix("relations")
    }

    /// Ordered relation members: `(id_relation, id_elt, type_elt, role, seq)`.
    #[must_use]
    pub fn relations_refs(&self) -> String {
        self.with_suffix("relations_refs")
    }

    /// All six raw staging tables.
    #[must_use]
    pub fn raw_tables(&self) -> [String; 6] {
        [
            self.coords(),
            self.nodes(),
            self.ways(),
            self.ways_coords(),
            self.relations(),
            self.relations_refs(),
        ]
    }

    /// Typed output table for `target`.
    #[must_use]
    pub fn output(&self, target: TargetTable) -> String {
        self.with_suffix(target.suffix())
    }

    /// R*Tree virtual table indexing the geometries of `target`.
    #[must_use]
    pub fn rtree(&self, target: TargetTable) -> String {
        format!("{}_{GEOMETRY_COLUMN}_rtree", self.output(target))
    }
}
