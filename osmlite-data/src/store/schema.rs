#![forbid(unsafe_code)]

use std::collections::HashSet;

use log::warn;
use osmlite_core::{StyleTable, TargetTable};
use rusqlite::{Connection, Error as SqliteError};
use thiserror::Error;

use super::{TableNames, quote_identifier};
use crate::wkb;

/// Name of the geometry column in every output table.
pub const GEOMETRY_COLUMN: &str = "way";

/// Spatial reference of stored geometries (WGS84).
pub const SRID: i64 = 4326;

const ID_COLUMN: &str = "osm_id";
const RESIDUAL_COLUMN: &str = "tags";

/// Errors raised while creating or dropping tables.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The table prefix cannot be used in SQL.
    #[error("table prefix {prefix:?} must start with a letter or '_' and contain only ASCII letters, digits and '_'")]
    InvalidPrefix {
        /// Rejected prefix.
        prefix: String,
    },
    /// A DDL statement failed.
    #[error("failed to {step} for table {table}")]
    Migration {
        /// What was being done.
        step: &'static str,
        /// Table concerned.
        table: String,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

/// A style-declared column of the output tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleColumn {
    /// Tag projected into the column; also the column name.
    pub tag: String,
    /// SQL type from the style file.
    pub data_type: String,
}

/// Columns shared by the three output tables.
///
/// Built once from the style table before any row is projected. Tags whose
/// names collide with the fixed columns, or with an earlier tag under
/// SQLite's case-insensitive column matching, get no column of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    columns: Vec<StyleColumn>,
    residual: bool,
}

impl ColumnPlan {
    /// Plan columns for every field rule of `style`.
    #[must_use]
    pub fn new(style: &StyleTable, residual: bool) -> Self {
        let mut taken: HashSet<String> = [ID_COLUMN, GEOMETRY_COLUMN]
            .into_iter()
            .chain(residual.then_some(RESIDUAL_COLUMN))
            .map(str::to_owned)
            .collect();
        let mut columns = Vec::new();
        for rule in style.field_rules() {
            if !taken.insert(rule.tag_name.to_ascii_lowercase()) {
                warn!(
                    "style tag {:?} collides with another column and is only kept in the tags column",
                    rule.tag_name
                );
                continue;
            }
            columns.push(StyleColumn {
                tag: rule.tag_name.clone(),
                data_type: rule.data_type.clone(),
            });
        }
        Self { columns, residual }
    }

    /// Style columns in creation order.
    #[must_use]
    pub fn columns(&self) -> &[StyleColumn] {
        &self.columns
    }

    /// Whether `tag` has a dedicated column.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.columns.iter().any(|column| column.tag == tag)
    }

    /// Whether the output tables carry the residual `tags` column.
    #[must_use]
    pub const fn residual(&self) -> bool {
        self.residual
    }

    /// Name of the residual column.
    #[must_use]
    pub const fn residual_column() -> &'static str {
        RESIDUAL_COLUMN
    }

    /// Name of the id column.
    #[must_use]
    pub const fn id_column() -> &'static str {
        ID_COLUMN
    }
}

fn run_migration_step(
    connection: &Connection,
    step: &'static str,
    table: &str,
    sql: &str,
) -> Result<(), SchemaError> {
    connection
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SchemaError::Migration {
            step,
            table: table.to_owned(),
            source,
        })
}

/// Create the six raw staging tables.
///
/// # Errors
/// Returns [`SchemaError::Migration`] when a statement fails.
pub fn create_raw_tables(connection: &Connection, names: &TableNames) -> Result<(), SchemaError> {
    let tagged = [names.nodes(), names.ways(), names.relations()];
    for table in &tagged {
        run_migration_step(
            connection,
            "create raw table",
            table,
            &format!(
                "CREATE TABLE {} (id INTEGER PRIMARY KEY, tags TEXT NOT NULL)",
                quote_identifier(table)
            ),
        )?;
    }
    let coords = names.coords();
    run_migration_step(
        connection,
        "create raw table",
        &coords,
        &format!(
            "CREATE TABLE {} (id INTEGER PRIMARY KEY, lat REAL NOT NULL, lon REAL NOT NULL)",
            quote_identifier(&coords)
        ),
    )?;
    let ways_coords = names.ways_coords();
    run_migration_step(
        connection,
        "create raw table",
        &ways_coords,
        &format!(
            "CREATE TABLE {} (
                id_way INTEGER NOT NULL,
                id_node INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                PRIMARY KEY (id_way, seq)
            ) WITHOUT ROWID",
            quote_identifier(&ways_coords)
        ),
    )?;
    let relations_refs = names.relations_refs();
    run_migration_step(
        connection,
        "create raw table",
        &relations_refs,
        &format!(
            "CREATE TABLE {} (
                id_relation INTEGER NOT NULL,
                id_elt INTEGER NOT NULL,
                type_elt TEXT NOT NULL CHECK (type_elt IN ('node', 'way', 'relation')),
                role TEXT NOT NULL,
                seq INTEGER NOT NULL,
                PRIMARY KEY (id_relation, seq)
            ) WITHOUT ROWID",
            quote_identifier(&relations_refs)
        ),
    )
}

/// Create the point, line and polygon tables with every planned column.
///
/// Each table is registered in `geometry_columns` with its geometry type and
/// SRID 4326.
///
/// # Errors
/// Returns [`SchemaError::Migration`] when a statement fails.
pub fn create_output_tables(
    connection: &Connection,
    names: &TableNames,
    plan: &ColumnPlan,
) -> Result<(), SchemaError> {
    run_migration_step(
        connection,
        "create geometry metadata",
        "geometry_columns",
        "CREATE TABLE IF NOT EXISTS geometry_columns (
            f_table_name TEXT NOT NULL,
            f_geometry_column TEXT NOT NULL,
            geometry_type INTEGER NOT NULL,
            coord_dimension INTEGER NOT NULL,
            srid INTEGER NOT NULL,
            geometry_format TEXT NOT NULL,
            PRIMARY KEY (f_table_name, f_geometry_column)
        )",
    )?;

    for target in TargetTable::ALL {
        let table = names.output(target);
        let quoted = quote_identifier(&table);
        let residual = if plan.residual() {
            format!(", {} TEXT", quote_identifier(RESIDUAL_COLUMN))
        } else {
            String::new()
        };
        run_migration_step(
            connection,
            "create output table",
            &table,
            &format!(
                "CREATE TABLE {quoted} ({} INTEGER PRIMARY KEY, {} BLOB NOT NULL{residual})",
                quote_identifier(ID_COLUMN),
                quote_identifier(GEOMETRY_COLUMN),
            ),
        )?;
        for column in plan.columns() {
            run_migration_step(
                connection,
                "add style column",
                &table,
                &format!(
                    "ALTER TABLE {quoted} ADD COLUMN {} {}",
                    quote_identifier(&column.tag),
                    column.data_type
                ),
            )?;
        }
        connection
            .execute(
                "INSERT OR REPLACE INTO geometry_columns (
                    f_table_name, f_geometry_column, geometry_type,
                    coord_dimension, srid, geometry_format
                ) VALUES (?1, ?2, ?3, 2, ?4, 'WKB')",
                (
                    table.as_str(),
                    GEOMETRY_COLUMN,
                    wkb::type_code(target.geometry_kind()),
                    SRID,
                ),
            )
            .map_err(|source| SchemaError::Migration {
                step: "register geometry column",
                table: table.clone(),
                source,
            })?;
    }
    Ok(())
}

/// Drop the six raw staging tables.
///
/// # Errors
/// Returns [`SchemaError::Migration`] when a statement fails.
pub fn drop_raw_tables(connection: &Connection, names: &TableNames) -> Result<(), SchemaError> {
    for table in names.raw_tables() {
        run_migration_step(
            connection,
            "drop raw table",
            &table,
            &format!("DROP TABLE IF EXISTS {}", quote_identifier(&table)),
        )?;
    }
    Ok(())
}
