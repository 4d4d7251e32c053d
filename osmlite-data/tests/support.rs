//! Shared helpers for the staging pipeline tests.

use camino::Utf8PathBuf;
use osmlite_core::{BatchDispatcher, BatchSize, StyleTable};
use osmlite_data::{
    ExtractError, ExtractSummary, GeoEngine, GeometryRouter, RawStoreError, RawTableWriter,
    RouteSummary, RouterOptions, TableNames, create_raw_tables, extract_file, open_database,
};
use rusqlite::Connection;
use tempfile::TempDir;

/// Directory containing the document and style fixtures.
pub fn fixtures_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Style table loaded from `sample.style`.
pub fn sample_style() -> StyleTable {
    StyleTable::load(&fixtures_dir().join("sample.style"))
        .unwrap_or_else(|err| panic!("failed to load sample style: {err}"))
}

/// A database file inside a fresh temporary directory.
pub struct Workspace {
    _dir: TempDir,
    /// Location of the SQLite database.
    pub database: Utf8PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap_or_else(|err| panic!("failed to create temp dir: {err}"));
        let database = Utf8PathBuf::from_path_buf(dir.path().join("staging.sqlite"))
            .unwrap_or_else(|path| panic!("temp path {path:?} is not UTF-8"));
        Self {
            _dir: dir,
            database,
        }
    }
}

/// Outcome of staging and routing one document.
pub struct Staged {
    pub connection: Connection,
    pub extract: ExtractSummary,
    pub route: RouteSummary,
}

/// Extract `document` into a fresh database and route it.
pub fn stage(
    workspace: &Workspace,
    document: &str,
    batch_size: usize,
    options: RouterOptions,
) -> Result<Staged, ExtractError<RawStoreError>> {
    let names = TableNames::new("osm").unwrap_or_else(|err| panic!("invalid prefix: {err}"));
    let mut connection = open_database(&workspace.database, false)
        .unwrap_or_else(|err| panic!("failed to open database: {err}"));
    create_raw_tables(&connection, &names)
        .unwrap_or_else(|err| panic!("failed to create raw tables: {err}"));

    let size = BatchSize::new(batch_size).unwrap_or_else(|err| panic!("{err}"));
    let writer = RawTableWriter::new(&mut connection, names.clone());
    let extraction = extract_file(
        &fixtures_dir().join(document),
        BatchDispatcher::new(writer, size),
    )?;
    let extract = extraction.summary;

    let style = sample_style();
    let route = GeometryRouter::new(&style, GeoEngine, &names, options)
        .route(&mut connection)
        .unwrap_or_else(|err| panic!("routing failed: {err}"));
    Ok(Staged {
        connection,
        extract,
        route,
    })
}

/// Number of rows in `table`.
pub fn row_count(connection: &Connection, table: &str) -> i64 {
    connection
        .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
            row.get(0)
        })
        .unwrap_or_else(|err| panic!("failed to count rows of {table}: {err}"))
}

/// Whether a table called `table` exists.
pub fn table_exists(connection: &Connection, table: &str) -> bool {
    connection
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = ?1",
            [table],
            |row| row.get::<_, i64>(0),
        )
        .unwrap_or_else(|err| panic!("failed to query sqlite_master: {err}"))
        > 0
}
