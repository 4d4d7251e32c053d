//! R*Tree spatial indexes over the routed output tables.

use log::{info, warn};
use osmlite_core::TargetTable;
use rusqlite::{Connection, Error as SqliteError};
use thiserror::Error;

use crate::store::{ColumnPlan, GEOMETRY_COLUMN, TableNames, quote_identifier};
use crate::wkb;

/// Errors raised while building spatial indexes.
#[derive(Debug, Error)]
pub enum IndexError {
    /// SQLite rejected an index statement.
    #[error("failed to {operation} for {table}")]
    Sqlite {
        /// Operation in progress.
        operation: &'static str,
        /// Index table being built.
        table: String,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

/// Rows indexed per output table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
    /// Entries in the point index.
    pub points: u64,
    /// Entries in the line index.
    pub lines: u64,
    /// Entries in the polygon index.
    pub polygons: u64,
    /// Rows whose geometry yielded no bounding box.
    pub skipped: u64,
}

impl IndexSummary {
    /// Entries indexed for `target`.
    #[must_use]
    pub const fn indexed(&self, target: TargetTable) -> u64 {
        match target {
            TargetTable::Point => self.points,
            TargetTable::Line => self.lines,
            TargetTable::Polygon => self.polygons,
        }
    }

    fn counter(&mut self, target: TargetTable) -> &mut u64 {
        match target {
            TargetTable::Point => &mut self.points,
            TargetTable::Line => &mut self.lines,
            TargetTable::Polygon => &mut self.polygons,
        }
    }
}

/// Create and fill `<table>_way_rtree` for every output table.
///
/// Each entry carries the row's `osm_id` and the bounding box of its WKB
/// geometry. Existing index tables are rebuilt.
///
/// # Errors
/// Returns [`IndexError`] when a statement fails; the transaction is rolled
/// back.
pub fn create_spatial_indexes(
    connection: &mut Connection,
    names: &TableNames,
) -> Result<IndexSummary, IndexError> {
    let transaction = connection
        .transaction()
        .map_err(|source| IndexError::Sqlite {
            operation: "begin index transaction",
            table: names.prefix().to_owned(),
            source,
        })?;
    let mut summary = IndexSummary::default();
    for target in TargetTable::ALL {
        let source_table = names.output(target);
        let index = names.rtree(target);
        let fail = |operation: &'static str| {
            let table = index.clone();
            move |source| IndexError::Sqlite {
                operation,
                table,
                source,
            }
        };

        transaction
            .execute_batch(&format!(
                "DROP TABLE IF EXISTS {index_q};
                 CREATE VIRTUAL TABLE {index_q} USING rtree(id, min_x, max_x, min_y, max_y);",
                index_q = quote_identifier(&index),
            ))
            .map_err(fail("create rtree table"))?;

        let mut select = transaction
            .prepare(&format!(
                "SELECT {}, {} FROM {}",
                quote_identifier(ColumnPlan::id_column()),
                quote_identifier(GEOMETRY_COLUMN),
                quote_identifier(&source_table),
            ))
            .map_err(fail("prepare geometry scan"))?;
        let mut insert = transaction
            .prepare(&format!(
                "INSERT INTO {} (id, min_x, max_x, min_y, max_y) VALUES (?1, ?2, ?3, ?4, ?5)",
                quote_identifier(&index),
            ))
            .map_err(fail("prepare rtree insert"))?;
        let mut rows = select.query([]).map_err(fail("scan geometries"))?;
        while let Some(row) = rows.next().map_err(fail("read geometry row"))? {
            let id: i64 = row.get(0).map_err(fail("read feature id"))?;
            let geometry: Vec<u8> = row.get(1).map_err(fail("read feature geometry"))?;
            let Some(rect) = wkb::bounds(&geometry) else {
                summary.skipped += 1;
                continue;
            };
            insert
                .execute((id, rect.min().x, rect.max().x, rect.min().y, rect.max().y))
                .map_err(fail("insert rtree entry"))?;
            *summary.counter(target) += 1;
        }
    }
    transaction
        .commit()
        .map_err(|source| IndexError::Sqlite {
            operation: "commit index transaction",
            table: names.prefix().to_owned(),
            source,
        })?;

    info!(
        "indexed {} points, {} lines and {} polygons",
        summary.points, summary.lines, summary.polygons
    );
    if summary.skipped > 0 {
        warn!("{} geometries had no bounding box", summary.skipped);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ColumnPlan, create_output_tables};
    use geo::Coord;
    use osmlite_core::StyleTable;
    use rstest::rstest;

    #[rstest]
    fn indexes_every_output_table() {
        let mut connection = Connection::open_in_memory().expect("in-memory database");
        let names = TableNames::new("osm").expect("valid prefix");
        let plan = ColumnPlan::new(&StyleTable::parse("node,way name text\n"), false);
        create_output_tables(&connection, &names, &plan).expect("create output tables");
        connection
            .execute(
                "INSERT INTO osm_point (osm_id, way) VALUES (?1, ?2), (?3, ?4)",
                (
                    5_i64,
                    wkb::point(Coord { x: 2.5, y: 48.0 }),
                    6_i64,
                    vec![1_u8, 1],
                ),
            )
            .expect("seed points");

        let summary = create_spatial_indexes(&mut connection, &names).expect("build indexes");
        assert_eq!(summary.indexed(TargetTable::Point), 1);
        assert_eq!(summary.indexed(TargetTable::Line), 0);
        assert_eq!(summary.skipped, 1);

        let hit: i64 = connection
            .query_row(
                "SELECT id FROM osm_point_way_rtree WHERE min_x <= 3 AND max_x >= 2 AND min_y <= 49 AND max_y >= 47",
                [],
                |row| row.get(0),
            )
            .expect("query rtree");
        assert_eq!(hit, 5);

        create_spatial_indexes(&mut connection, &names).expect("indexes can be rebuilt");
    }
}
