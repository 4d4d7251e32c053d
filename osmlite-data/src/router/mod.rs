//! Routing of staged nodes and ways into the typed output tables.
//!
//! The router reads the raw staging tables, asks a [`GeometryEngine`] for
//! candidate geometries, classifies each feature and projects its tags
//! through the [`StyleTable`]. The whole pass runs in one transaction; the
//! raw tables are dropped at the end unless they are kept explicitly.

use geo::Coord;
use log::{debug, info, warn};
use osmlite_core::{
    Geometry, GeometryEngine, InvalidGeometry, ProjectedFeature, ProjectionOptions, StyleTable,
    Tags, TargetTable, classify_way, project,
};
use rusqlite::types::Value;
use rusqlite::{Connection, Error as SqliteError, Transaction, params_from_iter};
use thiserror::Error;

use crate::store::{
    ColumnPlan, GEOMETRY_COLUMN, SchemaError, TableNames, create_output_tables, drop_raw_tables,
    quote_identifier,
};

/// Switches controlling a routing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterOptions {
    /// Residual tag and tagless handling.
    pub projection: ProjectionOptions,
    /// Keep the raw staging tables after routing.
    pub keep_raw: bool,
}

/// Outcome counters of a routing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteSummary {
    /// Rows inserted into the point table.
    pub points: u64,
    /// Rows inserted into the line table.
    pub lines: u64,
    /// Rows inserted into the polygon table.
    pub polygons: u64,
    /// Features skipped because nothing was worth projecting.
    pub skipped_tagless: u64,
    /// Features skipped because the engine rejected their geometry.
    pub invalid_geometry: u64,
    /// Way node references with no stored coordinate.
    pub missing_node_refs: u64,
}

impl RouteSummary {
    /// Rows inserted into `target`.
    #[must_use]
    pub const fn inserted(&self, target: TargetTable) -> u64 {
        match target {
            TargetTable::Point => self.points,
            TargetTable::Line => self.lines,
            TargetTable::Polygon => self.polygons,
        }
    }

    fn record_insert(&mut self, target: TargetTable) {
        let counter = match target {
            TargetTable::Point => &mut self.points,
            TargetTable::Line => &mut self.lines,
            TargetTable::Polygon => &mut self.polygons,
        };
        *counter += 1;
    }
}

/// Errors that abort a routing pass.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Creating output tables or dropping raw tables failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A query against the staging tables failed.
    #[error("failed to {operation}")]
    Sqlite {
        /// Operation in progress.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A staged tag column is not a JSON object of strings.
    #[error("stored tags of record {id} in {table} are not a JSON string map")]
    StoredTags {
        /// Raw table.
        table: String,
        /// Primitive id.
        id: i64,
        /// Source error produced by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// Serializing the residual tags failed.
    #[error("failed to serialize residual tags of feature {id}")]
    SerializeTags {
        /// Primitive id.
        id: i64,
        /// Source error produced by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// Inserting a projected row failed.
    #[error("failed to insert feature {id} into {table}")]
    Insert {
        /// Output table.
        table: String,
        /// Primitive id.
        id: i64,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

fn sqlite_error(operation: &'static str) -> impl FnOnce(SqliteError) -> RouteError {
    move |source| RouteError::Sqlite { operation, source }
}

/// Routes staged records into point, line and polygon tables.
#[derive(Debug)]
pub struct GeometryRouter<'a, G> {
    style: &'a StyleTable,
    engine: G,
    names: &'a TableNames,
    options: RouterOptions,
}

struct PendingWay {
    id: i64,
    tags: String,
    points: Vec<Coord<f64>>,
}

impl<'a, G: GeometryEngine> GeometryRouter<'a, G> {
    /// Create a router for the tables named by `names`.
    pub const fn new(
        style: &'a StyleTable,
        engine: G,
        names: &'a TableNames,
        options: RouterOptions,
    ) -> Self {
        Self {
            style,
            engine,
            names,
            options,
        }
    }

    /// Run one routing pass over the staged records.
    ///
    /// Output tables are created with every style column before the first
    /// row is projected.
    ///
    /// # Errors
    /// Returns [`RouteError`] when the store fails; invalid geometries and
    /// tagless features are counted, not raised.
    pub fn route(&self, connection: &mut Connection) -> Result<RouteSummary, RouteError> {
        let transaction = connection
            .transaction()
            .map_err(sqlite_error("begin routing transaction"))?;
        let plan = ColumnPlan::new(self.style, self.options.projection.retain_residual_tags);
        create_output_tables(&transaction, self.names, &plan)?;

        let mut summary = RouteSummary::default();
        let mut pass = Pass {
            transaction: &transaction,
            plan: &plan,
            names: self.names,
            summary: &mut summary,
        };
        self.route_points(&mut pass)?;
        self.route_ways(&mut pass)?;

        if !self.options.keep_raw {
            drop_raw_tables(&transaction, self.names)?;
        }
        transaction
            .commit()
            .map_err(sqlite_error("commit routing transaction"))?;

        info!(
            "routed {} points, {} lines and {} polygons; skipped {} tagless features",
            summary.points, summary.lines, summary.polygons, summary.skipped_tagless
        );
        if summary.invalid_geometry > 0 {
            warn!(
                "skipped {} features with invalid geometry",
                summary.invalid_geometry
            );
        }
        if summary.missing_node_refs > 0 {
            warn!(
                "skipped {} way node references without coordinates",
                summary.missing_node_refs
            );
        }
        Ok(summary)
    }

    fn route_points(&self, pass: &mut Pass<'_, '_>) -> Result<(), RouteError> {
        let nodes = self.names.nodes();
        let sql = format!(
            "SELECT n.id, n.tags, c.lon, c.lat FROM {} AS n JOIN {} AS c ON c.id = n.id ORDER BY n.id",
            quote_identifier(&nodes),
            quote_identifier(&self.names.coords()),
        );
        let transaction = pass.transaction;
        let mut statement = transaction
            .prepare(&sql)
            .map_err(sqlite_error("prepare point query"))?;
        let mut rows = statement
            .query([])
            .map_err(sqlite_error("query staged points"))?;
        while let Some(row) = rows.next().map_err(sqlite_error("read staged point"))? {
            let id: i64 = row.get(0).map_err(sqlite_error("read node id"))?;
            let tags: String = row.get(1).map_err(sqlite_error("read node tags"))?;
            let lon: f64 = row.get(2).map_err(sqlite_error("read node longitude"))?;
            let lat: f64 = row.get(3).map_err(sqlite_error("read node latitude"))?;
            let tags = decode_tags(&nodes, id, &tags)?;
            let geometry = self.engine.compute_point(lon, lat);
            self.finish_feature(pass, id, &tags, geometry, TargetTable::Point)?;
        }
        Ok(())
    }

    fn route_ways(&self, pass: &mut Pass<'_, '_>) -> Result<(), RouteError> {
        let ways = self.names.ways();
        let sql = format!(
            "SELECT w.id, w.tags, wc.id_node, c.lon, c.lat
                FROM {} AS w
                LEFT JOIN {} AS wc ON wc.id_way = w.id
                LEFT JOIN {} AS c ON c.id = wc.id_node
                ORDER BY w.id, wc.seq",
            quote_identifier(&ways),
            quote_identifier(&self.names.ways_coords()),
            quote_identifier(&self.names.coords()),
        );
        let transaction = pass.transaction;
        let mut statement = transaction
            .prepare(&sql)
            .map_err(sqlite_error("prepare way query"))?;
        let mut rows = statement
            .query([])
            .map_err(sqlite_error("query staged ways"))?;

        let mut pending: Option<PendingWay> = None;
        while let Some(row) = rows.next().map_err(sqlite_error("read staged way"))? {
            let id: i64 = row.get(0).map_err(sqlite_error("read way id"))?;
            if pending.as_ref().is_none_or(|way| way.id != id) {
                if let Some(done) = pending.take() {
                    self.route_way(pass, &ways, done)?;
                }
                pending = Some(PendingWay {
                    id,
                    tags: row.get(1).map_err(sqlite_error("read way tags"))?,
                    points: Vec::new(),
                });
            }
            let node: Option<i64> = row.get(2).map_err(sqlite_error("read way node ref"))?;
            let lon: Option<f64> = row.get(3).map_err(sqlite_error("read way longitude"))?;
            let lat: Option<f64> = row.get(4).map_err(sqlite_error("read way latitude"))?;
            match (node, lon, lat, pending.as_mut()) {
                (Some(_), Some(x), Some(y), Some(way)) => way.points.push(Coord { x, y }),
                (Some(node), _, _, _) => {
                    debug!("way {id} references node {node} without a coordinate");
                    pass.summary.missing_node_refs += 1;
                }
                _ => {}
            }
        }
        if let Some(done) = pending {
            self.route_way(pass, &ways, done)?;
        }
        Ok(())
    }

    fn route_way(
        &self,
        pass: &mut Pass<'_, '_>,
        table: &str,
        way: PendingWay,
    ) -> Result<(), RouteError> {
        let tags = decode_tags(table, way.id, &way.tags)?;
        let line = self.engine.compute_line(&way.points);
        let area = self.engine.compute_closed_area(&way.points);
        let target = classify_way(self.style, &tags);
        let geometry = match target {
            TargetTable::Polygon => area,
            TargetTable::Point | TargetTable::Line => line,
        };
        self.finish_feature(pass, way.id, &tags, geometry, target)
    }

    fn finish_feature(
        &self,
        pass: &mut Pass<'_, '_>,
        id: i64,
        tags: &Tags,
        geometry: Result<Geometry, InvalidGeometry>,
        target: TargetTable,
    ) -> Result<(), RouteError> {
        let geometry = match geometry {
            Ok(geometry) => geometry,
            Err(reason) => {
                debug!("skipping {target} feature {id}: {reason}");
                pass.summary.invalid_geometry += 1;
                return Ok(());
            }
        };
        match project(self.style, id, tags, geometry, target, self.options.projection) {
            Some(feature) => pass.insert(&feature),
            None => {
                pass.summary.skipped_tagless += 1;
                Ok(())
            }
        }
    }
}

struct Pass<'t, 'c> {
    transaction: &'t Transaction<'c>,
    plan: &'t ColumnPlan,
    names: &'t TableNames,
    summary: &'t mut RouteSummary,
}

impl Pass<'_, '_> {
    fn insert(&mut self, feature: &ProjectedFeature) -> Result<(), RouteError> {
        let table = self.names.output(feature.target);
        let mut columns = vec![
            quote_identifier(ColumnPlan::id_column()),
            quote_identifier(GEOMETRY_COLUMN),
        ];
        let mut values = vec![
            Value::Integer(feature.source_id),
            Value::Blob(feature.geometry.wkb().to_vec()),
        ];
        if let Some(residual) = feature
            .residual_json()
            .map_err(|source| RouteError::SerializeTags {
                id: feature.source_id,
                source,
            })?
        {
            columns.push(quote_identifier(ColumnPlan::residual_column()));
            values.push(Value::Text(residual));
        }
        for (tag, value) in &feature.columns {
            if self.plan.contains(tag) {
                columns.push(quote_identifier(tag));
                values.push(Value::Text(value.clone()));
            }
        }

        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            quote_identifier(&table),
            columns.join(", "),
        );
        let mut statement = self
            .transaction
            .prepare_cached(&sql)
            .map_err(sqlite_error("prepare feature insert"))?;
        statement
            .execute(params_from_iter(values))
            .map_err(|source| RouteError::Insert {
                table: table.clone(),
                id: feature.source_id,
                source,
            })?;
        self.summary.record_insert(feature.target);
        Ok(())
    }
}

fn decode_tags(table: &str, id: i64, json: &str) -> Result<Tags, RouteError> {
    serde_json::from_str(json).map_err(|source| RouteError::StoredTags {
        table: table.to_owned(),
        id,
        source,
    })
}

#[cfg(test)]
mod tests;
