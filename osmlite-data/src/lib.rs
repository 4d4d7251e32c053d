//! Storage and ingestion for the osmlite importer.
//!
//! Responsibilities:
//! - Stream OSM XML documents into batches of primitives.
//! - Persist batches into the raw SQLite staging tables.
//! - Route staged records into point, line and polygon tables.
//! - Build optional R*Tree indexes over the routed tables.
//!
//! Boundaries:
//! - Style rules, batching and classification live in `osmlite-core`.
//! - Work is single-threaded; each component borrows the one connection.
//!
//! Invariants:
//! - No global mutable state.
//! - Table names are validated before any SQL is assembled.

mod engine;
mod extract;
mod index;
mod router;
mod store;
pub mod wkb;

pub use engine::GeoEngine;
pub use extract::{
    ExtractError, ExtractSummary, Extraction, MalformedReason, extract_file, extract_primitives,
    is_bz2,
};
pub use index::{IndexError, IndexSummary, create_spatial_indexes};
pub use router::{GeometryRouter, RouteError, RouteSummary, RouterOptions};
pub use store::{
    ColumnPlan, GEOMETRY_COLUMN, RawStoreError, RawTableWriter, SRID, SchemaError, StoreError,
    StyleColumn, TableNames, create_output_tables, create_raw_tables, drop_raw_tables,
    is_plain_identifier, open_database, quote_identifier,
};
