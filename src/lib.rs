//! Facade crate for the osmlite importer.
//!
//! This crate re-exports the core domain types and, behind the
//! `store-sqlite` feature, the SQLite staging pipeline.

#![forbid(unsafe_code)]

pub use osmlite_core::{
    BatchDispatcher, BatchSize, CallbackSinks, Coordinate, DispatchStats, Geometry,
    GeometryEngine, GeometryKind, InvalidGeometry, Member, MemberType, Primitive, PrimitiveKind,
    PrimitiveSink, ProjectedFeature, ProjectionOptions, Relation, StyleFlag, StyleRule,
    StyleTable, TaggedNode, Tags, TargetTable, Way, classify_way, project,
};

#[cfg(feature = "store-sqlite")]
pub use osmlite_data::{
    ExtractError, ExtractSummary, GeoEngine, GeometryRouter, IndexSummary, RawTableWriter,
    RouteError, RouteSummary, RouterOptions, TableNames, create_raw_tables,
    create_spatial_indexes, extract_file, extract_primitives, open_database,
};
