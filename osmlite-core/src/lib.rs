//! Core domain types for the osmlite importer.
//!
//! This crate holds the pieces of the pipeline that do not touch the
//! filesystem layout of a database: the primitive records produced by the
//! extractor, the batch dispatcher that groups them, the style table that
//! drives projection and the classification rules that route ways to line or
//! polygon tables. Storage lives in `osmlite-data`.

mod batch;
mod geometry;
mod primitive;
mod projection;
mod style;
mod tags;

pub use batch::{
    BatchDispatcher, BatchSize, CallbackSinks, DEFAULT_BATCH_SIZE, DispatchStats, PrimitiveSink,
    StreamStats, ZeroBatchSize,
};
pub use geometry::{Geometry, GeometryEngine, GeometryKind, InvalidGeometry};
pub use primitive::{
    Coordinate, Member, MemberType, Primitive, PrimitiveKind, Relation, TaggedNode,
    UnknownMemberType, Way,
};
pub use projection::{ProjectedFeature, ProjectionOptions, TargetTable, classify_way, project};
pub use style::{StyleError, StyleFlag, StyleLineError, StyleRule, StyleTable, parse_style_line};
pub use tags::Tags;
