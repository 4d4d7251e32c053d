//! Records emitted for OpenStreetMap primitives.
//!
//! Coordinates are WGS84 with `lon` as the x axis and `lat` as the y axis.
//! Identifiers are only unique within their own primitive kind: a node, a way
//! and a relation may share the same numeric id.

use std::fmt;
use std::str::FromStr;

use geo::Coord;
use thiserror::Error;

use crate::Tags;

/// Position of a node, with or without tags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    /// Node identifier.
    pub id: i64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl Coordinate {
    /// The position as a `geo` coordinate (`x = lon`, `y = lat`).
    #[must_use]
    pub const fn as_coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

/// A node carrying at least one tag.
///
/// Every tagged node is also emitted as a [`Coordinate`] with the same id and
/// position.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedNode {
    /// Node identifier.
    pub id: i64,
    /// Tags in document order.
    pub tags: Tags,
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl TaggedNode {
    /// The coordinate record emitted alongside this node.
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate {
            id: self.id,
            lon: self.lon,
            lat: self.lat,
        }
    }
}

/// An ordered list of node references with tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Way {
    /// Way identifier.
    pub id: i64,
    /// Tags in document order.
    pub tags: Tags,
    /// Node references. Order defines line direction and ring winding.
    pub refs: Vec<i64>,
}

/// Kind of primitive a relation member points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberType {
    /// A node member.
    Node,
    /// A way member.
    Way,
    /// A nested relation.
    Relation,
}

impl MemberType {
    /// The token used in OSM XML and in the raw relation table.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for MemberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a member type token is not `node`, `way` or `relation`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown relation member type {0:?}")]
pub struct UnknownMemberType(pub String);

impl FromStr for MemberType {
    type Err = UnknownMemberType;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "node" => Ok(Self::Node),
            "way" => Ok(Self::Way),
            "relation" => Ok(Self::Relation),
            other => Err(UnknownMemberType(other.to_owned())),
        }
    }
}

/// One entry of a relation's member list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Identifier of the referenced primitive.
    pub reference: i64,
    /// Kind of the referenced primitive.
    pub member_type: MemberType,
    /// Free-form role, possibly empty.
    pub role: String,
}

/// A relation with its ordered members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Relation identifier.
    pub id: i64,
    /// Tags in document order.
    pub tags: Tags,
    /// Members in document order.
    pub members: Vec<Member>,
}

/// The four independent output streams of the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    /// Tagged nodes.
    Node,
    /// Bare coordinates, one per node.
    Coordinate,
    /// Ways.
    Way,
    /// Relations.
    Relation,
}

impl PrimitiveKind {
    /// All stream kinds, in flush order.
    pub const ALL: [Self; 4] = [Self::Node, Self::Coordinate, Self::Way, Self::Relation];

    /// Lower-case stream name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Coordinate => "coordinate",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single record produced by the extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// A node with tags.
    Node(TaggedNode),
    /// A node position.
    Coordinate(Coordinate),
    /// A way.
    Way(Way),
    /// A relation.
    Relation(Relation),
}

impl Primitive {
    /// The stream this record belongs to.
    #[must_use]
    pub const fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Node(_) => PrimitiveKind::Node,
            Self::Coordinate(_) => PrimitiveKind::Coordinate,
            Self::Way(_) => PrimitiveKind::Way,
            Self::Relation(_) => PrimitiveKind::Relation,
        }
    }
}
