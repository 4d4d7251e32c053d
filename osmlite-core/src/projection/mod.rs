//! Classification and tag projection for routed features.
//!
//! A candidate feature carries its source id, its tags and the geometry
//! chosen for its target table. Projection splits the tags into dedicated
//! style columns and an optional residual map, and decides whether the
//! feature is worth inserting at all.

use std::fmt;

use crate::{Geometry, GeometryKind, StyleTable, Tags};

/// Typed output table a feature is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetTable {
    /// `<prefix>_point`.
    Point,
    /// `<prefix>_line`.
    Line,
    /// `<prefix>_polygon`.
    Polygon,
}

impl TargetTable {
    /// All output tables in creation order.
    pub const ALL: [Self; 3] = [Self::Point, Self::Line, Self::Polygon];

    /// Table name suffix appended to the prefix.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::Polygon => "polygon",
        }
    }

    /// Geometry stored in the table's `way` column.
    #[must_use]
    pub const fn geometry_kind(self) -> GeometryKind {
        match self {
            Self::Point => GeometryKind::Point,
            Self::Line => GeometryKind::LineString,
            Self::Polygon => GeometryKind::MultiPolygon,
        }
    }
}

impl fmt::Display for TargetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Choose the line or polygon table for a way.
///
/// A way is a polygon iff one of its keys is a polygon tag in `style` and it
/// is not tagged `area=no`.
///
/// # Examples
/// ```
/// use osmlite_core::{StyleTable, Tags, TargetTable, classify_way};
///
/// let style = StyleTable::parse("way building text polygon\n");
/// let mut tags = Tags::from([("building", "yes")]);
/// assert_eq!(classify_way(&style, &tags), TargetTable::Polygon);
///
/// tags.insert("area", "no");
/// assert_eq!(classify_way(&style, &tags), TargetTable::Line);
/// ```
#[must_use]
pub fn classify_way(style: &StyleTable, tags: &Tags) -> TargetTable {
    if style.is_polygon_tag(tags.keys()) && tags.get("area") != Some("no") {
        TargetTable::Polygon
    } else {
        TargetTable::Line
    }
}

/// Switches that change what projection keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionOptions {
    /// Store non-deleted tags as a serialized residual column.
    pub retain_residual_tags: bool,
    /// Insert features even when they carry nothing worth projecting.
    pub keep_tagless: bool,
}

/// A feature ready for insertion into its target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedFeature {
    /// Node or way id written to `osm_id`.
    pub source_id: i64,
    /// Geometry for the `way` column.
    pub geometry: Geometry,
    /// Table the row belongs to.
    pub target: TargetTable,
    /// `(column, value)` pairs for style field tags, in tag order.
    pub columns: Vec<(String, String)>,
    /// Tags minus delete-flagged keys, present when residual retention is on.
    pub residual_tags: Option<Tags>,
}

impl ProjectedFeature {
    /// Rebuild a tag map from the residual tags and field columns.
    ///
    /// Delete-flagged keys are not recoverable.
    #[must_use]
    pub fn merged_tags(&self) -> Tags {
        let mut merged = self.residual_tags.clone().unwrap_or_default();
        for (column, value) in &self.columns {
            if !merged.contains_key(column) {
                merged.insert(column.clone(), value.clone());
            }
        }
        merged
    }

    /// Residual tags serialized as JSON, when retained.
    ///
    /// # Errors
    /// Returns the serializer error; string maps do not fail in practice.
    pub fn residual_json(&self) -> Result<Option<String>, serde_json::Error> {
        self.residual_tags
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
    }
}

/// Project `tags` into the column set of `target`.
///
/// Returns `None` when the feature has no field columns, no residual tags
/// (or retention is off) and `keep_tagless` is not set.
#[must_use]
pub fn project(
    style: &StyleTable,
    source_id: i64,
    tags: &Tags,
    geometry: Geometry,
    target: TargetTable,
    options: ProjectionOptions,
) -> Option<ProjectedFeature> {
    let columns: Vec<(String, String)> = tags
        .iter()
        .filter(|(key, _)| style.is_field(key))
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect();
    let residual_tags = options.retain_residual_tags.then(|| {
        let mut residual = tags.clone();
        residual.retain(|key, _| !style.delete_on_export(key));
        residual
    });
    let has_residual = residual_tags.as_ref().is_some_and(|residual| !residual.is_empty());
    if columns.is_empty() && !has_residual && !options.keep_tagless {
        return None;
    }
    Some(ProjectedFeature {
        source_id,
        geometry,
        target,
        columns,
        residual_tags,
    })
}

#[cfg(test)]
mod tests;
