//! Unit and property tests for way classification and tag projection.

use super::*;
use proptest::prelude::*;
use rstest::{fixture, rstest};

const STYLE: &str = "\
node,way name     text
node,way highway  text
way      building text polygon
way      landuse  text phstore
node,way note     text delete
node,way source   text delete
";

#[fixture]
fn style() -> StyleTable {
    StyleTable::parse(STYLE)
}

fn point() -> Geometry {
    Geometry::new(GeometryKind::Point, vec![1, 1, 0, 0, 0])
}

#[rstest]
#[case(&[("building", "yes")], TargetTable::Polygon)]
#[case(&[("building", "yes"), ("area", "no")], TargetTable::Line)]
#[case(&[("landuse", "meadow")], TargetTable::Polygon)]
#[case(&[("highway", "residential")], TargetTable::Line)]
#[case(&[("building", "yes"), ("area", "yes")], TargetTable::Polygon)]
#[case(&[], TargetTable::Line)]
fn classifies_ways(
    style: StyleTable,
    #[case] pairs: &[(&str, &str)],
    #[case] expected: TargetTable,
) {
    let tags: Tags = pairs.iter().copied().collect();
    assert_eq!(classify_way(&style, &tags), expected);
}

#[rstest]
fn highway_is_not_a_polygon_tag_without_a_rule(style: StyleTable) {
    let tags = Tags::from([("highway", "pedestrian"), ("area", "yes")]);
    assert_eq!(classify_way(&style, &tags), TargetTable::Line);
}

#[rstest]
fn projects_field_columns_in_tag_order(style: StyleTable) {
    let tags = Tags::from([
        ("name", "High Street"),
        ("landuse", "retail"),
        ("highway", "primary"),
        ("note", "check"),
    ]);
    let feature = project(
        &style,
        9,
        &tags,
        point(),
        TargetTable::Line,
        ProjectionOptions::default(),
    )
    .expect("feature has field columns");

    assert_eq!(
        feature.columns,
        vec![
            ("name".to_owned(), "High Street".to_owned()),
            ("highway".to_owned(), "primary".to_owned()),
        ]
    );
    assert_eq!(feature.residual_tags, None);
    assert_eq!(feature.residual_json().expect("serialize"), None);
}

#[rstest]
fn residual_drops_delete_flagged_tags(style: StyleTable) {
    let tags = Tags::from([("name", "Pond"), ("note", "x"), ("natural", "water")]);
    let options = ProjectionOptions {
        retain_residual_tags: true,
        keep_tagless: false,
    };
    let feature = project(&style, 1, &tags, point(), TargetTable::Polygon, options)
        .expect("feature kept");

    let residual = feature.residual_tags.clone().expect("residual retained");
    assert_eq!(
        residual.iter().collect::<Vec<_>>(),
        vec![("name", "Pond"), ("natural", "water")]
    );
    assert_eq!(
        feature.residual_json().expect("serialize").as_deref(),
        Some(r#"{"name":"Pond","natural":"water"}"#)
    );
}

#[rstest]
#[case(false, false, false)]
#[case(true, false, false)]
#[case(false, true, true)]
#[case(true, true, true)]
fn delete_only_features_need_the_override(
    style: StyleTable,
    #[case] retain_residual_tags: bool,
    #[case] keep_tagless: bool,
    #[case] kept: bool,
) {
    let tags = Tags::from([("note", "x"), ("source", "survey")]);
    let options = ProjectionOptions {
        retain_residual_tags,
        keep_tagless,
    };
    let feature = project(&style, 3, &tags, point(), TargetTable::Point, options);
    assert_eq!(feature.is_some(), kept);
    if let Some(feature) = feature {
        assert!(feature.columns.is_empty());
    }
}

#[rstest]
fn unstyled_tags_survive_through_the_residual_column(style: StyleTable) {
    let tags = Tags::from([("amenity", "bench")]);
    let without = project(
        &style,
        4,
        &tags,
        point(),
        TargetTable::Point,
        ProjectionOptions::default(),
    );
    assert!(without.is_none());

    let options = ProjectionOptions {
        retain_residual_tags: true,
        keep_tagless: false,
    };
    assert!(project(&style, 4, &tags, point(), TargetTable::Point, options).is_some());
}

fn tag_pairs() -> impl Strategy<Value = Vec<(String, String)>> {
    let key = prop_oneof![
        Just("name".to_owned()),
        Just("highway".to_owned()),
        Just("building".to_owned()),
        Just("landuse".to_owned()),
        Just("note".to_owned()),
        Just("source".to_owned()),
        "[a-z]{1,8}",
    ];
    proptest::collection::vec((key, "[a-zA-Z0-9 ]{0,12}"), 0..12)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn merging_residual_and_columns_restores_non_deleted_tags(pairs in tag_pairs()) {
        let style = StyleTable::parse(STYLE);
        let tags: Tags = pairs.into_iter().collect();
        let options = ProjectionOptions { retain_residual_tags: true, keep_tagless: true };
        let feature = project(&style, 1, &tags, point(), TargetTable::Line, options)
            .expect("keep_tagless always inserts");

        let mut expected = tags.clone();
        expected.retain(|key, _| !style.delete_on_export(key));
        prop_assert_eq!(feature.merged_tags(), expected);
    }
}
