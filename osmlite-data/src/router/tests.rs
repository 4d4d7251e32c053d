use super::*;
use crate::engine::GeoEngine;
use crate::store::{RawTableWriter, create_raw_tables};
use osmlite_core::{Coordinate, PrimitiveSink, TaggedNode, Way};
use rstest::{fixture, rstest};

const STYLE: &str = "\
node,way name text
node,way amenity text
way building text polygon
way highway text linear
way area text
node,way source text delete
";

#[fixture]
fn style() -> StyleTable {
    StyleTable::parse(STYLE)
}

#[fixture]
fn names() -> TableNames {
    TableNames::new("osm").expect("valid prefix")
}

fn coordinates() -> Vec<Coordinate> {
    [
        (1, 0.0, 0.0),
        (2, 0.001, 0.0),
        (3, 0.001, 0.001),
        (4, 0.0, 0.001),
    ]
    .into_iter()
    .map(|(id, lon, lat)| Coordinate { id, lon, lat })
    .collect()
}

fn way(id: i64, tags: &[(&str, &str)], refs: &[i64]) -> Way {
    Way {
        id,
        tags: tags.iter().copied().collect(),
        refs: refs.to_vec(),
    }
}

fn staged(names: &TableNames, nodes: Vec<TaggedNode>, ways: Vec<Way>) -> Connection {
    let mut connection = Connection::open_in_memory().expect("in-memory database");
    create_raw_tables(&connection, names).expect("create raw tables");
    let mut writer = RawTableWriter::new(&mut connection, names.clone());
    writer.coordinates(coordinates()).expect("stage coordinates");
    writer.nodes(nodes).expect("stage nodes");
    writer.ways(ways).expect("stage ways");
    connection
}

fn route(
    style: &StyleTable,
    names: &TableNames,
    connection: &mut Connection,
    options: RouterOptions,
) -> RouteSummary {
    GeometryRouter::new(style, GeoEngine, names, options)
        .route(connection)
        .expect("routing succeeds")
}

fn ids(connection: &Connection, table: &str) -> Vec<i64> {
    let mut statement = connection
        .prepare(&format!(
            "SELECT osm_id FROM {} ORDER BY osm_id",
            quote_identifier(table)
        ))
        .expect("prepare id query");
    statement
        .query_map([], |row| row.get(0))
        .expect("query ids")
        .collect::<Result<_, _>>()
        .expect("read ids")
}

#[rstest]
fn routes_ways_by_classification(style: StyleTable, names: TableNames) {
    let ring = [1, 2, 3, 4, 1];
    let mut connection = staged(
        &names,
        Vec::new(),
        vec![
            way(10, &[("building", "yes")], &ring),
            way(11, &[("building", "yes"), ("area", "no")], &ring),
            way(12, &[("highway", "path")], &[1, 2, 3]),
        ],
    );
    let summary = route(&style, &names, &mut connection, RouterOptions::default());

    assert_eq!(summary.polygons, 1);
    assert_eq!(summary.lines, 2);
    assert_eq!(ids(&connection, "osm_polygon"), vec![10]);
    assert_eq!(ids(&connection, "osm_line"), vec![11, 12]);
}

#[rstest]
fn routes_tagged_nodes_to_points(style: StyleTable, names: TableNames) {
    let nodes = vec![
        TaggedNode {
            id: 2,
            tags: [("amenity", "bench"), ("source", "survey")].into(),
            lon: 0.001,
            lat: 0.0,
        },
        TaggedNode {
            id: 3,
            tags: [("source", "survey")].into(),
            lon: 0.001,
            lat: 0.001,
        },
    ];
    let mut connection = staged(&names, nodes, Vec::new());
    let options = RouterOptions {
        projection: ProjectionOptions {
            retain_residual_tags: true,
            keep_tagless: false,
        },
        keep_raw: false,
    };
    let summary = route(&style, &names, &mut connection, options);

    assert_eq!(summary.inserted(TargetTable::Point), 1);
    assert_eq!(summary.skipped_tagless, 1);
    let (amenity, tags): (String, String) = connection
        .query_row("SELECT amenity, tags FROM osm_point WHERE osm_id = 2", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .expect("read point row");
    assert_eq!(amenity, "bench");
    assert_eq!(tags, r#"{"amenity":"bench"}"#);

    let geometry: Vec<u8> = connection
        .query_row("SELECT way FROM osm_point WHERE osm_id = 2", [], |row| row.get(0))
        .expect("read point geometry");
    assert_eq!(geometry, crate::wkb::point(Coord { x: 0.001, y: 0.0 }));
}

#[rstest]
fn keeps_tagless_features_when_asked(style: StyleTable, names: TableNames) {
    let mut connection = staged(
        &names,
        Vec::new(),
        vec![way(20, &[("source", "survey")], &[1, 2])],
    );
    let options = RouterOptions {
        projection: ProjectionOptions {
            retain_residual_tags: false,
            keep_tagless: true,
        },
        keep_raw: false,
    };
    let summary = route(&style, &names, &mut connection, options);
    assert_eq!(summary.lines, 1);
    assert_eq!(summary.skipped_tagless, 0);
}

#[rstest]
fn counts_invalid_geometry_and_missing_refs(style: StyleTable, names: TableNames) {
    let mut connection = staged(
        &names,
        Vec::new(),
        vec![
            // Node 99 was never staged, so only one point remains.
            way(30, &[("highway", "path")], &[1, 99]),
            // Open ring cannot be a polygon.
            way(31, &[("building", "yes")], &[1, 2, 3, 4]),
            way(32, &[("highway", "path")], &[]),
        ],
    );
    let summary = route(&style, &names, &mut connection, RouterOptions::default());

    assert_eq!(summary.missing_node_refs, 1);
    assert_eq!(summary.invalid_geometry, 3);
    assert_eq!(summary.lines + summary.polygons, 0);
}

#[rstest]
#[case(false, false)]
#[case(true, true)]
fn raw_tables_are_dropped_unless_kept(
    style: StyleTable,
    names: TableNames,
    #[case] keep_raw: bool,
    #[case] present: bool,
) {
    let mut connection = staged(&names, Vec::new(), Vec::new());
    let options = RouterOptions {
        keep_raw,
        ..RouterOptions::default()
    };
    route(&style, &names, &mut connection, options);

    let remaining: i64 = connection
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'osm_ways'",
            [],
            |row| row.get(0),
        )
        .expect("query sqlite_master");
    assert_eq!(remaining > 0, present);
}

#[rstest]
fn corrupt_stored_tags_abort_routing(style: StyleTable, names: TableNames) {
    let mut connection = staged(&names, Vec::new(), vec![way(40, &[("name", "x")], &[1, 2])]);
    connection
        .execute("UPDATE osm_ways SET tags = '[1, 2]' WHERE id = 40", [])
        .expect("corrupt tags");

    let err = GeometryRouter::new(&style, GeoEngine, &names, RouterOptions::default())
        .route(&mut connection)
        .expect_err("stored tags are not a map");
    assert!(
        matches!(err, RouteError::StoredTags { id: 40, .. }),
        "got {err:?}"
    );
    let outputs: i64 = connection
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = 'osm_line'",
            [],
            |row| row.get(0),
        )
        .expect("query sqlite_master");
    assert_eq!(outputs, 0, "failed pass is rolled back");
}
