//! Unit tests for style file parsing and predicates.

use super::*;
use rstest::{fixture, rstest};
use std::io::Write;
use tempfile::NamedTempFile;

const SAMPLE_STYLE: &str = "\
# OsmType  Tag          DataType  Flags
node,way   name         text
node,way   highway      text      linear
way        building     text      polygon
way        landuse      text      phstore
node,way   note         text      delete
node,way   FIXME        text      delete   # editors only
this line is rejected because it is far too long
node,way   width        real
";

#[fixture]
fn style() -> StyleTable {
    StyleTable::parse(SAMPLE_STYLE)
}

#[rstest]
#[case("node,way name text", Some(("name", "text", None)))]
#[case("way building text polygon", Some(("building", "text", Some(StyleFlag::Polygon))))]
#[case("   # only a comment", None)]
#[case("", None)]
#[case("node  addr:street  text  # trailing comment", Some(("addr:street", "text", None)))]
fn parses_valid_lines(
    #[case] line: &str,
    #[case] expected: Option<(&str, &str, Option<StyleFlag>)>,
) {
    let parsed = parse_style_line(line).expect("line should parse");
    let summary = parsed
        .as_ref()
        .map(|rule| (rule.tag_name.as_str(), rule.data_type.as_str(), rule.flag.clone()));
    assert_eq!(summary, expected);
}

#[rstest]
#[case("node,way name", StyleLineError::FieldCount { found: 2 })]
#[case("a b c d e", StyleLineError::FieldCount { found: 5 })]
#[case("node name text;DROP polygon", StyleLineError::InvalidDataType { data_type: "text;DROP".into() })]
fn rejects_malformed_lines(#[case] line: &str, #[case] expected: StyleLineError) {
    let err = parse_style_line(line).expect_err("line should be rejected");
    assert_eq!(err, expected);
}

#[rstest]
fn splits_osm_types_on_commas() {
    let rule = parse_style_line("node,way,,relation name text")
        .expect("line should parse")
        .expect("rule present");
    let types: Vec<&str> = rule.osm_types.iter().map(String::as_str).collect();
    assert_eq!(types, vec!["node", "relation", "way"]);
}

#[rstest]
fn counts_rejected_lines_and_keeps_the_rest(style: StyleTable) {
    assert_eq!(style.rejected_lines(), 1);
    assert_eq!(style.len(), 7);
}

#[rstest]
#[case("name", true)]
#[case("highway", true)]
#[case("building", true)]
#[case("width", true)]
#[case("landuse", false)]
#[case("note", false)]
#[case("unknown", false)]
fn is_field_excludes_phstore_and_delete(style: StyleTable, #[case] tag: &str, #[case] expected: bool) {
    assert_eq!(style.is_field(tag), expected, "is_field({tag})");
}

#[rstest]
#[case(&["building"], true)]
#[case(&["landuse"], true)]
#[case(&["name", "highway"], false)]
#[case(&[], false)]
fn polygon_tags_include_phstore(style: StyleTable, #[case] tags: &[&str], #[case] expected: bool) {
    assert_eq!(style.is_polygon_tag(tags.iter().copied()), expected);
}

#[rstest]
fn delete_on_export_only_matches_delete_flag(style: StyleTable) {
    assert!(style.delete_on_export("note"));
    assert!(style.delete_on_export("FIXME"));
    assert!(!style.delete_on_export("name"));
    assert!(!style.delete_on_export("missing"));
}

#[rstest]
fn unknown_flags_behave_like_normal(style: StyleTable) {
    let rule = style.get("highway").expect("highway rule");
    assert_eq!(rule.flag, Some(StyleFlag::Other("linear".into())));
    assert!(rule.is_field());
    assert!(!rule.is_polygon());
}

#[rstest]
fn last_definition_wins() {
    let style = StyleTable::parse("way building text polygon\nnode building int4\n");
    let rule = style.get("building").expect("building rule");
    assert_eq!(rule.data_type, "int4");
    assert_eq!(rule.flag, None);
    assert!(!style.is_polygon_tag(["building"]));
}

#[rstest]
fn field_rules_are_sorted(style: StyleTable) {
    let names: Vec<&str> = style
        .field_rules()
        .into_iter()
        .map(|rule| rule.tag_name.as_str())
        .collect();
    assert_eq!(names, vec!["building", "highway", "name", "width"]);
}

#[rstest]
fn loading_twice_is_idempotent() {
    let mut file = NamedTempFile::new().expect("create style file");
    file.write_all(SAMPLE_STYLE.as_bytes()).expect("write style");
    let path = Utf8Path::from_path(file.path()).expect("utf-8 temp path");

    let first = StyleTable::load(path).expect("load style");
    let second = StyleTable::load(path).expect("reload style");

    assert_eq!(first, second);
    for (tag, _) in first.iter() {
        assert_eq!(first.is_field(tag), second.is_field(tag));
        assert_eq!(first.delete_on_export(tag), second.delete_on_export(tag));
        assert_eq!(first.is_polygon_tag([tag]), second.is_polygon_tag([tag]));
    }
    assert_eq!(first, StyleTable::parse(SAMPLE_STYLE));
}

#[rstest]
fn missing_file_reports_open_error() {
    let dir = tempfile::TempDir::new().expect("create temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("absent.style")).expect("utf-8 path");
    let err = StyleTable::load(&path).expect_err("missing style should fail");
    match err {
        StyleError::Open { path: reported, .. } => assert_eq!(reported, path),
        other @ StyleError::Read { .. } => panic!("expected open error, got {other:?}"),
    }
}
