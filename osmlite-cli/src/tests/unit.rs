//! Focused unit tests covering import configuration and execution.

use super::helpers::{Inputs, resolve_layers};
use super::*;
use crate::import::{ImportConfig, StyleSource, execute_import};
use camino::Utf8PathBuf;
use osmlite_core::TargetTable;
use osmlite_data::StoreError;
use rstest::{fixture, rstest};
use serde_json::json;

#[fixture]
fn inputs() -> Inputs {
    Inputs::new()
}

fn config_for(inputs: &Inputs) -> ImportConfig {
    resolve_layers(None, None, Some(inputs.cli_layer())).expect("valid configuration")
}

#[rstest]
#[case(json!({ "database": "out.sqlite" }), ARG_INPUT, ENV_INPUT)]
#[case(json!({ "input": "map.osm" }), ARG_DATABASE, ENV_DATABASE)]
fn converting_without_required_fields_errors(
    #[case] cli: serde_json::Value,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let err = resolve_layers(None, None, Some(cli)).expect_err("missing field should error");
    match err {
        CliError::MissingArgument {
            field: missing,
            env,
        } => {
            assert_eq!(missing, field);
            assert_eq!(env, env_var);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn unset_options_take_defaults() {
    let config = resolve_layers(
        None,
        None,
        Some(json!({ "input": "map.osm", "database": "out.sqlite" })),
    )
    .expect("minimal configuration");
    assert_eq!(config.names.prefix(), DEFAULT_PREFIX);
    assert_eq!(
        config.style,
        StyleSource::Default(Utf8PathBuf::from(DEFAULT_STYLE))
    );
    assert_eq!(config.batch_size.get(), 100);
    assert!(!config.json && !config.keep_raw && !config.index);
    assert!(!config.keep_all && !config.force);
}

#[rstest]
fn rejects_unsafe_prefixes() {
    let err = resolve_layers(
        None,
        None,
        Some(json!({ "input": "a.osm", "database": "b.sqlite", "prefix": "osm; DROP" })),
    )
    .expect_err("prefix must be an identifier");
    assert!(matches!(err, CliError::Prefix(_)), "got {err:?}");
}

#[rstest]
fn rejects_zero_batch_size() {
    let err = resolve_layers(
        None,
        None,
        Some(json!({ "input": "a.osm", "database": "b.sqlite", "batch_size": 0 })),
    )
    .expect_err("zero batch size");
    assert!(matches!(err, CliError::BatchSize(_)), "got {err:?}");
}

#[rstest]
fn merge_layers_maps_configuration_errors() {
    let err = resolve_layers(None, None, Some(json!({ "input": 42 })))
        .expect_err("invalid config layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn validate_sources_reports_missing_files(inputs: Inputs) {
    let mut config = config_for(&inputs);
    config.input = inputs.root().join("missing.osm");
    match config.validate_sources().expect_err("missing input") {
        CliError::MissingSourceFile { field, .. } => assert_eq!(field, ARG_INPUT),
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
fn validate_sources_rejects_directories(inputs: Inputs) {
    let mut config = config_for(&inputs);
    config.style = StyleSource::Configured(inputs.root().to_path_buf());
    match config.validate_sources().expect_err("style is a directory") {
        CliError::MissingSourceFile { field, .. } => assert_eq!(field, ARG_STYLE),
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
fn configured_style_must_exist(inputs: Inputs) {
    let mut config = config_for(&inputs);
    config.style = StyleSource::Configured(inputs.root().join("missing.style"));
    match config.validate_sources().expect_err("configured style is missing") {
        CliError::MissingSourceFile { field, .. } => assert_eq!(field, ARG_STYLE),
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
fn missing_default_style_imports_without_rules(inputs: Inputs) {
    let mut config = config_for(&inputs);
    config.style = StyleSource::Default(inputs.root().join(DEFAULT_STYLE));
    config.json = true;
    config.validate_sources().expect("default style is optional");

    let outcome = execute_import(&config).expect("import without style rules");
    assert_eq!(outcome.route.inserted(TargetTable::Point), 1);
    assert_eq!(outcome.route.inserted(TargetTable::Line), 3);
    assert_eq!(outcome.route.inserted(TargetTable::Polygon), 0);
    assert_eq!(outcome.rejected_style_lines, 0);
}

#[rstest]
fn default_style_is_read_when_present(inputs: Inputs) {
    let mut config = config_for(&inputs);
    config.style = StyleSource::Default(inputs.style());
    let outcome = execute_import(&config).expect("import with the default style");
    assert_eq!(outcome.route.inserted(TargetTable::Polygon), 1);
}

#[rstest]
fn imports_and_indexes_the_document(inputs: Inputs) {
    let mut config = config_for(&inputs);
    config.json = true;
    config.index = true;
    let outcome = execute_import(&config).expect("import succeeds");

    assert_eq!(outcome.extract.nodes, 5);
    assert_eq!(outcome.dispatch.coordinates.records, 5);
    assert_eq!(outcome.route.inserted(TargetTable::Point), 1);
    assert_eq!(outcome.route.inserted(TargetTable::Line), 2);
    assert_eq!(outcome.route.inserted(TargetTable::Polygon), 1);
    assert_eq!(outcome.rejected_style_lines, 0);
    let index = outcome.index.expect("index summary");
    assert_eq!(index.indexed(TargetTable::Line), 2);

    let connection = rusqlite::Connection::open(&config.database).expect("open output");
    let tags: String = connection
        .query_row("SELECT tags FROM osm_line WHERE osm_id = 12", [], |row| {
            row.get(0)
        })
        .expect("residual tags");
    assert_eq!(tags, r#"{"highway":"footway"}"#);
}

#[rstest]
fn existing_databases_need_force(inputs: Inputs) {
    let mut config = config_for(&inputs);
    execute_import(&config).expect("first import");

    match execute_import(&config).expect_err("database exists") {
        CliError::OpenDatabase(StoreError::Exists { .. }) => {}
        other => panic!("expected OpenDatabase(Exists), found {other:?}"),
    }

    config.force = true;
    execute_import(&config).expect("forced import replaces the database");
}
