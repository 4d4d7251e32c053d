//! Test helpers that lay out import inputs on disk.

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::MergeComposer;
use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;

use super::CliError;
use crate::import::{ImportConfig, config_from_layers_for_test};

pub(super) const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <node id="1" lat="51.0" lon="0.0"/>
  <node id="2" lat="51.0" lon="0.001"/>
  <node id="3" lat="51.001" lon="0.001"/>
  <node id="4" lat="51.001" lon="0.0"/>
  <node id="5" lat="51.0005" lon="0.0005">
    <tag k="amenity" v="bench"/>
  </node>
  <way id="10">
    <nd ref="1"/><nd ref="2"/><nd ref="3"/><nd ref="4"/><nd ref="1"/>
    <tag k="building" v="yes"/>
  </way>
  <way id="11">
    <nd ref="1"/><nd ref="2"/><nd ref="3"/><nd ref="4"/><nd ref="1"/>
    <tag k="building" v="yes"/>
    <tag k="area" v="no"/>
  </way>
  <way id="12">
    <nd ref="4"/><nd ref="3"/>
    <tag k="highway" v="footway"/>
    <tag k="note" v="muddy"/>
  </way>
</osm>
"#;

pub(super) const STYLE: &str = "\
node,way amenity text
way building text polygon
way highway text linear
way area text
node,way note text delete
";

/// Input files inside a temporary directory.
pub(super) struct Inputs {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Inputs {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        fs::write(root.join("map.osm"), DOCUMENT).expect("write document");
        fs::write(root.join("map.style"), STYLE).expect("write style");
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn input(&self) -> Utf8PathBuf {
        self.root.join("map.osm")
    }

    pub(super) fn style(&self) -> Utf8PathBuf {
        self.root.join("map.style")
    }

    pub(super) fn database(&self) -> Utf8PathBuf {
        self.root.join("out/map.sqlite")
    }

    /// CLI layer naming the input, database and style.
    pub(super) fn cli_layer(&self) -> Value {
        json!({
            "input": self.input().as_str(),
            "database": self.database().as_str(),
            "style": self.style().as_str(),
        })
    }
}

/// Resolve a configuration from optional file, environment and CLI layers.
pub(super) fn resolve_layers(
    file: Option<Value>,
    env: Option<Value>,
    cli: Option<Value>,
) -> Result<ImportConfig, CliError> {
    let mut composer = MergeComposer::new();
    if let Some(layer) = file {
        composer.push_file(layer, None);
    }
    if let Some(layer) = env {
        composer.push_environment(layer);
    }
    if let Some(layer) = cli {
        composer.push_cli(layer);
    }
    config_from_layers_for_test(composer.layers())
}
