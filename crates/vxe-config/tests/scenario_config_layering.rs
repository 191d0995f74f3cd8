use std::io::Write;

use vxe_config::{
    load_layered_yaml, load_layered_yaml_from_strings, ExporterConfig, LoadedConfig,
};

const BASE_YAML: &str = include_str!("../../../config/base.yaml");

const BASE_REORDERED: &str = r#"
update:
  interval_secs: 60
server:
  listen_address: "0.0.0.0:8622"
api:
  timeout_secs: 30
  key_env: "VASTAI_API_KEY"
  base_url: "https://console.vast.ai/api/v0"
"#;

const OVERLAY_YAML: &str = r#"
server:
  listen_address: ":9400"
update:
  interval_secs: 15
"#;

#[test]
fn shipped_base_config_matches_defaults() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let cfg = ExporterConfig::from_json(&loaded.config_json).unwrap();
    assert_eq!(cfg, ExporterConfig::default());
}

#[test]
fn hash_is_stable_and_order_independent() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let c = load_layered_yaml_from_strings(&[BASE_REORDERED]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.config_hash, c.config_hash);
    assert_eq!(a.canonical_json, c.canonical_json);
    assert_eq!(a.config_hash.len(), 64);
}

#[test]
fn overlay_overrides_base_and_changes_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, merged.config_hash);

    let cfg = ExporterConfig::from_json(&merged.config_json).unwrap();
    assert_eq!(cfg.listen_address, "0.0.0.0:9400");
    assert_eq!(cfg.update_interval_secs, 15);
    // Untouched by the overlay.
    assert_eq!(cfg.timeout_secs, 30);
}

#[test]
fn no_layers_is_an_empty_config_with_defaults() {
    let loaded = LoadedConfig::empty().unwrap();
    assert_eq!(loaded.canonical_json, "{}");
    let cfg = ExporterConfig::from_json(&loaded.config_json).unwrap();
    assert_eq!(cfg, ExporterConfig::default());
}

#[test]
fn layers_load_from_files_in_order() {
    let mut base = tempfile::NamedTempFile::new().unwrap();
    base.write_all(BASE_YAML.as_bytes()).unwrap();
    let mut overlay = tempfile::NamedTempFile::new().unwrap();
    overlay.write_all(OVERLAY_YAML.as_bytes()).unwrap();

    let loaded = load_layered_yaml(&[base.path(), overlay.path()]).unwrap();
    let from_strings = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(loaded.config_hash, from_strings.config_hash);
}

#[test]
fn missing_file_names_the_path() {
    let err = load_layered_yaml(&["/definitely/not/here.yaml"]).unwrap_err();
    assert!(format!("{err:#}").contains("/definitely/not/here.yaml"));
}

#[test]
fn invalid_yaml_is_an_error() {
    assert!(load_layered_yaml_from_strings(&["api: [unclosed"]).is_err());
}
