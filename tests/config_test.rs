use csdl_link::config::*;
use csdl_link::types::Reference;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = LinkerConfig::default();
    assert_eq!(config.version, 1);
    assert!(config.vocabulary_aliases.is_empty());
    assert_eq!(config.forward_reference_passes, DEFAULT_FORWARD_REFERENCE_PASSES);
}

#[test]
fn test_missing_file_yields_default() {
    let dir = TempDir::new().unwrap();
    let loaded = load_config(&dir.path().join("absent.json")).unwrap();
    assert_eq!(loaded, LinkerConfig::default());
}

#[test]
fn test_save_and_load_json_config() {
    let dir = TempDir::new().unwrap();
    let path = get_config_path(dir.path());
    let config = LinkerConfig {
        vocabulary_aliases: vec![Reference {
            alias: "UI".to_string(),
            namespace: "com.sap.vocabularies.UI.v1".to_string(),
            uri: None,
        }],
        forward_reference_passes: 1,
        ..LinkerConfig::default()
    };
    save_config(&path, &config).unwrap();
    let loaded = load_config(&path).unwrap();
    assert_eq!(config, loaded);
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn test_save_and_load_toml_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("csdl-link.toml");
    let config = LinkerConfig {
        forward_reference_passes: 3,
        ..LinkerConfig::default()
    };
    save_config(&path, &config).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("forward_reference_passes = 3"));
    assert_eq!(load_config(&path).unwrap(), config);
}

#[test]
fn test_partial_config_fills_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("partial.json");
    std::fs::write(&path, r#"{ "forward_reference_passes": 2 }"#).unwrap();
    let loaded = load_config(&path).unwrap();
    assert_eq!(loaded.forward_reference_passes, 2);
    assert_eq!(loaded.version, 1);
}

#[test]
fn test_malformed_config_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().starts_with("config error:"), "got {}", err);
}

#[test]
fn test_config_path_uses_default_filename() {
    let dir = TempDir::new().unwrap();
    assert!(get_config_path(dir.path()).ends_with(CONFIG_FILENAME));
}
