// Loading bridge configuration from disk
use std::io::Write;

use geobridge::codec::WireFormat;
use geobridge::{BridgeConfig, RoundTripService};

#[test]
fn test_load_config_file() {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    write!(
        file,
        r#"{{
            "library_name": "libengine_v2.so",
            "search_paths": ["/opt/engine/lib", "./lib"],
            "log_capacity": 25,
            "wire_format": "flat",
            "triangulate_meshes": true,
            "builder_capacity": 4096
        }}"#
    )
    .expect("Failed to write config");

    let config = BridgeConfig::load(file.path()).expect("Failed to load config");
    assert_eq!(config.library_name.as_deref(), Some("libengine_v2.so"));
    assert_eq!(config.search_paths.len(), 2);
    assert_eq!(config.log_capacity, 25);
    assert_eq!(config.wire_format, WireFormat::Flat);
    assert!(config.triangulate_meshes);
    assert_eq!(config.builder_capacity, 4096);

    let service = RoundTripService::builtin(config);
    assert_eq!(service.log().capacity(), 25);
}

#[test]
fn test_missing_file_names_the_path() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("absent.json");
    let err = BridgeConfig::load(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("absent.json"));
}

#[test]
fn test_malformed_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    write!(file, "{{ \"log_capacity\": \"many\" }}").expect("Failed to write config");
    assert!(BridgeConfig::load(file.path()).is_err());
}
