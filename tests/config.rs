use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;

use kira_structure_selector::config::{ConfigLoader, ConfigOverrides};
use kira_structure_selector::domain::StructureFormat;
use kira_structure_selector::error::SelectorError;

#[test]
fn resolve_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-ss.json");
    fs::write(
        &path,
        r#"{
            "destination": "structures",
            "format": "cif",
            "workers": 3,
            "timeouts": {"download_secs": 120},
            "absent_marker": ""
        }"#,
    )
    .unwrap();

    let resolved =
        ConfigLoader::resolve(path.to_str(), ConfigOverrides::default()).unwrap();
    assert_eq!(resolved.destination.as_str(), "structures");
    assert_eq!(resolved.format, StructureFormat::Cif);
    assert_eq!(resolved.workers, 3);
    assert_eq!(resolved.timeouts.download, Duration::from_secs(120));
    assert_eq!(resolved.timeouts.resolve, Duration::from_secs(10));
    assert_eq!(resolved.absent_marker, "");
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("nope.json");
    let err = ConfigLoader::resolve(path.to_str(), ConfigOverrides::default()).unwrap_err();
    assert_matches!(err, SelectorError::ConfigRead(_));
}

#[test]
fn invalid_values_are_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-ss.json");

    fs::write(&path, r#"{"workers": 0}"#).unwrap();
    let err = ConfigLoader::resolve(path.to_str(), ConfigOverrides::default()).unwrap_err();
    assert_matches!(err, SelectorError::InvalidConfig(_));

    fs::write(&path, r#"{"timeouts": {"metadata_secs": 0}}"#).unwrap();
    let err = ConfigLoader::resolve(path.to_str(), ConfigOverrides::default()).unwrap_err();
    assert_matches!(err, SelectorError::InvalidConfig(_));

    fs::write(&path, "{not json").unwrap();
    let err = ConfigLoader::resolve(path.to_str(), ConfigOverrides::default()).unwrap_err();
    assert_matches!(err, SelectorError::ConfigParse(_));
}
