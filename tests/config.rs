use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;

use molgen_client::config::{ConfigLoader, parse_filter_arg};
use molgen_client::error::MolgenError;
use molgen_client::filters::FilterProperty;
use molgen_client::service::DEFAULT_ENDPOINT;

#[test]
fn resolve_explicit_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("molgen.json");
    fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "endpoint": "http://gpu-box:8000/generate_molecules/",
            "timeout_secs": 90,
            "num_molecules": 40,
            "structures": ["receptor.pdb"],
            "filters": {"tpsa": [20, 140], "rot_bonds": {"max": 6}}
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.endpoint, "http://gpu-box:8000/generate_molecules/");
    assert_eq!(resolved.timeout, Duration::from_secs(90));
    assert_eq!(resolved.filters.num_molecules(), 40);
    assert_eq!(resolved.structures[0].as_str(), "receptor.pdb");
    let tpsa = resolved.filters.interval(FilterProperty::Tpsa);
    assert_eq!((tpsa.min(), tpsa.max()), (20.0, 140.0));
    let rot = resolved.filters.interval(FilterProperty::RotatableBonds);
    assert_eq!((rot.min(), rot.max()), (0.0, 6.0));
}

#[test]
fn empty_config_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("molgen.json");
    fs::write(&path, "{}").unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.endpoint, DEFAULT_ENDPOINT);
    assert_eq!(resolved.timeout, Duration::from_secs(600));
    assert!(resolved.structures.is_empty());
    assert_eq!(resolved.filters.num_molecules(), 10);
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(MolgenError::ConfigRead(_))
    );
}

#[test]
fn invalid_json_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("molgen.json");
    fs::write(&path, "{\"filters\": ").unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(MolgenError::ConfigParse(_))
    );
}

#[test]
fn zero_molecules_in_config_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("molgen.json");
    fs::write(&path, r#"{"num_molecules": 0}"#).unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(MolgenError::InvalidFilter(_))
    );
}

#[test]
fn cli_filter_applies_on_top_of_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("molgen.json");
    fs::write(&path, r#"{"filters": {"mw": [300, 500]}}"#).unwrap();
    let mut resolved = ConfigLoader::resolve(path.to_str()).unwrap();

    let (property, interval) = parse_filter_arg("mw=450:", &resolved.filters).unwrap();
    resolved.filters.set_interval(property, interval);

    let mw = resolved.filters.interval(FilterProperty::MolecularWeight);
    assert_eq!((mw.min(), mw.max()), (450.0, 500.0));
}
