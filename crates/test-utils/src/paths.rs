//! Where the tests find their sample files and scratch directories.

use std::io::Write;
use std::path::{Path, PathBuf};

/// Two levels above this crate's manifest.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent()
        .and_then(Path::parent)
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// `services/{service_name}/testdata/`.
pub fn service_testdata_dir(service_name: &str) -> PathBuf {
    workspace_root()
        .join("services")
        .join(service_name)
        .join("testdata")
}

/// The sample catalog seeding the in-memory stores.
pub fn sample_catalog_path() -> PathBuf {
    service_testdata_dir("sos-worker").join("catalog.yaml")
}

/// The sample worker configuration, pointing at the sample catalog.
pub fn sample_config_path() -> PathBuf {
    service_testdata_dir("sos-worker").join("sos-config.yaml")
}

/// Scratch directory, removed when dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}

/// Write a configuration file into `dir` and return its path.
pub fn write_config(dir: &Path, name: &str, yaml: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("Failed to create configuration file");
    file.write_all(yaml.as_bytes())
        .expect("Failed to write configuration file");
    path
}

/// Configuration YAML seeding both stores from `data_file`.
pub fn config_yaml(data_file: &Path, profile: &str) -> String {
    format!(
        "factory: memory\nprofile: {profile}\nsml:\n  data_file: \"{file}\"\nom:\n  data_file: \"{file}\"\n",
        profile = profile,
        file = data_file.display()
    )
}
