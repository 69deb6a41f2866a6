//! Config file resolution tests
//!
//! Uses serial_test: these tests mutate process environment variables.

use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tryiton_common::config::{resolve_config_path, DataFolder};

const TEST_ENV: &str = "TRYITON_TEST_CONFIG";

#[test]
#[serial]
fn test_cli_argument_takes_precedence() {
    env::set_var(TEST_ENV, "/tmp/from-env.toml");

    let resolved = resolve_config_path(Some(Path::new("/tmp/from-cli.toml")), TEST_ENV, "none.toml");
    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-cli.toml")));

    env::remove_var(TEST_ENV);
}

#[test]
#[serial]
fn test_env_var_used_without_cli() {
    env::set_var(TEST_ENV, "/tmp/from-env.toml");

    let resolved = resolve_config_path(None, TEST_ENV, "none.toml");
    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-env.toml")));

    env::remove_var(TEST_ENV);
}

#[test]
#[serial]
fn test_blank_env_var_is_ignored() {
    env::set_var(TEST_ENV, "   ");

    let resolved = resolve_config_path(None, TEST_ENV, "tryiton-definitely-missing.toml");
    assert_eq!(resolved, None);

    env::remove_var(TEST_ENV);
}

#[test]
#[serial]
fn test_no_sources_yields_none() {
    env::remove_var(TEST_ENV);

    let resolved = resolve_config_path(None, TEST_ENV, "tryiton-definitely-missing.toml");
    assert_eq!(resolved, None);
}

#[test]
fn test_data_folder_creation_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let folder = DataFolder::new(dir.path().join("data"));

    assert!(folder.ensure_directory_exists().is_ok());
    assert!(folder.ensure_directory_exists().is_ok());
    assert!(folder.root().is_dir());
}
