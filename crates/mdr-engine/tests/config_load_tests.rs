#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;
use std::path::PathBuf;

use mdr_engine::config::load;

// Single test in this binary: it mutates process environment.
#[test]
fn test_defaults_then_file_then_environment() {
    // GIVEN a config file overriding the cache and the database path
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
        [database]
        path = "/tmp/from-file.db"

        [cache]
        max_capacity = 42
        ttl_secs = 60
        "#
    )
    .unwrap();

    // AND an environment override of one of the file's keys
    std::env::set_var("MDR__CACHE__TTL_SECS", "7");

    // WHEN loading
    let config = load(Some(file.path())).unwrap();
    std::env::remove_var("MDR__CACHE__TTL_SECS");

    // THEN env beats file, file beats defaults, untouched keys keep defaults
    assert_eq!(config.cache.ttl_secs, 7);
    assert_eq!(config.cache.max_capacity, 42);
    assert_eq!(config.database.path, PathBuf::from("/tmp/from-file.db"));
    assert_eq!(config.listing.max_page_size, 1000);
    assert!(config.validate().is_ok());

    // AND a missing file falls back to defaults
    let missing = load(Some(&file.path().with_extension("absent.toml"))).unwrap();
    assert_eq!(missing.cache.max_capacity, 1000);
}
