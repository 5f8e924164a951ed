// tests/config_load.rs
use std::io::Write;
use std::time::Duration;

use article_sync::SyncConfig;

const ENV_KEYS: &[&str] = &[
    "SYNC_CONFIG_PATH",
    "SYNC_API_BASE",
    "SYNC_CACHE_TTL_SECS",
    "SYNC_POLL_SECS",
    "SYNC_MIN_RECHECK_SECS",
    "SYNC_SNAPSHOT_PATH",
];

fn clear_env() {
    for k in ENV_KEYS {
        std::env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn partial_file_fills_in_defaults() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "api_base = \"http://localhost:9090\"").unwrap();
    writeln!(f, "poll_interval_secs = 15").unwrap();

    let cfg = SyncConfig::load_from(f.path()).unwrap();
    assert_eq!(cfg.api_base, "http://localhost:9090");
    assert_eq!(cfg.poll_interval(), Duration::from_secs(15));
    // Untouched knobs keep their defaults.
    assert_eq!(cfg.cache_ttl(), Duration::from_secs(300));
    assert_eq!(cfg.min_recheck_spacing(), Duration::from_secs(30));
}

#[serial_test::serial]
#[test]
fn env_path_takes_precedence_and_env_overrides_apply() {
    clear_env();

    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "api_base = \"http://from-file:1\"").unwrap();
    writeln!(f, "cache_ttl_secs = 120").unwrap();

    std::env::set_var("SYNC_CONFIG_PATH", f.path());
    std::env::set_var("SYNC_POLL_SECS", "7");

    let cfg = SyncConfig::load_default().unwrap();
    assert_eq!(cfg.api_base, "http://from-file:1");
    assert_eq!(cfg.cache_ttl(), Duration::from_secs(120));
    assert_eq!(cfg.poll_interval(), Duration::from_secs(7), "env wins over default");

    clear_env();
}

#[serial_test::serial]
#[test]
fn missing_env_path_is_an_error() {
    clear_env();
    std::env::set_var("SYNC_CONFIG_PATH", "/definitely/not/here.toml");
    assert!(SyncConfig::load_default().is_err());
    clear_env();
}

#[serial_test::serial]
#[test]
fn bad_toml_is_a_parse_error() {
    clear_env();
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "cache_ttl_secs = \"not a number\"").unwrap();
    assert!(SyncConfig::load_from(f.path()).is_err());
}
