//! Overrides read from the real process environment.
//!
//! Each test uses its own prefix so tests running in parallel never see each
//! other's variables.

use std::env;

use freetsdb_config::{Config, ConfigLoader, StdEnv};

#[test]
fn std_env_overrides_singleton_and_repeated_sections() {
    env::set_var("FREETSDB_PROCTEST_HTTP_AUTH_ENABLED", "true");
    env::set_var("FREETSDB_PROCTEST_UDP_1_DATABASE", "telemetry");
    env::set_var("FREETSDB_PROCTEST_UDP_2_DATABASE", "ignored");

    let mut config = Config::default();
    let report = config
        .apply_env_overrides("FREETSDB_PROCTEST", &StdEnv)
        .unwrap();

    assert!(config.http.auth_enabled);
    assert_eq!(config.udps.len(), 1);
    assert_eq!(config.udps[0].database, "telemetry");
    assert_eq!(report.applied.len(), 2);
}

#[test]
fn loader_reads_process_environment_by_default() {
    env::set_var("FREETSDB_LOADERTEST_META_DIR", "/srv/meta");
    env::set_var("FREETSDB_LOADERTEST_DATA_DIR", "/srv/data");
    env::set_var("FREETSDB_LOADERTEST_DATA_WAL_DIR", "/srv/wal");

    let config = ConfigLoader::new()
        .with_env_prefix("FREETSDB_LOADERTEST")
        .load()
        .unwrap();

    assert_eq!(config.meta.dir, "/srv/meta");
    assert_eq!(config.data.wal_dir, "/srv/wal");
}
