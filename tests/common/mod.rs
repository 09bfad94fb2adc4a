//! Shared helpers for integration tests.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use webconf::config::template::SiteLayout;
use webconf::{ConfigSnapshot, ConfigStore, EngineSettings};

/// Fast ticks, no filesystem events.
pub fn test_settings() -> EngineSettings {
    EngineSettings {
        refresh_interval_secs: 1,
        banner_tick_ms: 10,
        validate_remote_host: false,
        watch_file_events: false,
    }
}

/// Writes `config` as the site config before the store first loads it.
pub fn write_site_config(root: &Path, config: &str) {
    let layout = SiteLayout::new(root);
    fs::create_dir_all(&layout.config_dir).unwrap();
    fs::write(&layout.config_file, config).unwrap();
}

/// A fresh web root with `config` loaded.
pub fn site_with(config: &str, settings: EngineSettings) -> (TempDir, Arc<ConfigStore>) {
    let temp = TempDir::new().unwrap();
    write_site_config(temp.path(), config);
    let store = ConfigStore::initialize(temp.path(), settings).unwrap();
    (temp, store)
}

/// Polls the snapshot until `predicate` holds or `timeout` elapses.
#[allow(dead_code)]
pub async fn wait_for<F>(store: &ConfigStore, timeout: Duration, predicate: F) -> bool
where
    F: Fn(&ConfigSnapshot) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate(&*store.snapshot()) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate(&*store.snapshot())
}

#[allow(dead_code)]
pub fn peer(addr: &str) -> SocketAddr {
    addr.parse().unwrap()
}
