mod common;

use std::fs;
use std::time::Duration;

use common::{site_with, test_settings, wait_for};
use webconf::{ConfigWatcher, EngineSettings};
use webconf::config::ReloadOutcome;

const BANNER_ON: &str = "\
Site
    hostname   example.com
HTTP
    allowed-methods GET, HEAD
MessageBanner
    display-mode        on
    seconds-to-display  3
";

fn display_mode_line(text: &str) -> String {
    text.lines()
        .find(|l| l.trim_start().starts_with("display-mode"))
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

#[tokio::test]
async fn timed_banner_turns_itself_off_and_persists() {
    let (_temp, store) = site_with(BANNER_ON, test_settings());

    let banner = store.snapshot().message_banner.clone();
    assert!(banner.on);
    assert_eq!(banner.tick_count, 3);

    assert!(wait_for(&store, Duration::from_secs(2), |s| !s.message_banner.on).await);
    assert_eq!(store.snapshot().message_banner.tick_count, 0);

    let text = fs::read_to_string(&store.layout().config_file).unwrap();
    assert_eq!(display_mode_line(&text), "display-mode off");
    assert!(text.contains("hostname   example.com"));
    assert!(!store.layout().swap_file.exists());
}

#[tokio::test]
async fn untimed_banner_stays_on() {
    let config = BANNER_ON.replace("seconds-to-display  3", "seconds-to-display  0");
    let (_temp, store) = site_with(&config, test_settings());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(store.snapshot().message_banner.on);
    let text = fs::read_to_string(&store.layout().config_file).unwrap();
    assert_eq!(display_mode_line(&text), "display-mode on");
}

#[tokio::test]
async fn rearming_restarts_the_countdown() {
    let settings = EngineSettings {
        banner_tick_ms: 200,
        ..test_settings()
    };
    let (_temp, store) = site_with(BANNER_ON, settings);

    tokio::time::sleep(Duration::from_millis(250)).await;
    store.update_value("MessageBanner", "seconds-to-display", "10").unwrap();
    assert_eq!(store.snapshot().message_banner.tick_count, 10);

    // The first countdown would have expired by now.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(store.snapshot().message_banner.on);
}

#[tokio::test]
async fn watcher_picks_up_external_edits() {
    let config = BANNER_ON.replace("display-mode        on", "display-mode        off");
    let (_temp, store) = site_with(&config, test_settings());
    let watcher = ConfigWatcher::new(store.clone()).with_interval(Duration::from_millis(20));
    let task = tokio::spawn(watcher.run(store.shutdown().listen()));

    let edited = fs::read_to_string(&store.layout().config_file)
        .unwrap()
        .replace("example.com", "edited.example.org");
    fs::write(&store.layout().config_file, edited).unwrap();

    assert!(
        wait_for(&store, Duration::from_secs(2), |s| s.site.hostname == "edited.example.org").await
    );

    store.shutdown().trigger();
    let result = tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    assert!(result.is_ok());
}

#[test]
fn repeated_update_is_idempotent() {
    let config = BANNER_ON.replace("display-mode        on", "display-mode        off");
    let (_temp, store) = site_with(&config, test_settings());

    assert!(store.update_value("Site", "hostname", "www.example.net").unwrap());
    let once = fs::read(&store.layout().config_file).unwrap();
    let digest = store.snapshot().config_file_last_hash.clone();

    assert!(store.update_value("Site", "hostname", "www.example.net").unwrap());
    let twice = fs::read(&store.layout().config_file).unwrap();

    assert_eq!(once, twice);
    assert_eq!(store.snapshot().config_file_last_hash, digest);
    assert_eq!(store.refresh().unwrap(), ReloadOutcome::Unchanged);
}

#[test]
fn blocked_ip_edit_reaches_snapshot() {
    let (_temp, store) = site_with(BANNER_ON, test_settings());
    fs::write(&store.layout().blocked_ip_file, "# scanners\n198.51.100.9\n").unwrap();
    assert_eq!(store.refresh().unwrap(), ReloadOutcome::BlockedIpRefreshed);
    assert!(store.snapshot().is_blocked("198.51.100.9"));
}
