//! Configuration file watcher for hot reload.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use crate::config::loader::ConfigError;
use crate::config::store::{ConfigStore, ReloadOutcome};
use crate::lifecycle::ShutdownListener;

/// Periodically re-reads the config file and reparses it when its digest
/// changes.
///
/// Filesystem events, when available, only wake the loop early; the digest
/// comparison still decides whether anything is reparsed.
pub struct ConfigWatcher {
    store: Arc<ConfigStore>,
    interval: Duration,
    file_events: bool,
}

impl ConfigWatcher {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        let interval = store.settings().refresh_interval();
        let file_events = store.settings().watch_file_events;
        Self {
            store,
            interval,
            file_events,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// One watch cycle.
    pub fn poll_once(&self) -> Result<ReloadOutcome, ConfigError> {
        self.store.refresh()
    }

    /// Runs until `shutdown` fires or the config file becomes unreadable.
    pub async fn run(self, mut shutdown: ShutdownListener) -> Result<(), ConfigError> {
        let (nudge_tx, mut nudge_rx) = mpsc::unbounded_channel();
        let _fs_watcher = if self.file_events {
            match self.watch_file_events(nudge_tx) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(error = %e, "File event watching unavailable, polling only");
                    None
                }
            }
        } else {
            None
        };

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the store was loaded at startup.
        ticker.tick().await;

        tracing::info!(
            path = %self.store.layout().config_file.display(),
            interval_secs = self.interval.as_secs_f64(),
            "Config watcher started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                Some(()) = nudge_rx.recv() => {
                    tracing::debug!("Config directory event received");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Config watcher received shutdown signal, exiting loop");
                    return Ok(());
                }
            }

            match self.poll_once() {
                Ok(ReloadOutcome::Unchanged) => {}
                Ok(outcome) => {
                    tracing::debug!(outcome = outcome.as_label(), "Config watcher cycle");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Config file unreadable, stopping watcher");
                    return Err(e);
                }
            }
        }
    }

    /// Watches the config directory rather than the file, since every update
    /// replaces the file through a rename.
    fn watch_file_events(&self, nudge: mpsc::UnboundedSender<()>) -> Result<RecommendedWatcher, notify::Error> {
        let layout = self.store.layout();
        let interesting: Vec<PathBuf> = vec![layout.config_file.clone(), layout.blocked_ip_file.clone()];

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = (event.kind.is_modify() || event.kind.is_create())
                        && event.paths.iter().any(|p| interesting.contains(p));
                    if relevant {
                        let _ = nudge.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default(),
        )?;

        watcher.watch(&layout.config_dir, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }
}
