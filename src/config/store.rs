//! Shared, hot-swappable configuration state.
//!
//! # Responsibilities
//! - Own the published [`ConfigSnapshot`] and the on-disk layout behind it
//! - Reparse only when the config file digest changes
//! - Serialize writers (reload, value updates, banner countdown)
//! - Arm the banner countdown after a reload that turns it on
//!
//! # Design Decisions
//! - Readers take an `Arc` of the current snapshot through `ArcSwap` and never
//!   block; writers build a complete new snapshot and swap it in
//! - A failed read leaves the previous snapshot published

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;

use crate::config::banner::BannerTimer;
use crate::config::loader::{content_digest, load_blocked_ips, read_file, ConfigError, ConfigSource};
use crate::config::schema::{ConfigSnapshot, EngineSettings};
use crate::config::template::SiteLayout;
use crate::config::writer::update_config_value;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::security::validator::{validate_request, RedirectSink, RequestView, Verdict};

/// Result of a digest-gated reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Config file bytes unchanged; nothing was parsed.
    Unchanged,
    /// Only the blocked-ip list changed.
    BlockedIpRefreshed,
    Reloaded { banner_armed: bool },
}

impl ReloadOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            ReloadOutcome::Unchanged => "unchanged",
            ReloadOutcome::BlockedIpRefreshed => "blocked_ip",
            ReloadOutcome::Reloaded { .. } => "reloaded",
        }
    }
}

#[derive(Default)]
struct WriterState {
    blocked_ip_digest: String,
}

pub struct ConfigStore {
    layout: SiteLayout,
    settings: EngineSettings,
    current: ArcSwap<ConfigSnapshot>,
    writer: Mutex<WriterState>,
    banner_generation: AtomicU64,
    shutdown: Shutdown,
}

impl ConfigStore {
    /// Creates the directory layout and default files under `web_root` if
    /// needed, then loads the config.
    ///
    /// A banner found on at startup is armed when called inside a Tokio
    /// runtime.
    pub fn initialize(web_root: &Path, settings: EngineSettings) -> Result<Arc<Self>, ConfigError> {
        let layout = SiteLayout::new(web_root);
        layout.ensure()?;

        let store = Arc::new(Self {
            layout,
            settings,
            current: ArcSwap::from_pointee(ConfigSnapshot::default()),
            writer: Mutex::new(WriterState::default()),
            banner_generation: AtomicU64::new(0),
            shutdown: Shutdown::new(),
        });
        store.refresh()?;

        tracing::info!(
            web_root = %web_root.display(),
            config_file = %store.layout.config_file.display(),
            "Configuration loaded"
        );
        Ok(store)
    }

    /// Current snapshot; may trail the file by up to one poll interval.
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    pub fn layout(&self) -> &SiteLayout {
        &self.layout
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Signal shared by the watcher and banner countdown.
    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Rereads the config file and reparses it if its digest changed.
    pub fn refresh(self: &Arc<Self>) -> Result<ReloadOutcome, ConfigError> {
        let mut writer = self.lock_writer();
        let outcome = self.reload_locked(&mut writer);
        metrics::record_reload(match &outcome {
            Ok(o) => o.as_label(),
            Err(_) => "error",
        });
        outcome
    }

    /// Rewrites one value in the config file, then reloads.
    ///
    /// Returns whether a matching line was found; a missing section or key
    /// leaves the file content unchanged.
    pub fn update_value(self: &Arc<Self>, section: &str, key: &str, value: &str) -> Result<bool, ConfigError> {
        let mut writer = self.lock_writer();
        let updated = update_config_value(
            &self.layout.config_file,
            &self.layout.swap_file,
            section,
            key,
            value,
        )?;
        self.reload_locked(&mut writer)?;
        Ok(updated)
    }

    /// Runs the request validation pipeline against the current snapshot.
    pub fn validate_request(&self, request: &RequestView<'_>, sink: &mut dyn RedirectSink) -> Verdict {
        let snapshot = self.current.load();
        validate_request(&snapshot, request, sink)
    }

    /// JSON export of the current snapshot.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(self.snapshot().to_json()?)
    }

    pub(crate) fn is_banner_generation(&self, generation: u64) -> bool {
        self.banner_generation.load(Ordering::SeqCst) == generation
    }

    pub(crate) fn set_banner_ticks(&self, generation: u64, remaining: u64) {
        let _writer = self.lock_writer();
        if !self.is_banner_generation(generation) {
            return;
        }
        let mut next = ConfigSnapshot::clone(&self.current.load());
        next.message_banner.tick_count = remaining;
        self.current.store(Arc::new(next));
    }

    /// Persists `display-mode off`, then publishes the banner as off.
    ///
    /// Returns false if a newer reload superseded `generation`. A failed write
    /// leaves the published snapshot untouched.
    pub(crate) fn expire_banner(self: &Arc<Self>, generation: u64) -> Result<bool, ConfigError> {
        let mut writer = self.lock_writer();
        if !self.is_banner_generation(generation) {
            return Ok(false);
        }

        let persisted = update_config_value(
            &self.layout.config_file,
            &self.layout.swap_file,
            "MessageBanner",
            "display-mode",
            "off",
        )?;
        self.reload_locked(&mut writer)?;

        // Without a display-mode line the reload keeps the banner on.
        if self.current.load().message_banner.on {
            tracing::warn!(persisted, "No display-mode line on disk, banner switched off in memory only");
            let mut next = ConfigSnapshot::clone(&self.current.load());
            next.message_banner.on = false;
            next.message_banner.tick_count = 0;
            self.current.store(Arc::new(next));
        }
        metrics::record_banner(false);
        Ok(true)
    }

    fn lock_writer(&self) -> MutexGuard<'_, WriterState> {
        self.writer.lock().expect("config writer mutex poisoned")
    }

    fn reload_locked(self: &Arc<Self>, writer: &mut WriterState) -> Result<ReloadOutcome, ConfigError> {
        let source = ConfigSource::read(&self.layout.config_file)?;
        let blocked_digest = self.blocked_ip_digest()?;
        let current = self.current.load_full();

        if source.digest == current.config_file_last_hash {
            if blocked_digest == writer.blocked_ip_digest {
                return Ok(ReloadOutcome::Unchanged);
            }
            let mut next = ConfigSnapshot::clone(&current);
            next.blocked_ip = load_blocked_ips(&self.layout.blocked_ip_file)?;
            writer.blocked_ip_digest = blocked_digest;
            tracing::info!(blocked = next.blocked_ip.len(), "Blocked IP list refreshed");
            self.current.store(Arc::new(next));
            return Ok(ReloadOutcome::BlockedIpRefreshed);
        }

        let mut next = source.parse();
        next.blocked_ip = load_blocked_ips(&self.layout.blocked_ip_file)?;
        next.web_root_path = self.layout.web_root.clone();
        next.appdata_path = self.layout.appdata.clone();
        next.config_file_path = self.layout.config_file.clone();
        next.refresh_interval_secs = self.settings.refresh_interval().as_secs();
        next.validate_remote_host = self.settings.validate_remote_host;

        let banner_armed = next.message_banner.is_timed();
        if banner_armed {
            next.message_banner.tick_count = next.message_banner.seconds_to_display;
        }

        tracing::info!(
            digest = %source.digest,
            hostname = %next.site.hostname,
            maintenance = next.maintenance_window_on,
            banner_on = next.message_banner.on,
            "Config file change detected, snapshot replaced"
        );

        writer.blocked_ip_digest = blocked_digest;
        metrics::record_banner(next.message_banner.on);
        self.current.store(Arc::new(next));

        let generation = self.banner_generation.fetch_add(1, Ordering::SeqCst) + 1;
        if banner_armed {
            self.arm_banner(generation);
        }

        Ok(ReloadOutcome::Reloaded { banner_armed })
    }

    fn blocked_ip_digest(&self) -> Result<String, ConfigError> {
        if !self.layout.blocked_ip_file.exists() {
            return Ok(String::new());
        }
        Ok(content_digest(&read_file(&self.layout.blocked_ip_file)?))
    }

    fn arm_banner(self: &Arc<Self>, generation: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime available, banner countdown not started");
            return;
        };

        let timer = BannerTimer::new(self.clone(), generation, self.settings.banner_tick());
        let shutdown = self.shutdown.listen();
        handle.spawn(async move {
            if let Err(e) = timer.run(shutdown).await {
                tracing::error!(error = %e, "Banner countdown failed to persist display-mode");
            }
        });
    }
}
