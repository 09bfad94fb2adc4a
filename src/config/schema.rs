//! Configuration snapshot definitions.
//!
//! This module defines the structured view of the site config file. Every
//! reparse produces a fresh [`ConfigSnapshot`]; nothing here is mutated in
//! place once published.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Prefix that marks a value rejected during parsing.
pub const ERROR_SENTINEL: &str = "~@error:";

/// Root of the parsed configuration plus reload bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSnapshot {
    #[serde(rename = "web-root-path")]
    pub web_root_path: PathBuf,

    #[serde(rename = "appdata-path")]
    pub appdata_path: PathBuf,

    #[serde(rename = "config-file-path")]
    pub config_file_path: PathBuf,

    /// Hex digest of the config file bytes this snapshot was built from.
    #[serde(rename = "config-file-last-hash")]
    pub config_file_last_hash: String,

    /// Seconds between scheduled reparses.
    #[serde(rename = "refresh-interval-secs")]
    pub refresh_interval_secs: u64,

    pub site: Site,
    pub tls: TlsFiles,
    pub admin: Admin,
    pub http: HttpSettings,

    #[serde(rename = "url-paths")]
    pub url_paths: UrlPaths,

    #[serde(rename = "message-banner")]
    pub message_banner: MessageBanner,

    /// Rejects requests whose Host header names neither the site hostname nor
    /// one of its alternates.
    #[serde(rename = "validate-remote-host")]
    pub validate_remote_host: bool,

    #[serde(rename = "blocked-ip")]
    pub blocked_ip: Vec<String>,

    #[serde(rename = "redirect-http-to-https")]
    pub redirect_http_to_https: bool,

    #[serde(rename = "maintenance-window-on")]
    pub maintenance_window_on: bool,

    pub data: HashMap<String, String>,
}

impl ConfigSnapshot {
    /// Full JSON rendering with `<` and `>` left readable.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(json.replace("\\u003e", ">").replace("\\u003c", "<"))
    }

    /// Returns true when `ip` is listed in the blocked-ip file.
    pub fn is_blocked(&self, ip: &str) -> bool {
        self.blocked_ip.iter().any(|blocked| blocked == ip)
    }
}

/// Public identity of the site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Site {
    /// Lower-cased hostname; empty disables host validation.
    pub hostname: String,

    #[serde(rename = "alternate-host-names")]
    pub alternate_hostnames: Vec<String>,

    pub proto: String,

    #[serde(rename = "portno")]
    pub port: u16,
}

impl Site {
    /// Whether `host` names this site, either directly or through an alternate.
    pub fn answers_to(&self, host: &str) -> bool {
        self.hostname == host || self.alternate_hostnames.iter().any(|h| h == host)
    }
}

/// PEM certificate and private key locations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsFiles {
    #[serde(rename = "cert-file-path")]
    pub cert_file_path: Option<PathBuf>,

    #[serde(rename = "key-file-path")]
    pub key_file_path: Option<PathBuf>,
}

impl TlsFiles {
    pub fn is_configured(&self) -> bool {
        self.cert_file_path.is_some() && self.key_file_path.is_some()
    }
}

/// Admin application access settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Admin {
    #[serde(rename = "run-on-startup")]
    pub run_on_startup: bool,

    #[serde(rename = "port-no")]
    pub port: u16,

    #[serde(rename = "allowed-ip")]
    pub allowed_ip: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Methods compared verbatim against the request method.
    #[serde(rename = "allowed-methods")]
    pub allowed_methods: Vec<String>,
}

/// Path rules, evaluated restrict → exclude → forward → conditional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlPaths {
    pub restrict: Vec<String>,
    pub exclude: Vec<String>,
    pub forward: Vec<ForwardPath>,

    #[serde(rename = "conditional-http-service")]
    pub conditional: Vec<ConditionalHttpService>,
}

/// A `from|to` redirect rule.
///
/// A destination that is not a relative path is replaced by an
/// [`ERROR_SENTINEL`] value at parse time, so the rule stays visible in the
/// snapshot but never matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct ForwardPath {
    pub from: String,
    pub to: String,
}

impl ForwardPath {
    /// Builds a rule, substituting the sentinel for a non-relative destination.
    pub fn parse(entry: &str) -> Self {
        let mut parts = entry.splitn(2, '|');
        let from = parts.next().unwrap_or_default().trim().to_string();
        let to = parts.next().map(str::trim).unwrap_or_default();

        let to = if to.is_empty() {
            format!("{ERROR_SENTINEL} missing forward destination")
        } else if !to.starts_with('/') {
            format!("{ERROR_SENTINEL} fully qualified url-forwarding not allowed")
        } else {
            to.to_string()
        };

        Self { from, to }
    }

    pub fn is_valid(&self) -> bool {
        !self.from.starts_with(ERROR_SENTINEL) && !self.to.starts_with(ERROR_SENTINEL)
    }
}

impl From<ForwardPath> for String {
    fn from(rule: ForwardPath) -> Self {
        format!("{}|{}", rule.from, rule.to)
    }
}

impl From<String> for ForwardPath {
    fn from(entry: String) -> Self {
        ForwardPath::parse(&entry)
    }
}

/// Which part of the request a conditional rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleType {
    Header,
    IpAddress,
    QueryString,
}

/// Serves `url_path` only to requests that satisfy one of the criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionalHttpService {
    #[serde(rename = "rule-type")]
    pub rule_type: RuleType,

    #[serde(rename = "url-path")]
    pub url_path: String,

    #[serde(rename = "serve-only-to-criteria")]
    pub criteria: Vec<String>,

    /// Status returned when no criterion matches; non-positive means 404.
    #[serde(rename = "http-status-code", default)]
    pub http_status_code: i64,
}

impl ConditionalHttpService {
    pub fn denial_status(&self) -> u16 {
        match u16::try_from(self.http_status_code) {
            Ok(code) if (100..=999).contains(&code) => code,
            _ => 404,
        }
    }
}

/// Site-wide dismissible banner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageBanner {
    pub on: bool,

    /// Zero leaves dismissal to the operator.
    #[serde(rename = "seconds-to-display")]
    pub seconds_to_display: u64,

    /// Seconds left before the banner switches itself off.
    #[serde(rename = "tick-count")]
    pub tick_count: u64,
}

impl MessageBanner {
    /// Whether an automatic countdown applies to this banner.
    pub fn is_timed(&self) -> bool {
        self.on && self.seconds_to_display > 0
    }
}

/// Settings for the engine itself, as opposed to the site config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Seconds between config file polls.
    pub refresh_interval_secs: u64,

    /// Milliseconds per banner countdown tick.
    pub banner_tick_ms: u64,

    /// Enforce the Host header check in the request validator.
    pub validate_remote_host: bool,

    /// Wake the watcher early on filesystem events.
    pub watch_file_events: bool,
}

impl EngineSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn banner_tick(&self) -> Duration {
        Duration::from_millis(self.banner_tick_ms.max(1))
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 15,
            banner_tick_ms: 1000,
            validate_remote_host: false,
            watch_file_events: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path_sentinel() {
        let ok = ForwardPath::parse("/old|/new");
        assert!(ok.is_valid());
        assert_eq!(ok.to, "/new");

        let absolute = ForwardPath::parse("/old|http://example.com");
        assert!(!absolute.is_valid());
        assert_eq!(absolute.from, "/old");
        assert!(absolute.to.starts_with(ERROR_SENTINEL));

        let missing = ForwardPath::parse("/old");
        assert!(!missing.is_valid());
    }

    #[test]
    fn test_denial_status_defaults_to_404() {
        let mut rule = ConditionalHttpService {
            rule_type: RuleType::Header,
            url_path: "/robots.txt".into(),
            criteria: vec![],
            http_status_code: 0,
        };
        assert_eq!(rule.denial_status(), 404);
        rule.http_status_code = -3;
        assert_eq!(rule.denial_status(), 404);
        rule.http_status_code = 410;
        assert_eq!(rule.denial_status(), 410);
    }

    #[test]
    fn test_json_export_keeps_angle_brackets() {
        let mut snapshot = ConfigSnapshot::default();
        snapshot
            .data
            .insert("banner-html".into(), "<b>hello</b>".into());
        let json = snapshot.to_json().unwrap();
        assert!(json.contains("<b>hello</b>"));
        assert!(json.contains("\"forward\":[]"));
    }
}
