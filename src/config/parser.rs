//! Section-scoped parser for the site config file.
//!
//! # Responsibilities
//! - Recognize top-level directives and named sections
//! - Confirm key membership by scanning back to the owning section header
//! - Decode typed values (lists, forward rules, conditional rules)
//!
//! # Design Decisions
//! - Indentation is cosmetic; a key belongs to a section only if the nearest
//!   non-sibling line above it is the bare section name
//! - An unconfirmed key line ends the section and is re-read at top level
//! - Malformed values degrade (empty list, sentinel, skipped rule) instead of
//!   failing the whole parse

use std::collections::HashMap;

use crate::config::lines::{is_skippable, logical_lines};
use crate::config::schema::{ConditionalHttpService, ConfigSnapshot, ForwardPath};

/// Named sections of the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Site,
    Tls,
    Admin,
    MessageBanner,
    Http,
    UrlPaths,
    Data,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Site,
        Section::Tls,
        Section::Admin,
        Section::MessageBanner,
        Section::Http,
        Section::UrlPaths,
        Section::Data,
    ];

    /// Lower-cased header token.
    pub fn name(self) -> &'static str {
        match self {
            Section::Site => "site",
            Section::Tls => "tls",
            Section::Admin => "admin",
            Section::MessageBanner => "messagebanner",
            Section::Http => "http",
            Section::UrlPaths => "urlpaths",
            Section::Data => "data",
        }
    }

    /// Key prefixes the section accepts.
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            Section::Site => &["hostname", "alternate-hostnames", "portno", "proto"],
            Section::Tls => &["cert", "key"],
            Section::Admin => &["allowed-ip-addr", "run-on-startup", "portno"],
            Section::MessageBanner => &["display-mode", "seconds-to-display"],
            Section::Http => &["allowed-methods"],
            Section::UrlPaths => &[
                "restrict-paths",
                "exclude-paths",
                "forward-paths",
                "conditional-http-service",
            ],
            Section::Data => &[],
        }
    }

    /// Section whose name is the first token of `line`.
    pub fn from_header(line: &str) -> Option<Section> {
        let token = line.split_whitespace().next()?;
        Section::ALL
            .into_iter()
            .find(|s| token.eq_ignore_ascii_case(s.name()))
    }

    /// Section whose name is the whole of `line`.
    pub fn from_bare_line(line: &str) -> Option<Section> {
        let line = line.trim();
        Section::ALL
            .into_iter()
            .find(|s| line.eq_ignore_ascii_case(s.name()))
    }

    fn match_key(self, lower: &str) -> Option<&'static str> {
        self.keys().iter().copied().find(|k| lower.starts_with(k))
    }
}

/// Splits `key value`; the value keeps its internal spacing.
pub fn split_key_value(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((key, value)) => (key, value.trim()),
        None => (line, ""),
    }
}

/// Comma list with trimmed elements and no empty fragments.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses config text into a snapshot. Bookkeeping fields stay at defaults.
pub fn parse_config(text: &str) -> ConfigSnapshot {
    let lines = logical_lines(text);
    let mut snapshot = ConfigSnapshot::default();

    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        if is_skippable(line) {
            i += 1;
            continue;
        }

        let lower = line.to_lowercase();
        if lower.starts_with("maintenance-window") {
            let (_, value) = split_key_value(line);
            snapshot.maintenance_window_on = value.eq_ignore_ascii_case("on");
            i += 1;
            continue;
        }
        if lower.starts_with("redirect-http-to-https") {
            let (_, value) = split_key_value(line);
            snapshot.redirect_http_to_https = value.eq_ignore_ascii_case("yes");
            i += 1;
            continue;
        }

        i = match Section::from_header(line) {
            Some(Section::Data) if Section::from_bare_line(line).is_some() => {
                read_data(&lines, i + 1, &mut snapshot.data)
            }
            Some(Section::Data) | None => i + 1,
            Some(section) => read_section(&lines, i + 1, section, &mut snapshot),
        };
    }

    snapshot
}

/// Consumes key lines of `section` starting at `start`.
///
/// Returns the index of the first line not consumed.
fn read_section(lines: &[String], start: usize, section: Section, snapshot: &mut ConfigSnapshot) -> usize {
    let mut i = start;
    loop {
        while i < lines.len() && is_skippable(&lines[i]) {
            i += 1;
        }
        if i >= lines.len() {
            return i;
        }

        let lower = lines[i].to_lowercase();
        let Some(key) = section.match_key(&lower) else {
            return i;
        };
        if !owned_by(lines, i, section) {
            return i;
        }

        let (_, value) = split_key_value(&lines[i]);
        apply_value(section, key, value, snapshot);
        i += 1;
    }
}

/// Walks up from `pos` past comments, blanks and sibling keys; the first other
/// line must be the bare section header.
fn owned_by(lines: &[String], pos: usize, section: Section) -> bool {
    let mut x = pos;
    while x > 0 {
        x -= 1;
        let line = &lines[x];
        if is_skippable(line) {
            continue;
        }
        let lower = line.to_lowercase();
        if section.match_key(&lower).is_some() {
            continue;
        }
        return lower == section.name();
    }
    false
}

fn read_data(lines: &[String], start: usize, data: &mut HashMap<String, String>) -> usize {
    let mut i = start;
    while i < lines.len() {
        let line = &lines[i];
        if is_skippable(line) {
            i += 1;
            continue;
        }
        if Section::from_bare_line(line).is_some() {
            return i;
        }
        let (key, value) = split_key_value(line);
        data.insert(key.to_string(), value.to_string());
        i += 1;
    }
    i
}

fn apply_value(section: Section, key: &str, value: &str, snapshot: &mut ConfigSnapshot) {
    match (section, key) {
        (Section::Site, "hostname") => snapshot.site.hostname = value.to_lowercase(),
        (Section::Site, "alternate-hostnames") => {
            let mut hosts: Vec<String> = Vec::new();
            for host in split_list(value) {
                let host = host.to_lowercase();
                if !hosts.contains(&host) {
                    hosts.push(host);
                }
            }
            snapshot.site.alternate_hostnames = hosts;
        }
        (Section::Site, "portno") => snapshot.site.port = value.parse().unwrap_or(0),
        (Section::Site, "proto") => snapshot.site.proto = value.to_string(),

        (Section::Tls, "cert") => snapshot.tls.cert_file_path = non_empty(value).map(Into::into),
        (Section::Tls, "key") => snapshot.tls.key_file_path = non_empty(value).map(Into::into),

        (Section::Admin, "allowed-ip-addr") => snapshot.admin.allowed_ip = split_list(value),
        (Section::Admin, "run-on-startup") => {
            snapshot.admin.run_on_startup = value.eq_ignore_ascii_case("yes")
        }
        (Section::Admin, "portno") => snapshot.admin.port = value.parse().unwrap_or(0),

        (Section::MessageBanner, "display-mode") => {
            snapshot.message_banner.on = value.eq_ignore_ascii_case("on")
        }
        (Section::MessageBanner, "seconds-to-display") => {
            snapshot.message_banner.seconds_to_display = value.parse().unwrap_or(0)
        }

        (Section::Http, "allowed-methods") => snapshot.http.allowed_methods = split_list(value),

        (Section::UrlPaths, "restrict-paths") => snapshot.url_paths.restrict = split_list(value),
        (Section::UrlPaths, "exclude-paths") => snapshot.url_paths.exclude = split_list(value),
        (Section::UrlPaths, "forward-paths") => {
            snapshot.url_paths.forward = split_list(value)
                .iter()
                .map(|entry| ForwardPath::parse(entry))
                .collect();
        }
        (Section::UrlPaths, "conditional-http-service") => {
            snapshot.url_paths.conditional = decode_conditional_rules(value)
        }
        _ => {}
    }
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}

/// Decodes the JSON rule array one element at a time so a bad rule does not
/// take its siblings down with it.
pub fn decode_conditional_rules(value: &str) -> Vec<ConditionalHttpService> {
    if value.trim().is_empty() {
        return Vec::new();
    }

    let raw: Vec<serde_json::Value> = match serde_json::from_str(value) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "conditional-http-service is not a JSON array, ignoring");
            return Vec::new();
        }
    };

    raw.into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            match serde_json::from_value::<ConditionalHttpService>(entry) {
                Ok(rule) if rule.url_path.starts_with('/') => Some(rule),
                Ok(rule) => {
                    tracing::warn!(index, url_path = %rule.url_path, "Rejected conditional rule: url-path must be relative");
                    None
                }
                Err(e) => {
                    tracing::warn!(index, error = %e, "Rejected malformed conditional rule");
                    None
                }
            }
        })
        .collect()
}
