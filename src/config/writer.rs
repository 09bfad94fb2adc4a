//! In-place value updates for the config file.
//!
//! # Responsibilities
//! - Classify each physical line (blank, comment, section, key/value,
//!   continuation) without losing its original text
//! - Replace the value of one `section` + `key` pair
//! - Persist through a swap file renamed over the original
//!
//! # Design Decisions
//! - Unchanged lines are written back byte for byte
//! - A missing section or key is not an error; the file is rewritten as-is
//! - Readers see either the old or the new file, never a partial one

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::config::lines::trim_line;
use crate::config::loader::{read_file, ConfigError};
use crate::config::parser::{split_key_value, Section};

/// Classification of one physical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Comment,
    Section(Section),
    /// Lower-cased leading token of a `key value` line.
    KeyValue(String),
    /// Text folded into the previous line by a trailing backslash.
    Continuation,
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub raw: String,
    pub kind: LineKind,
}

/// The config file as an ordered list of classified lines.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    entries: Vec<Entry>,
}

impl ConfigDocument {
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        let mut folded = false;

        for raw in text.split('\n') {
            let line = trim_line(raw);
            let kind = if folded {
                folded = false;
                LineKind::Continuation
            } else if line.is_empty() {
                LineKind::Blank
            } else if line.starts_with('#') {
                LineKind::Comment
            } else if let Some(section) = Section::from_bare_line(&line) {
                LineKind::Section(section)
            } else {
                folded = line.ends_with('\\');
                let (key, _) = split_key_value(&line);
                LineKind::KeyValue(key.to_lowercase())
            };
            entries.push(Entry {
                raw: raw.to_string(),
                kind,
            });
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Replaces the value of `key` under `parent`. An empty `parent` addresses
    /// top-level directives such as `maintenance-window`.
    ///
    /// Returns false when no matching line exists.
    pub fn set_value(&mut self, parent: &str, key: &str, value: &str) -> bool {
        let key = key.trim().to_lowercase();
        let Some(pos) = self.find_key(parent.trim(), &key) else {
            return false;
        };

        let folds = self.entries[pos + 1..]
            .iter()
            .take_while(|e| e.kind == LineKind::Continuation)
            .count();
        self.entries.drain(pos + 1..pos + 1 + folds);

        let entry = &mut self.entries[pos];
        entry.raw = rewrite_line(&entry.raw, &key, value.trim());
        entry.kind = LineKind::KeyValue(key);
        true
    }

    fn find_key(&self, parent: &str, key: &str) -> Option<usize> {
        let matches_key =
            |e: &Entry| matches!(&e.kind, LineKind::KeyValue(k) if k.starts_with(key));

        if parent.is_empty() {
            return self.entries.iter().position(matches_key);
        }

        let start = self.entries.iter().position(|e| {
            matches!(e.kind, LineKind::Section(s) if s.name().eq_ignore_ascii_case(parent))
        })?;

        self.entries[start + 1..]
            .iter()
            .take_while(|e| !matches!(e.kind, LineKind::Section(_)))
            .position(matches_key)
            .map(|offset| start + 1 + offset)
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.raw.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Keeps the indentation and key/value gap of `raw`.
fn rewrite_line(raw: &str, key: &str, value: &str) -> String {
    let (raw, eol) = match raw.strip_suffix('\r') {
        Some(stripped) => (stripped, "\r"),
        None => (raw, ""),
    };
    let body = raw.trim_start();
    let indent = &raw[..raw.len() - body.len()];

    let after_key = body.trim_start_matches(|c: char| !c.is_whitespace());
    let gap_len = after_key.len() - after_key.trim_start().len();
    let gap = if gap_len == 0 { " " } else { &after_key[..gap_len] };

    if value.is_empty() {
        format!("{indent}{key}{eol}")
    } else {
        format!("{indent}{key}{gap}{value}{eol}")
    }
}

/// Writes `contents` to `swap`, closes it, then renames it over `path`.
pub fn write_atomic(path: &Path, swap: &Path, contents: &str) -> Result<(), ConfigError> {
    {
        let mut file = File::create(swap).map_err(|e| ConfigError::io(swap, e))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::io(swap, e))?;
        file.sync_all().map_err(|e| ConfigError::io(swap, e))?;
    }
    fs::rename(swap, path).map_err(|e| ConfigError::io(path, e))
}

/// Read-modify-replace cycle for a single value.
///
/// Returns whether a matching line was found.
pub fn update_config_value(
    path: &Path,
    swap: &Path,
    parent: &str,
    key: &str,
    value: &str,
) -> Result<bool, ConfigError> {
    let bytes = read_file(path)?;
    let mut doc = ConfigDocument::parse(&String::from_utf8_lossy(&bytes));
    let updated = doc.set_value(parent, key, value);
    write_atomic(path, swap, &doc.render())?;

    if updated {
        tracing::info!(section = %parent, key = %key, value = %value, "Config value updated");
    } else {
        tracing::debug!(section = %parent, key = %key, "No matching config line, file left unchanged");
    }
    Ok(updated)
}
