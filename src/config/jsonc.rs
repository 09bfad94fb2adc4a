//! JSON documents with comments.
//!
//! Accepts whole-line `#` comments, trailing `#` comments and `/* ... */`
//! blocks. Comment markers inside string literals are kept.

use std::path::Path;

use crate::config::loader::{read_file, ConfigError};

/// Removes comments, returning plain JSON text.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '#' => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Loads a commented JSON file into a dynamic value, also returning the
/// cleaned bytes for typed deserialization.
pub fn load_commented_json(path: &Path) -> Result<(serde_json::Value, Vec<u8>), ConfigError> {
    let bytes = read_file(path)?;
    let cleaned = strip_comments(&String::from_utf8_lossy(&bytes)).into_bytes();
    let value = serde_json::from_slice(&cleaned)?;
    Ok((value, cleaned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_comments() {
        let text = r#"
# full line comment
{
    "name": "site # one", # trailing
    /* block
       comment */ "port": 8080,
    "path": "/a/*b*/"
}
"#;
        let value: serde_json::Value = serde_json::from_str(&strip_comments(text)).unwrap();
        assert_eq!(
            value,
            json!({"name": "site # one", "port": 8080, "path": "/a/*b*/"})
        );
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let text = r##"{"q": "say \"#hi\""} # done"##;
        let value: serde_json::Value = serde_json::from_str(&strip_comments(text)).unwrap();
        assert_eq!(value["q"], "say \"#hi\"");
    }

    #[test]
    fn test_load_commented_json() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, "# settings\n{\"refresh_interval_secs\": 5}\n").unwrap();

        let (value, bytes) = load_commented_json(&path).unwrap();
        assert_eq!(value["refresh_interval_secs"], 5);
        let settings: crate::config::EngineSettings = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(settings.refresh_interval_secs, 5);
        assert_eq!(settings.banner_tick_ms, 1000);
    }
}
