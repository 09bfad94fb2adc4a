//! Physical-to-logical line normalization.

/// Collapses tabs to spaces and trims both ends.
pub fn trim_line(line: &str) -> String {
    line.replace('\t', " ").trim().to_string()
}

/// Blank lines and `#` comments carry no configuration.
pub fn is_skippable(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#')
}

/// Turns raw file text into logical lines.
///
/// A line ending in `\` absorbs exactly one following physical line; a
/// backslash left at the end of the absorbed line is kept as text.
pub fn logical_lines(text: &str) -> Vec<String> {
    let physical: Vec<&str> = text.split('\n').collect();
    let mut lines = Vec::with_capacity(physical.len());

    let mut i = 0;
    while i < physical.len() {
        let line = trim_line(physical[i]);
        match line.strip_suffix('\\') {
            Some(head) => {
                let tail = physical.get(i + 1).map(|l| trim_line(l)).unwrap_or_default();
                lines.push(format!("{}{}", head, tail));
                i += 2;
            }
            None => {
                lines.push(line);
                i += 1;
            }
        }
    }

    lines
}
