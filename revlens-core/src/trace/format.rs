//! Pure reconstruction of the call-tree view from the flat entry log.
//! Both passes depend only on the `start:`/`finish:` prefix convention,
//! never on the rest of the entry content.

use std::sync::OnceLock;

use regex::Regex;

fn start_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^start:").unwrap())
}

fn finish_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^finish:").unwrap())
}

fn start_anywhere() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)start:").unwrap())
}

fn finish_anywhere() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)finish:").unwrap())
}

/// Indents each entry by its nesting depth, computed by counting the
/// start/finish markers seen so far: a start or finish line sits at
/// `starts - finishes - 1` (counting itself among the starts but not the
/// finishes), any other line sits one level deeper, inside the enclosing
/// block. Negative depths clamp to zero and empty lines stay untouched.
pub fn indent_entries<S: AsRef<str>>(lines: &[S], unit: &str) -> Vec<String> {
    let mut starts: isize = 0;
    let mut finishes: isize = 0;

    lines
        .iter()
        .map(|line| {
            let line = line.as_ref();
            let is_start = start_prefix().is_match(line);
            let is_finish = finish_prefix().is_match(line);

            if is_start {
                starts += 1;
            }
            let depth = if is_start || is_finish {
                starts - finishes - 1
            } else {
                starts - finishes
            };
            if is_finish {
                finishes += 1;
            }

            if line.is_empty() {
                return String::new();
            }
            let depth = depth.max(0) as usize;
            format!("{}{}", unit.repeat(depth), line)
        })
        .collect()
}

/// Inserts a blank line between sibling blocks: after every finish entry
/// whose immediate successor is a start entry. Runs after indentation, so
/// the markers are matched anywhere in the line. Idempotent: an already
/// blank successor suppresses the insertion.
pub fn paragraph_entries<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        out.push(line.to_string());
        if !finish_anywhere().is_match(line) {
            continue;
        }
        if let Some(next) = lines.get(index + 1) {
            if start_anywhere().is_match(next.as_ref()) {
                out.push(String::new());
            }
        }
    }
    out
}

/// The diagnostics rendering written to disk: tab indentation, paragraph
/// separation, one entry per line.
pub fn standard_format<S: AsRef<str>>(lines: &[S]) -> String {
    paragraph_entries(&indent_entries(lines, "\t")).join("\n")
}
