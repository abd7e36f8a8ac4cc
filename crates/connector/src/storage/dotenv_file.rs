//! Backing file codec: one `KEY=VALUE` assignment per line.
//!
//! Reading is delegated to `dotenvy`. Writing rewrites the whole file but keeps
//! every line that is not an assignment (comments, blanks, lines the parser
//! rejects) where it was.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use crate::errors::StoreError;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Whether a backing file is present at `path`.
pub fn exists(path: &Path) -> bool {
    path.is_file()
}

/// Create an empty file at `path` without touching the parent directory.
pub fn create_empty(path: &Path) -> Result<(), StoreError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .open(path)
        .map(|_| ())
        .map_err(|e| StoreError::io(path, e))
}

/// Read and parse the file. A missing file is an empty mapping.
pub fn read(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(parse(&content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Parse dotenv content, skipping lines that are not valid assignments.
pub fn parse(content: &str) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    for item in dotenvy::from_read_iter(content.as_bytes()) {
        match item {
            Ok((key, value)) => {
                entries.insert(key, value);
            }
            Err(dotenvy::Error::LineParse(line, index)) => {
                warn!(event = "skip_line", %line, index, "skipping malformed dotenv line");
            }
            Err(e) => {
                warn!(event = "parse_aborted", error = %e, "stopping dotenv parse early");
                break;
            }
        }
    }
    entries
}

/// Rewrite the file at `path` so that its assignments are exactly `entries`.
pub fn write(path: &Path, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    write_atomic(path, &merge(&existing, entries))
}

/// Keys the parser can read back: `[A-Za-z_][A-Za-z0-9_.]*`.
pub fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Serialize a value so that `parse` returns it unchanged.
pub fn format_value(value: &str) -> String {
    if value.chars().all(is_bare) {
        return value.to_string();
    }
    // A backslash before the closing `'` would escape it, so those go double-quoted.
    if !value.contains(['\'', '\\', '\n', '\r']) {
        return format!("'{value}'");
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' | '"' | '$' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn is_bare(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | ':' | '@' | '+' | ',' | '-')
}

fn format_line(key: &str, value: &str) -> String {
    format!("{key}={}", format_value(value))
}

/// Produce the new file content from the `existing` text and the target `entries`.
///
/// Assignments of keys absent from `entries` are dropped, the first assignment of
/// each remaining key is rewritten in place (later duplicates are dropped), and
/// keys not yet in the file are appended in key order.
pub fn merge(existing: &str, entries: &BTreeMap<String, String>) -> String {
    let mut written = BTreeSet::new();
    let mut out = String::with_capacity(existing.len());

    for line in logical_lines(existing) {
        match assignment_key(&line) {
            Some(key) => {
                if let Some(value) = entries.get(&key) {
                    if written.insert(key.clone()) {
                        out.push_str(&format_line(&key, value));
                        out.push('\n');
                    }
                }
            }
            None => {
                out.push_str(&line);
                out.push('\n');
            }
        }
    }

    for (key, value) in entries.iter().filter(|(k, _)| !written.contains(*k)) {
        out.push_str(&format_line(key, value));
        out.push('\n');
    }
    out
}

fn assignment_key(line: &str) -> Option<String> {
    match dotenvy::from_read_iter(line.as_bytes()).next() {
        Some(Ok((key, _))) => Some(key),
        _ => None,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quote {
    Closed,
    Single,
    Double,
    DoubleEscape,
}

fn scan(mut state: Quote, line: &str) -> Quote {
    let mut after_space = true;
    for c in line.chars() {
        state = match state {
            Quote::Closed => match c {
                '#' if after_space => return Quote::Closed,
                '\'' => Quote::Single,
                '"' => Quote::Double,
                _ => Quote::Closed,
            },
            Quote::Single if c == '\'' => Quote::Closed,
            Quote::Single => Quote::Single,
            Quote::Double => match c {
                '\\' => Quote::DoubleEscape,
                '"' => Quote::Closed,
                _ => Quote::Double,
            },
            Quote::DoubleEscape => Quote::Double,
        };
        after_space = c.is_whitespace();
    }
    state
}

/// Split into logical lines, joining a quoted value that spans several physical lines.
fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut state = Quote::Closed;
    for line in content.lines() {
        if state != Quote::Closed {
            current.push('\n');
        }
        current.push_str(line);
        state = scan(state, line);
        if state == Quote::Closed {
            lines.push(std::mem::take(&mut current));
        }
    }
    if state != Quote::Closed {
        lines.push(current);
    }
    lines
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}

// Readers polling the file must never see a half-written rewrite.
fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, content).map_err(|e| StoreError::io(&tmp_path, e))?;
    if let Ok(meta) = fs::metadata(path) {
        if let Err(e) = fs::set_permissions(&tmp_path, meta.permissions()) {
            warn!(event = "permissions_not_kept", path = %path.display(), error = %e, "rewritten file keeps default permissions");
        }
    }
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StoreError::io(path, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn empty_content_parses_to_empty_map() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n").is_empty());
    }

    #[test]
    fn parse_skips_comments_and_malformed_lines() {
        let parsed = parse("# header\na=1\n=orphan\nb=two\n");
        assert_eq!(parsed, map(&[("a", "1"), ("b", "two")]));
    }

    #[test]
    fn keys_outside_the_key_set_are_skipped_on_read() {
        let content = "my-key=1\nfoo.bar=2\n";
        assert_eq!(parse(content), map(&[("foo.bar", "2")]));
        assert!(!is_valid_key("my-key"));
        assert_eq!(merge(content, &map(&[])), "my-key=1\n");
    }

    #[test]
    fn bare_values_stay_unquoted() {
        assert_eq!(format_value("0"), "0");
        assert_eq!(format_value("running"), "running");
        assert_eq!(format_value(""), "");
        assert_eq!(format_value("http://host:80/a-b"), "http://host:80/a-b");
    }

    #[test]
    fn awkward_values_are_quoted() {
        assert_eq!(format_value("hello world"), "'hello world'");
        assert_eq!(format_value("$HOME"), "'$HOME'");
        assert_eq!(format_value("it's"), "\"it's\"");
        assert_eq!(format_value("a\nb"), "\"a\\nb\"");
    }

    #[test]
    fn quoted_values_parse_back_unchanged() {
        let entries = map(&[
            ("space", "hello world"),
            ("dollar", "cost $5 ${X}"),
            ("quotes", "it's \"quoted\""),
            ("hash", "a # not a comment"),
            ("multi", "line1\nline2"),
            ("empty", ""),
        ]);
        assert_eq!(parse(&merge("", &entries)), entries);
    }

    #[test]
    fn backslash_values_are_double_quoted() {
        assert_eq!(format_value("a\\"), "\"a\\\\\"");
        assert_eq!(format_value("c:\\dir\\"), "\"c:\\\\dir\\\\\"");
    }

    #[test]
    fn every_quoting_branch_round_trips_and_keeps_following_keys() {
        let specials = ["\\", "'", "\"", "$", "#", "\r", "\n", " "];
        let mut values = vec![String::new(), "plain".to_string()];
        for s in specials {
            values.push(s.to_string());
            values.push(format!("a{s}b"));
            values.push(format!("{s}lead"));
            values.push(format!("trail{s}"));
            // Force the single-quote and double-quote branches around the same character.
            values.push(format!("x y{s}"));
            values.push(format!("it's{s}"));
            values.push(format!("c:\\dir{s}\\"));
        }
        values.push(" both ends ".to_string());
        values.push("${X}'".to_string());

        for value in values {
            let entries = map(&[("a_value", &value), ("z_after", "1")]);
            let written = merge("", &entries);
            assert_eq!(parse(&written), entries, "value {value:?} written as {written:?}");
            assert_eq!(merge(&written, &entries), written, "rewrite of {value:?} is not stable");
        }
    }

    #[test]
    fn merge_rewrites_in_place_and_keeps_comments() {
        let existing = "# config\nb=old\n\nremoved=x\nb=dup\n";
        let merged = merge(existing, &map(&[("a", "1"), ("b", "new")]));
        assert_eq!(merged, "# config\nb=new\n\na=1\n");
    }

    #[test]
    fn merge_keeps_unparsable_lines() {
        let merged = merge("=orphan\nk=v\n", &map(&[]));
        assert_eq!(merged, "=orphan\n");
    }

    #[test]
    fn multiline_values_are_one_logical_line() {
        let existing = "a=\"first\nsecond\"\nb=2\n";
        assert_eq!(logical_lines(existing), vec!["a=\"first\nsecond\"", "b=2"]);
        assert_eq!(merge(existing, &map(&[("b", "2")])), "b=2\n");
    }

    #[test]
    fn key_validation() {
        assert!(is_valid_key("counter"));
        assert!(is_valid_key("PID"));
        assert!(is_valid_key("_private.key_2"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("2fast"));
        assert!(!is_valid_key("with-dash"));
        assert!(!is_valid_key("with space"));
    }
}
