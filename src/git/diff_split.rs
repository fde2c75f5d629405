//! Unified diff parsing into addressable hunks and binary file operations.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, warn};

use crate::data::snapshot::{FileOperation, Hunk, OpKind};

/// Marker that begins a per-file section in unified diff output.
const FILE_DIFF_MARKER: &str = "diff --git ";

/// Extended header line of a file removed from the working tree.
const DELETED_FILE_MARKER: &str = "deleted file mode ";

/// Marker that begins a hunk within a file diff.
const HUNK_MARKER: &str = "@@ ";

/// Header line naming the post-change path.
const NEW_PATH_MARKER: &str = "+++ ";

/// Splits text into lines, dropping only the `\n` terminator so `\r`
/// survives and a rebuilt patch stays byte-identical.
fn diff_lines(diff: &str) -> impl Iterator<Item = &str> {
    diff.split_inclusive('\n')
        .map(|line| line.strip_suffix('\n').unwrap_or(line))
}

/// Accumulates one file section while scanning.
#[derive(Default)]
struct FileSection {
    header: Vec<String>,
    header_path: String,
    new_path: Option<String>,
    hunk: Option<Vec<String>>,
}

impl FileSection {
    fn start(line: &str) -> Self {
        Self {
            header: vec![line.to_string()],
            header_path: extract_path_from_diff_header(line),
            new_path: None,
            hunk: None,
        }
    }

    fn path(&self) -> String {
        self.new_path
            .clone()
            .unwrap_or_else(|| self.header_path.clone())
    }

    fn flush_hunk(&mut self, out: &mut Vec<Hunk>) {
        if let Some(lines) = self.hunk.take() {
            out.push(Hunk::new(self.path(), self.header.clone(), lines));
        }
    }
}

/// Decodes raw diff output into text without ever altering content.
///
/// A file section that is not valid UTF-8 (a Latin-1 text file, say)
/// cannot be carried through a rebuilt patch, so it is replaced by a
/// terse binary marker and ends up as a whole-file operation.
pub fn decode_diff(raw: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(raw) {
        return text.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    for section in file_sections(raw) {
        match std::str::from_utf8(section) {
            Ok(text) => out.push_str(text),
            Err(_) => out.push_str(&binary_stand_in(section)),
        }
    }
    out
}

/// Splits raw diff bytes at every `diff --git ` line.
fn file_sections(raw: &[u8]) -> Vec<&[u8]> {
    let mut sections = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    for line in raw.split_inclusive(|b| *b == b'\n') {
        if offset > start && line.starts_with(FILE_DIFF_MARKER.as_bytes()) {
            sections.push(&raw[start..offset]);
            start = offset;
        }
        offset += line.len();
    }
    if start < raw.len() {
        sections.push(&raw[start..]);
    }
    sections
}

/// Rewrites an undecodable file section as a header plus binary marker.
fn binary_stand_in(section: &[u8]) -> String {
    let mut lines = section.split(|b| *b == b'\n');
    let header = String::from_utf8_lossy(lines.next().unwrap_or_default()).into_owned();
    let deleted = lines.find(|line| line.starts_with(DELETED_FILE_MARKER.as_bytes()));

    warn!(
        header = %header,
        "Diff section is not valid UTF-8; treating the file as binary"
    );

    let mut out = header;
    out.push('\n');
    if let Some(line) = deleted {
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out.push_str("Binary files differ\n");
    out
}

/// Parses unified diff text into hunks, in diff order.
///
/// Files without hunks (pure renames, mode changes, binary files)
/// produce nothing here; they surface as file operations instead.
pub fn parse_hunks(diff: &str) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    let mut section: Option<FileSection> = None;

    for line in diff_lines(diff) {
        if line.starts_with(FILE_DIFF_MARKER) {
            if let Some(mut done) = section.take() {
                done.flush_hunk(&mut hunks);
            }
            section = Some(FileSection::start(line));
            continue;
        }

        let Some(current) = section.as_mut() else {
            continue;
        };

        if line.starts_with(HUNK_MARKER) {
            current.flush_hunk(&mut hunks);
            current.hunk = Some(vec![line.to_string()]);
        } else if let Some(lines) = current.hunk.as_mut() {
            lines.push(line.to_string());
        } else {
            if let Some(path) = new_path_from_marker(line) {
                current.new_path = Some(path);
            }
            current.header.push(line.to_string());
        }
    }

    if let Some(mut done) = section {
        done.flush_hunk(&mut hunks);
    }

    debug!(hunk_count = hunks.len(), "Parsed diff into hunks");
    hunks
}

/// Scans diff text for `Binary files ... differ` markers.
///
/// Deleted binaries are skipped: the status parser already reports
/// those as deletions.
pub fn extract_binary_ops(diff: &str) -> Vec<FileOperation> {
    static BINARY_LINE: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = BINARY_LINE
        .get_or_init(|| Regex::new(r"^Binary files (.+) and (.+) differ$").ok())
        .as_ref();

    let mut ops = Vec::new();
    let mut tracked_path: Option<String> = None;
    let mut deleted = false;

    for line in diff_lines(diff) {
        if line.starts_with(FILE_DIFF_MARKER) {
            tracked_path = Some(extract_path_from_diff_header(line));
            deleted = false;
        } else if line.starts_with(DELETED_FILE_MARKER) {
            deleted = true;
        } else if let Some(path) = new_path_from_marker(line) {
            tracked_path = Some(path);
        } else if line.starts_with("Binary files ") {
            let captured = pattern
                .and_then(|re| re.captures(line))
                .and_then(|caps| caps.get(2))
                .map(|m| m.as_str());
            if deleted || captured == Some("/dev/null") {
                continue;
            }

            // The header path is authoritative; the marker text is
            // ambiguous when a path itself contains " and ".
            let path = tracked_path
                .clone()
                .or_else(|| captured.map(|dest| strip_side_prefix(&unquote_path(dest), "b/")));

            if let Some(path) = path {
                ops.push(FileOperation::new(OpKind::Binary, path, None));
            } else {
                debug!(line, "Binary marker without a resolvable path");
            }
        }
    }

    ops
}

/// Collapses every file's hunks into one unit (file-granular mode).
///
/// The merged unit keeps the file header and concatenates the hunk
/// lines in diff order, so it is still a valid standalone patch.
pub fn merge_hunks_by_file(hunks: Vec<Hunk>) -> Vec<Hunk> {
    let mut files: IndexMap<String, (Vec<String>, Vec<String>)> = IndexMap::new();
    for hunk in hunks {
        let entry = files
            .entry(hunk.file)
            .or_insert_with(|| (hunk.file_header, Vec::new()));
        entry.1.extend(hunk.hunk_lines);
    }

    files
        .into_iter()
        .map(|(file, (header, lines))| Hunk::new(file, header, lines))
        .collect()
}

/// Extracts the file path from the `b/` side of a `diff --git` header line.
///
/// git C-quotes a side whose path holds `"`, `\\`, a tab or a newline,
/// even with `core.quotepath=false`.
fn extract_path_from_diff_header(header_line: &str) -> String {
    // Format: "diff --git a/old_path b/new_path"
    if header_line.ends_with('"') {
        // Inside a quoted path every `"` is escaped, so the last ` "b/`
        // starts the destination side.
        if let Some(b_pos) = header_line.rfind(" \"b/") {
            return strip_side_prefix(&unquote_path(&header_line[b_pos + 1..]), "b/");
        }
    }
    // The last " b/" wins so paths containing spaces survive.
    if let Some(b_pos) = header_line.rfind(" b/") {
        header_line[b_pos + 3..].to_string()
    } else {
        header_line
            .strip_prefix("diff --git a/")
            .unwrap_or(header_line)
            .to_string()
    }
}

/// Reads the path of a `+++ b/...` line; `None` for other lines and for
/// `+++ /dev/null`.
fn new_path_from_marker(line: &str) -> Option<String> {
    let raw = line.strip_prefix(NEW_PATH_MARKER)?;
    if raw.starts_with('"') {
        let path = unquote_path(raw.trim_end_matches('\t'));
        return path.strip_prefix("b/").map(str::to_string);
    }
    // git appends a tab to ---/+++ lines when the path has spaces.
    raw.strip_prefix("b/")
        .map(|path| path.trim_end_matches('\t').to_string())
}

fn strip_side_prefix(path: &str, prefix: &str) -> String {
    path.strip_prefix(prefix).unwrap_or(path).to_string()
}

/// Undoes git's C-style path quoting; unquoted input is returned as is.
///
/// Octal escapes are raw bytes, so multi-byte characters are decoded
/// after all escapes are collected.
pub fn unquote_path(quoted: &str) -> String {
    let Some(inner) = quoted
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return quoted.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('a') => bytes.push(0x07),
            Some('b') => bytes.push(0x08),
            Some('f') => bytes.push(0x0c),
            Some('n') => bytes.push(b'\n'),
            Some('r') => bytes.push(b'\r'),
            Some('t') => bytes.push(b'\t'),
            Some('v') => bytes.push(0x0b),
            Some(d @ '0'..='7') => {
                let mut value = d.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|n| n.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                bytes.push((value & 0xff) as u8);
            }
            Some(other) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => bytes.push(b'\\'),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
