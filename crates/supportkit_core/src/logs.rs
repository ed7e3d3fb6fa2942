//! Line-oriented scanners for the plain-text user and system logs.

use std::fs;
use std::path::Path;

use regex::Regex;

use crate::error::{Result, SupportError};
use crate::report::Finding;

const UNKNOWN_CODE: &str = "unknown";

/// Reads a log file, decoding invalid UTF-8 lossily.
pub fn read_log(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| SupportError::from_read(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn scan_user_log(path: &Path, matcher: Option<&Regex>) -> Result<Vec<Finding>> {
    let contents = read_log(path)?;
    Ok(user_issues(&contents, matcher))
}

pub fn scan_system_log(path: &Path, marker: &str, code_len: usize) -> Result<Vec<Finding>> {
    let contents = read_log(path)?;
    Ok(system_errors(&contents, marker, code_len))
}

pub fn user_issues(contents: &str, matcher: Option<&Regex>) -> Vec<Finding> {
    let Some(matcher) = matcher else {
        return Vec::new();
    };
    numbered_lines(contents)
        .filter(|(_, line)| matcher.is_match(line))
        .map(|(line, text)| Finding::SoftwareConflict {
            line,
            description: text.to_string(),
        })
        .collect()
}

pub fn system_errors(contents: &str, marker: &str, code_len: usize) -> Vec<Finding> {
    if marker.is_empty() {
        return Vec::new();
    }
    let marker_upper = marker.to_ascii_uppercase();
    numbered_lines(contents)
        .filter_map(|(line, text)| {
            // ASCII upper-casing keeps byte offsets aligned with `text`.
            let start = text.to_ascii_uppercase().find(&marker_upper)?;
            let rest = &text[start + marker.len()..];
            Some(Finding::SystemError {
                line,
                error_code: error_code(rest, code_len),
                description: text.to_string(),
            })
        })
        .collect()
}

/// First token after the marker, e.g. `ERROR: 0x80070005 denied` -> `0x80070005`.
fn error_code(rest: &str, max_len: usize) -> String {
    let token = rest
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '-' | ']' | '='))
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_end_matches([':', ',', ';']);
    if token.is_empty() {
        return UNKNOWN_CODE.to_string();
    }
    token.chars().take(max_len).collect()
}

/// Non-blank lines, trimmed, with 1-based line numbers.
fn numbered_lines(contents: &str) -> impl Iterator<Item = (usize, &str)> {
    contents
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}
