use lazy_static::lazy_static;
use regex::Regex;

use crate::shared::constants::MAX_NAME_LENGTH;

/// Fallback when an uploader sends no usable file name
pub const FALLBACK_FILE_NAME: &str = "document.pdf";

/// Longest sanitized name fragment kept inside a storage name
const MAX_STORAGE_COMPONENT_LENGTH: usize = 120;

lazy_static! {
    /// Runs of whitespace, collapsed to a single underscore in storage names
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();

    /// Anything outside the portable file name alphabet
    /// - Kept: "Report_2024-Q1.pdf"
    /// - Dropped: "/", "\\", ":", "*", "?", quotes, non-ASCII letters
    static ref UNSAFE_CHARS_REGEX: Regex = Regex::new(r"[^A-Za-z0-9._-]").unwrap();

    /// Trailing ".pdf" extension, any case
    static ref PDF_EXTENSION_REGEX: Regex = Regex::new(r"(?i)\.pdf$").unwrap();
}

/// Normalize an uploader-supplied file name: directory components and
/// control characters are stripped, surrounding whitespace trimmed, and an
/// empty result replaced by [`FALLBACK_FILE_NAME`].
pub fn normalize_original_name(declared: Option<&str>) -> String {
    let base: String = declared
        .unwrap_or_default()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    let base = base.trim();

    if base.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        base.chars().take(MAX_NAME_LENGTH).collect()
    }
}

/// Turn a file name into a fragment that is safe to use on any filesystem
/// or object store key.
pub fn sanitize_storage_component(name: &str) -> String {
    let collapsed = WHITESPACE_REGEX.replace_all(name.trim(), "_");
    let cleaned = UNSAFE_CHARS_REGEX.replace_all(&collapsed, "");
    let cleaned = cleaned.trim_start_matches('.');

    // Only ASCII survives the filter, so byte truncation is char-safe
    let truncated = &cleaned[..cleaned.len().min(MAX_STORAGE_COMPONENT_LENGTH)];

    if truncated.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        truncated.to_string()
    }
}

/// Resolve the display name of an upload: a non-blank custom name wins,
/// otherwise the original name without its `.pdf` extension.
pub fn resolve_display_name(custom_name: Option<&str>, original_name: &str) -> String {
    if let Some(custom) = custom_name.map(str::trim).filter(|s| !s.is_empty()) {
        return custom.to_string();
    }

    let stem = PDF_EXTENSION_REGEX.replace(original_name, "");
    let stem = stem.trim();
    if stem.is_empty() {
        original_name.to_string()
    } else {
        stem.to_string()
    }
}

/// Escape LIKE metacharacters so user input matches literally (`ESCAPE '\'`)
pub fn escape_like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
