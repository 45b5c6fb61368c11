//! Normalization of raw form fields.
//!
//! Every function here is total: malformed input yields a safe default rather
//! than an error. Each output is restricted to a closed character set (digits,
//! `x`, a lowercase `k` suffix, or a URL with a vetted scheme) so it can be
//! placed verbatim into the rendered relay config and into a process argument
//! vector. Do not widen any accepted set without re-auditing
//! [`crate::render`] and [`crate::supervisor::command`].

use url::Url;

pub const DEFAULT_RESOLUTION: &str = "1920x1080";
pub const DEFAULT_FRAMERATE: &str = "30";

const ALLOWED_SCHEMES: [&str; 3] = ["http://", "https://", "rtmp://"];
const CONFIG_METACHARACTERS: [char; 7] = [';', '{', '}', '#', '"', '\'', '\\'];

const RESOLUTIONS: &[(&str, &str)] = &[
    ("360p", "640x360"),
    ("480p", "854x480"),
    ("720p", "1280x720"),
    ("1080p", "1920x1080"),
    ("1440p", "2560x1440"),
    ("4K", "3840x2160"),
];

/// Returns the ingest URL with one trailing slash and any query string
/// removed, or an empty string when the value cannot be used. An empty result
/// means the target is disabled.
pub fn sanitize_url(raw: &str) -> String {
    let mut url = raw.trim();
    if let Some(stripped) = url.strip_suffix('/') {
        url = stripped;
    }
    if let Some((head, _query)) = url.split_once('?') {
        url = head;
    }

    if !ALLOWED_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
        return String::new();
    }

    if url.chars().any(is_unsafe_char) {
        return String::new();
    }

    match Url::parse(url) {
        Ok(parsed) if parsed.host_str().is_some_and(|host| !host.is_empty()) => url.to_string(),
        _ => String::new(),
    }
}

/// Stream keys are opaque tokens; only surrounding whitespace is removed.
pub fn sanitize_stream_key(raw: &str) -> String {
    raw.trim().to_string()
}

/// Whether a sanitized stream key can be embedded in the relay config.
pub fn is_config_safe_key(key: &str) -> bool {
    !key.is_empty() && !key.chars().any(is_unsafe_char) && !key.contains('/')
}

pub fn sanitize_numeric(raw: &str, default: u32) -> u32 {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|value| *value >= 0)
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or(default)
}

pub fn sanitize_resolution(name: &str) -> &'static str {
    let name = name.trim();
    RESOLUTIONS
        .iter()
        .find(|(label, _)| *label == name)
        .map(|(_, dimensions)| *dimensions)
        .unwrap_or(DEFAULT_RESOLUTION)
}

/// Named resolutions in ascending order, for front ends building a picker.
pub fn resolution_names() -> impl Iterator<Item = &'static str> {
    RESOLUTIONS.iter().map(|(label, _)| *label)
}

pub fn sanitize_bitrate(raw: &str, default: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    match lowered.strip_suffix('k') {
        Some(digits) if is_all_digits(digits) => lowered,
        _ => default.to_string(),
    }
}

pub fn sanitize_framerate(raw: &str) -> String {
    let trimmed = raw.trim();
    if is_all_digits(trimmed) {
        trimmed.to_string()
    } else {
        DEFAULT_FRAMERATE.to_string()
    }
}

fn is_all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit())
}

fn is_unsafe_char(ch: char) -> bool {
    ch.is_whitespace() || ch.is_control() || CONFIG_METACHARACTERS.contains(&ch)
}
