//! Listening-URL detection for dev server output
//!
//! Dev servers announce where they listen in a handful of shapes:
//!
//! - Vite / Next: `Local:   http://localhost:5173/`
//! - Bun / Astro style: `url: http://localhost:3000`
//! - anything else that prints a bare `http://localhost:PORT`
//!
//! Patterns are tried in that order and the first match wins.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static LISTEN_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)Local:\s+(https?://\S+)").expect("valid Local: pattern"),
        Regex::new(r"(?i)url:\s+(https?://\S+)").expect("valid url: pattern"),
        Regex::new(r"(?i)(https?://localhost:\d+)").expect("valid localhost pattern"),
    ]
});

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("valid ANSI escape pattern")
});

/// Scan accumulated process output for a listening URL.
///
/// Returns `None` while nothing recognizable has been printed yet; callers keep
/// accumulating output and try again.
pub fn sniff(text: &str) -> Option<String> {
    let text = strip_ansi(text);
    for pattern in LISTEN_PATTERNS.iter() {
        if let Some(url) = pattern.captures(&text).and_then(|c| c.get(1)) {
            let url = url.as_str();
            let url = url.strip_suffix('/').unwrap_or(url);
            return Some(url.to_string());
        }
    }
    None
}

fn strip_ansi(text: &str) -> Cow<'_, str> {
    if text.contains('\x1b') {
        ANSI_ESCAPE.replace_all(text, "")
    } else {
        Cow::Borrowed(text)
    }
}
