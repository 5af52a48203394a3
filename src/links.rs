//! Link detection
//!
//! Finds link-like substrings in a message:
//! - `http://` / `https://` URLs,
//! - `www.` hosts,
//! - bare host names ending in a common TLD (`google.com/maps`).
//!
//! Anything that does not start with `http` gets `https://` prepended.
//! The `http` check ignores ASCII case, so `HTTP://X.COM` is left as written.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::error::{ParseError, Result};

const LINK_PATTERN: &str = concat!(
    r"(?i)(?:",
    r"https?://[^\s<>\x22'`]+",
    r"|www\.[^\s<>\x22'`]+",
    r"|(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+",
    r"(?:com|org|net|edu|gov|mil|int|io|co|uk|us|ca|de|fr|ru|jp|au|info|biz|me|app|dev|ly|tv)\b",
    r"(?::\d+)?(?:/[^\s<>\x22'`]*)?",
    r")"
);

// Compile the pattern once.
static LINK_RE: Lazy<std::result::Result<Regex, String>> = Lazy::new(|| {
    Regex::new(LINK_PATTERN).map_err(|e| {
        warn!(error = %e, "link pattern failed to compile");
        e.to_string()
    })
});

fn link_regex() -> Result<&'static Regex> {
    Lazy::force(&LINK_RE)
        .as_ref()
        .map_err(|reason| ParseError::MalformedPattern {
            name: "link",
            reason: reason.clone(),
        })
}

/// Trim trailing punctuation that ends a sentence rather than the URL,
/// plus closing parentheses that were never opened inside the URL.
fn trim_link_trailing(link: &str) -> &str {
    let mut trimmed = link;
    loop {
        let next =
            trimmed.trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'));
        let unbalanced = next.matches(')').count() > next.matches('(').count();
        let next = if next.ends_with(')') && unbalanced {
            &next[..next.len() - 1]
        } else {
            next
        };
        if next.len() == trimmed.len() {
            return trimmed;
        }
        trimmed = next;
    }
}

/// A bare host must not continue an e-mail address, a mention or a longer word.
fn starts_at_boundary(text: &str, start: usize) -> bool {
    match text[..start].chars().next_back() {
        None => true,
        Some(prev) => !(prev.is_alphanumeric() || matches!(prev, '@' | '_' | '.' | '-' | '/')),
    }
}

fn has_prefix_ignore_case(link: &str, prefix: &str) -> bool {
    link.get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

fn has_http_prefix(link: &str) -> bool {
    has_prefix_ignore_case(link, "http")
}

/// Scheme and `www.` links are explicit, so what precedes them does not matter.
fn is_explicit_link(link: &str) -> bool {
    has_http_prefix(link) || has_prefix_ignore_case(link, "www.")
}

/// Prepend `https://` unless the link already starts with `http`.
pub fn normalize_url(link: &str) -> String {
    if has_http_prefix(link) {
        link.to_string()
    } else {
        format!("https://{link}")
    }
}

/// Detect links in order of appearance, normalized, duplicates included.
pub fn detect_links(text: &str) -> Result<Vec<String>> {
    let re = link_regex().map_err(|e| ParseError::DetectionUnavailable {
        reason: e.to_string(),
    })?;

    let links = re
        .find_iter(text)
        .filter(|m| is_explicit_link(m.as_str()) || starts_at_boundary(text, m.start()))
        .map(|m| trim_link_trailing(m.as_str()))
        .filter(|link| !link.is_empty())
        .map(normalize_url)
        .collect();

    Ok(links)
}
