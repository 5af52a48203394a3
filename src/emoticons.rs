//! Emoticon parsing
//!
//! An emoticon is the text strictly between a `(` and the next `)`.
//! Pairs are consumed sequentially with no nesting awareness:
//! - spans of 1..=max_len characters are kept, others dropped;
//! - scanning resumes right after the consumed `)`;
//! - an unterminated `(` ends the scan.

use tracing::debug;

/// Default upper bound on emoticon length, in characters.
pub const MAX_EMOTICON_LEN: usize = 15;

/// Extract emoticons from text.
///
/// Returns `None` when nothing qualified.
pub fn extract_emoticons(text: &str, max_len: usize) -> Option<Vec<String>> {
    let mut emoticons = Vec::new();
    let mut cursor = 0;

    while let Some(open) = text[cursor..].find('(') {
        cursor += open + 1;

        let Some(close) = text[cursor..].find(')') else {
            break;
        };

        let span = &text[cursor..cursor + close];
        let len = span.chars().count();
        if (1..=max_len).contains(&len) {
            emoticons.push(span.to_string());
        }

        cursor += close + 1;
    }

    debug!(count = emoticons.len(), "scanned emoticons");

    if emoticons.is_empty() {
        None
    } else {
        Some(emoticons)
    }
}
