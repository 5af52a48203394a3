//! Mentions parsing
//!
//! Extracts `@name` tokens from plaintext.
//! - A mention is the maximal run of ASCII word characters (`[A-Za-z0-9_]`)
//!   right after an `@`.
//! - Empty mentions (`@` followed by a non-word character) are dropped.
//! - Order of appearance is kept, duplicates included.

use tracing::debug;

/// ASCII letter, digit or underscore.
pub fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Extract mentions from text.
///
/// Returns `None` when the message holds no non-empty mention.
pub fn extract_mentions(text: &str) -> Option<Vec<String>> {
    let mut mentions = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find('@') {
        // '@' is one byte, so the slice stays on a char boundary.
        cursor += offset + 1;
        let rest = &text[cursor..];

        match rest.find(|ch: char| !is_word_char(ch)) {
            None => {
                if !rest.is_empty() {
                    mentions.push(rest.to_string());
                }
                break;
            }
            Some(end) => {
                if end > 0 {
                    mentions.push(rest[..end].to_string());
                }
                // Resume at the boundary so "@a@b" still yields "b".
                cursor += end;
            }
        }
    }

    debug!(count = mentions.len(), "scanned mentions");

    if mentions.is_empty() {
        None
    } else {
        Some(mentions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mentions_stop_at_non_word_chars() {
        let mentions = extract_mentions("@bob/ Hi! @paul$% Good morning (success)");
        assert_eq!(mentions, Some(vec!["bob".to_string(), "paul".to_string()]));
    }

    #[test]
    fn test_mention_at_end_of_message() {
        assert_eq!(
            extract_mentions("ping @name"),
            Some(vec!["name".to_string()])
        );
    }

    #[test]
    fn test_empty_mentions_are_dropped() {
        assert_eq!(extract_mentions("@ @! trailing @"), None);
    }

    #[test]
    fn test_adjacent_mentions() {
        assert_eq!(
            extract_mentions("@alice@bob"),
            Some(vec!["alice".to_string(), "bob".to_string()])
        );
    }

    #[test]
    fn test_duplicates_are_kept_in_order() {
        assert_eq!(
            extract_mentions("@x hi @y and @x again"),
            Some(vec!["x".to_string(), "y".to_string(), "x".to_string()])
        );
    }

    #[test]
    fn test_non_ascii_letters_end_a_mention() {
        assert_eq!(
            extract_mentions("@joséphine says hi"),
            Some(vec!["jos".to_string()])
        );
    }

    #[test]
    fn test_no_at_sign() {
        assert_eq!(extract_mentions("Good morning"), None);
    }

    proptest! {
        #[test]
        fn mentions_are_non_empty_word_runs(text in "[a-z@_ !$%/.0-9é]{0,64}") {
            if let Some(mentions) = extract_mentions(&text) {
                for mention in mentions {
                    prop_assert!(!mention.is_empty());
                    prop_assert!(mention.chars().all(is_word_char));
                    let needle = format!("@{mention}");
                    prop_assert!(text.contains(&needle));
                }
            }
        }

        #[test]
        fn no_at_sign_means_no_mentions(text in "[^@]{0,64}") {
            prop_assert_eq!(extract_mentions(&text), None);
        }
    }
}
