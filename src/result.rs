//! Parse result
//!
//! The typed document a message parses into. Empty categories are left out
//! of the JSON entirely, and a message with nothing in it has no document.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub url: String,
    pub title: String,
}

/// Mentions, emoticons and links found in one message.
///
/// Field order is the key order of the JSON output.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoticons: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<LinkEntry>>,
}

fn non_empty<T>(items: Option<Vec<T>>) -> Option<Vec<T>> {
    items.filter(|items| !items.is_empty())
}

impl ParseResult {
    /// Merge scan outputs; `None` when every category is empty.
    pub fn assemble(
        mentions: Option<Vec<String>>,
        emoticons: Option<Vec<String>>,
        links: Option<Vec<LinkEntry>>,
    ) -> Option<Self> {
        let result = Self {
            mentions: non_empty(mentions),
            emoticons: non_empty(emoticons),
            links: non_empty(links),
        };

        if result.is_empty() {
            None
        } else {
            Some(result)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mentions.is_none() && self.emoticons.is_none() && self.links.is_none()
    }

    /// Pretty-printed JSON with literal `/` characters.
    pub fn to_json(&self) -> Result<String> {
        // serde_json never escapes '/', so URLs come out as written.
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Like `to_json`, but a serialization failure becomes "nothing found".
    pub fn into_json(self) -> Option<String> {
        self.to_json()
            .map_err(|e| warn!(error = %e, "failed to serialize parse result"))
            .ok()
    }
}
