//! Link resolution
//!
//! Detects links in a message and resolves each distinct URL to its page
//! title. A failed fetch only empties that URL's title; the URL itself is
//! still reported.

use std::collections::HashSet;
use std::io;
use std::thread::{self, Scope, ScopedJoinHandle};
use tracing::{debug, warn};

use crate::config::FetchMode;
use crate::fetch::TitleFetcher;
use crate::links::detect_links;
use crate::result::LinkEntry;

fn resolve_title(fetcher: &dyn TitleFetcher, url: &str) -> String {
    match fetcher.fetch_title(url) {
        Ok(title) => {
            debug!(url, fetcher = fetcher.name(), "resolved title");
            title
        }
        Err(e) if e.is_per_url() => {
            debug!(url, fetcher = fetcher.name(), error = %e, "title unresolved");
            String::new()
        }
        Err(e) => {
            warn!(url, fetcher = fetcher.name(), error = %e, "title fetcher failed");
            String::new()
        }
    }
}

/// Resolve all links in `text`, in order of first detection.
///
/// Returns `None` when no link was detected or detection is unavailable.
pub fn resolve_links(
    text: &str,
    fetcher: &dyn TitleFetcher,
    mode: FetchMode,
) -> Option<Vec<LinkEntry>> {
    let detected = match detect_links(text) {
        Ok(links) => links,
        Err(e) => {
            warn!(error = %e, "skipping link resolution");
            return None;
        }
    };

    let mut seen = HashSet::new();
    let urls: Vec<String> = detected
        .into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect();

    if urls.is_empty() {
        return None;
    }

    let titles: Vec<String> = match mode {
        FetchMode::Sequential => urls
            .iter()
            .map(|url| resolve_title(fetcher, url))
            .collect(),
        FetchMode::Concurrent { max_in_flight } => {
            fetch_concurrently(&urls, fetcher, max_in_flight.max(1))
        }
    };

    Some(
        urls.into_iter()
            .zip(titles)
            .map(|(url, title)| LinkEntry { url, title })
            .collect(),
    )
}

/// A title fetch either running on its own thread or left for the caller.
enum Attempt<'scope> {
    Spawned(ScopedJoinHandle<'scope, String>),
    Inline(&'scope str),
}

fn spawn_attempt<'scope>(
    scope: &'scope Scope<'scope, '_>,
    fetcher: &'scope dyn TitleFetcher,
    url: &'scope str,
) -> Attempt<'scope> {
    let spawned: io::Result<_> = thread::Builder::new()
        .name("msgparse-fetch".to_string())
        .spawn_scoped(scope, move || resolve_title(fetcher, url));

    match spawned {
        Ok(handle) => Attempt::Spawned(handle),
        Err(e) => {
            warn!(url, error = %e, "failed to spawn fetch thread, fetching inline");
            Attempt::Inline(url)
        }
    }
}

fn finish_attempt(attempt: Attempt<'_>, fetcher: &dyn TitleFetcher) -> String {
    match attempt {
        // A panicking fetcher only loses its own title.
        Attempt::Spawned(handle) => handle.join().unwrap_or_default(),
        Attempt::Inline(url) => resolve_title(fetcher, url),
    }
}

/// Fan out in batches of `max_in_flight`; every attempt is joined.
fn fetch_concurrently(
    urls: &[String],
    fetcher: &dyn TitleFetcher,
    max_in_flight: usize,
) -> Vec<String> {
    let mut titles = Vec::with_capacity(urls.len());

    for batch in urls.chunks(max_in_flight) {
        thread::scope(|scope| {
            let attempts: Vec<Attempt<'_>> = batch
                .iter()
                .map(|url| spawn_attempt(scope, fetcher, url))
                .collect();

            for attempt in attempts {
                titles.push(finish_attempt(attempt, fetcher));
            }
        });
    }

    titles
}
