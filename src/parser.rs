//! Message parsing coordinator
//!
//! Runs the scanners and link resolution for one message off the caller's
//! thread, then hands the JSON (or `None`) back through a `Dispatcher`:
//! - `WorkerDispatcher` delivers on the worker itself
//! - `QueueDispatcher` queues delivery for the caller's own loop (UI thread)
//!
//! Each call owns its message and builds fresh results, so concurrent
//! parses share nothing mutable.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, debug_span, warn};

use crate::config::ParserConfig;
use crate::emoticons::{extract_emoticons, MAX_EMOTICON_LEN};
use crate::error::Result;
use crate::fetch::{HttpTitleFetcher, OfflineFetcher, TitleFetcher};
use crate::mentions::extract_mentions;
use crate::resolver::resolve_links;
use crate::result::ParseResult;

/// A unit of work handed to a dispatcher.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

type Deliver = Box<dyn FnOnce(Option<String>) + Send + 'static>;

/// Decides which thread runs a delivery callback.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, job: Job);
    fn name(&self) -> &'static str {
        "dispatcher"
    }
}

/// Runs deliveries directly on the parse worker.
#[derive(Clone, Copy, Debug, Default)]
pub struct WorkerDispatcher;

impl Dispatcher for WorkerDispatcher {
    fn dispatch(&self, job: Job) {
        job();
    }

    fn name(&self) -> &'static str {
        "worker"
    }
}

/// Sends deliveries to a `DeliveryQueue` drained by the caller.
pub struct QueueDispatcher {
    tx: Mutex<Sender<Job>>,
}

/// Receiving end of a `QueueDispatcher`; owned by the caller's thread.
pub struct DeliveryQueue {
    rx: Receiver<Job>,
}

/// Create a connected dispatcher/queue pair.
pub fn delivery_queue() -> (QueueDispatcher, DeliveryQueue) {
    let (tx, rx) = mpsc::channel();
    (QueueDispatcher { tx: Mutex::new(tx) }, DeliveryQueue { rx })
}

impl Dispatcher for QueueDispatcher {
    fn dispatch(&self, job: Job) {
        let tx = self.tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if tx.send(job).is_err() {
            warn!("delivery queue is gone, dropping result");
        }
    }

    fn name(&self) -> &'static str {
        "queue"
    }
}

impl DeliveryQueue {
    /// Run every delivery already queued. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for one delivery and run it.
    pub fn run_next_timeout(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(job) => {
                job();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

/// Entry point for parsing chat messages.
#[derive(Clone)]
pub struct MessageParser {
    config: Arc<ParserConfig>,
    fetcher: Arc<dyn TitleFetcher>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl MessageParser {
    /// Create a parser that fetches titles over HTTP.
    pub fn new(config: ParserConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpTitleFetcher::new(&config)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Create a parser with a custom page source.
    pub fn with_fetcher(config: ParserConfig, fetcher: Arc<dyn TitleFetcher>) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            dispatcher: Arc::new(WorkerDispatcher),
        }
    }

    /// Parser whose links always resolve to empty titles.
    pub fn offline(config: ParserConfig) -> Self {
        Self::with_fetcher(config, Arc::new(OfflineFetcher))
    }

    /// Route deliveries of `parse` through `dispatcher`.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Scan a message into its typed result. May block on title fetches.
    pub fn scan(&self, message: &str) -> Option<ParseResult> {
        let _span =
            debug_span!("parse", len = message.len(), fetcher = self.fetcher.name()).entered();

        let mentions = extract_mentions(message);
        let emoticons = extract_emoticons(message, MAX_EMOTICON_LEN);
        let links = resolve_links(message, self.fetcher.as_ref(), self.config.fetch_mode);

        ParseResult::assemble(mentions, emoticons, links)
    }

    /// Parse on the calling thread. `None` when nothing was found.
    pub fn parse_sync(&self, message: &str) -> Option<String> {
        self.scan(message).and_then(ParseResult::into_json)
    }

    /// Like `parse_sync`, but a panic anywhere in the parse yields `None`.
    pub fn parse_catching(&self, message: &str) -> Option<String> {
        panic::catch_unwind(AssertUnwindSafe(|| self.parse_sync(message))).unwrap_or_else(|_| {
            warn!("parse panicked, delivering no result");
            None
        })
    }

    /// Parse on a worker thread and call `deliver` exactly once, on the
    /// thread chosen by this parser's dispatcher.
    pub fn parse<F>(&self, message: impl Into<String>, deliver: F)
    where
        F: FnOnce(Option<String>) + Send + 'static,
    {
        let message: Arc<str> = Arc::from(message.into());
        let deliver: Deliver = Box::new(deliver);
        let slot = Arc::new(Mutex::new(Some(deliver)));

        let worker = self.clone();
        let worker_message = Arc::clone(&message);
        let worker_slot = Arc::clone(&slot);

        let spawned = thread::Builder::new()
            .name("msgparse-worker".to_string())
            .spawn(move || {
                let output = worker.parse_catching(&worker_message);
                worker.deliver(&worker_slot, output);
            });

        if let Err(e) = spawned {
            warn!(error = %e, "failed to spawn parse worker, parsing inline");
            let output = self.parse_catching(&message);
            self.deliver(&slot, output);
        }
    }

    fn deliver(&self, slot: &Mutex<Option<Deliver>>, output: Option<String>) {
        let deliver = slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(deliver) = deliver {
            debug!(
                found = output.is_some(),
                dispatcher = self.dispatcher.name(),
                "delivering result"
            );
            self.dispatcher.dispatch(Box::new(move || deliver(output)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchMode;
    use crate::error::ParseError;

    struct StubFetcher;

    impl TitleFetcher for StubFetcher {
        fn fetch_page(&self, url: &str) -> Result<String> {
            match url {
                "https://google.com" => Ok("<html><title>Google</title></html>".to_string()),
                "http://www.nbcolympics.com" => Ok(
                    "<title>NBC Olympics | Home of the 2016 Olympic Games in Rio</title>"
                        .to_string(),
                ),
                _ => Err(ParseError::fetch(url, "unreachable")),
            }
        }
    }

    struct PanickingFetcher;

    impl TitleFetcher for PanickingFetcher {
        fn fetch_page(&self, _url: &str) -> Result<String> {
            panic!("fetcher blew up");
        }
    }

    fn parser() -> MessageParser {
        MessageParser::with_fetcher(ParserConfig::default(), Arc::new(StubFetcher))
    }

    #[test]
    fn test_plain_message_is_absent() {
        assert_eq!(parser().parse_sync("Good morning, everyone!"), None);
        assert_eq!(parser().parse_sync(""), None);
    }

    #[test]
    fn test_full_message() {
        let json = parser()
            .parse_sync("@chris https://google.com http://www.nbcolympics.com (cool)")
            .expect("something found");

        let expected = r#"{
  "mentions": [
    "chris"
  ],
  "emoticons": [
    "cool"
  ],
  "links": [
    {
      "url": "https://google.com",
      "title": "Google"
    },
    {
      "url": "http://www.nbcolympics.com",
      "title": "NBC Olympics | Home of the 2016 Olympic Games in Rio"
    }
  ]
}"#;
        assert_eq!(json, expected);
    }

    #[test]
    fn test_unreachable_link_keeps_empty_title() {
        let result = parser()
            .scan("look at unreachable.example.com")
            .expect("link found");
        let links = result.links.expect("links");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://unreachable.example.com");
        assert_eq!(links[0].title, "");
        assert_eq!(result.mentions, None);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let message = "@bob (smile) https://google.com google.com/ok @bob";
        let parser = parser();
        assert_eq!(parser.parse_sync(message), parser.parse_sync(message));
    }

    #[test]
    fn test_emoticon_bound_is_fixed() {
        let parser = MessageParser::offline(ParserConfig::default());
        let result = parser
            .scan("(abcdefghijklmno)(abcdefghijklmnop)")
            .expect("found");
        assert_eq!(result.emoticons, Some(vec!["abcdefghijklmno".to_string()]));
    }

    #[test]
    fn test_parse_delivers_once_on_worker() {
        let (tx, rx) = mpsc::channel();
        parser().parse("@bob (smile)", move |output| {
            tx.send(output).expect("receiver alive");
        });

        let output = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("delivered")
            .expect("found something");
        assert!(output.contains("\"bob\""));
        assert!(output.contains("\"smile\""));
        // sender was consumed with the callback
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_queue_dispatcher_delivers_on_caller_thread() {
        let (dispatcher, queue) = delivery_queue();
        let parser = parser().with_dispatcher(Arc::new(dispatcher));

        let caller = thread::current().id();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_callback = Arc::clone(&seen);

        parser.parse("nothing here", move |output| {
            seen_in_callback
                .lock()
                .expect("lock")
                .push((thread::current().id(), output));
        });

        assert!(queue.run_next_timeout(Duration::from_secs(5)));
        assert_eq!(queue.run_pending(), 0);

        let seen = seen.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, caller);
        assert_eq!(seen[0].1, None);
    }

    #[test]
    fn test_panicking_fetcher_still_delivers() {
        let parser =
            MessageParser::with_fetcher(ParserConfig::default(), Arc::new(PanickingFetcher))
                .with_dispatcher(Arc::new(WorkerDispatcher));
        let (tx, rx) = mpsc::channel();

        parser.parse("@bob https://google.com", move |output| {
            tx.send(output).expect("receiver alive");
        });

        let output = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("delivered")
            .expect("mention and link still found");
        assert!(output.contains("\"bob\""));
        assert!(output.contains("\"title\": \"\""));
    }

    #[test]
    fn test_sequential_panic_is_caught() {
        let config = ParserConfig {
            fetch_mode: FetchMode::Sequential,
            ..ParserConfig::default()
        };
        let parser = MessageParser::with_fetcher(config, Arc::new(PanickingFetcher));
        assert_eq!(parser.config().fetch_mode, FetchMode::Sequential);

        assert_eq!(parser.parse_catching("@bob https://google.com"), None);
        assert_eq!(
            parser.parse_catching("@bob (smile)").as_deref(),
            parser.parse_sync("@bob (smile)").as_deref()
        );
    }

    #[test]
    fn test_concurrent_parses_are_independent() {
        let parser = parser();
        let (tx, rx) = mpsc::channel();

        for i in 0..16 {
            let tx = tx.clone();
            parser.parse(format!("@user{i} ({i})"), move |output| {
                tx.send((i, output)).expect("receiver alive");
            });
        }
        drop(tx);

        let mut results: Vec<(usize, Option<String>)> = rx.iter().collect();
        results.sort_by_key(|(i, _)| *i);
        assert_eq!(results.len(), 16);
        for (i, output) in results {
            let output = output.expect("found");
            assert!(output.contains(&format!("\"user{i}\"")));
            assert!(output.contains(&format!("\"{i}\"")));
        }
    }
}
