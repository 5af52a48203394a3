//! Message Parser Core Library
//!
//! Extracts structured annotations from a freeform chat message:
//! - Mentions (`@bob`)
//! - Emoticons (`(smile)`, at most 15 characters)
//! - Links, with the `<title>` of each page
//!
//! and serializes them into one pretty-printed JSON document.
//! The UI shell links this library and calls the C entry points below,
//! or uses `MessageParser` directly from Rust.

pub mod config;
pub mod emoticons;
pub mod error;
pub mod fetch;
pub mod links;
pub mod mentions;
pub mod parser;
pub mod resolver;
pub mod result;

pub use config::{FetchMode, ParserConfig};
pub use error::{ParseError, Result};
pub use fetch::{HttpTitleFetcher, OfflineFetcher, TitleFetcher};
pub use parser::{
    delivery_queue, DeliveryQueue, Dispatcher, MessageParser, QueueDispatcher, WorkerDispatcher,
};
pub use result::{LinkEntry, ParseResult};

use once_cell::sync::Lazy;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

/// Process-wide parser used by the C entry points.
static DEFAULT_PARSER: Lazy<MessageParser> = Lazy::new(|| {
    let config = ParserConfig::load_or_default();
    MessageParser::new(config.clone()).unwrap_or_else(|e| {
        warn!(error = %e, "HTTP client unavailable, link titles will stay empty");
        MessageParser::offline(config)
    })
});

/// Parse a message with the default parser on the calling thread.
///
/// Returns the JSON document, or `None` when nothing was found.
pub fn parse_message_json(message: &str) -> Option<String> {
    DEFAULT_PARSER.parse_catching(message)
}

fn into_c_string(output: Option<String>) -> *mut c_char {
    output
        .and_then(|json| CString::new(json).ok())
        .map_or(std::ptr::null_mut(), CString::into_raw)
}

/// Borrow a C string as UTF-8, replacing invalid sequences.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn message_from_ptr(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

/// Run an FFI body, turning a panic into a null result.
fn null_on_panic(body: impl FnOnce() -> *mut c_char) -> *mut c_char {
    panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|_| {
        warn!("panic in parse_message, returning null");
        std::ptr::null_mut()
    })
}

/// Parse a message synchronously
///
/// Returns the JSON document, or null when nothing was found.
/// Free a non-null result with `free_string`.
///
/// # Safety
/// `message` must be null or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn parse_message(message: *const c_char) -> *mut c_char {
    null_on_panic(|| match message_from_ptr(message) {
        Some(message) => into_c_string(parse_message_json(&message)),
        None => std::ptr::null_mut(),
    })
}

/// Completion callback for `parse_message_async`.
///
/// `result` is null when nothing was found; otherwise release it with `free_string`.
pub type ParseCallback = extern "C" fn(result: *mut c_char, user_data: *mut c_void);

struct UserData(*mut c_void);

// The pointer is only handed back to the caller's callback, never dereferenced here.
unsafe impl Send for UserData {}

/// Parse a message on a worker thread
///
/// `callback` runs exactly once, on the worker thread; the caller marshals
/// the result onto its UI thread.
///
/// # Safety
/// `message` must be null or point to a NUL-terminated string, and
/// `user_data` must stay valid until `callback` has run.
#[no_mangle]
pub unsafe extern "C" fn parse_message_async(
    message: *const c_char,
    callback: ParseCallback,
    user_data: *mut c_void,
) {
    let user_data = UserData(user_data);
    let Some(message) = message_from_ptr(message) else {
        callback(std::ptr::null_mut(), user_data.0);
        return;
    };

    DEFAULT_PARSER.parse(message, move |output| {
        let user_data = user_data;
        callback(into_c_string(output), user_data.0);
    });
}

/// Free a CString allocated by Rust
///
/// Call this from the UI shell after reading a result to prevent memory leaks
#[no_mangle]
pub extern "C" fn free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            let _ = CString::from_raw(ptr);
        }
    }
}
