//! Offload strategies
//!
//! Wrap a base converter/encoder and move the real bytes out of band so that
//! broker messages stay small.

mod file;
mod remote;

pub use file::{FileOffload, FileOffloadEncoder};
pub use remote::{RemoteOffload, RemoteOffloadEncoder};

use crate::sink::ErrorSink;

/// Decode the wire payload as the UTF-8 reference (filename or token)
fn decode_reference(payload: &[u8], what: &str, errors: &mut ErrorSink) -> Option<String> {
    match std::str::from_utf8(payload) {
        Ok(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Ok(_) => {
            errors.add(format!("Empty {} received!", what));
            None
        }
        Err(e) => {
            errors.add(format!("Failed to decode {} as UTF-8: {}", what, e));
            None
        }
    }
}
