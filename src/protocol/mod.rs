//! Peer control protocol.
//!
//! Host and remote exchange JSON objects tagged by a `type` field:
//!
//! ```json
//! {"type": "SET_VOLUME", "value": 0.4}
//! {"type": "SET_STATION", "station": {"stationuuid": "42", "url": "https://x/stream"}}
//! {"type": "HEARTBEAT"}
//! ```
//!
//! See [`Message`] for the full set. Decoding is lenient: a payload that is
//! not a message at all is dropped by [`decode`], and a message with an
//! unknown `type` decodes to [`Message::Unknown`] for the dispatcher to
//! ignore.

pub mod messages;

pub use messages::Message;

use crate::error::Result;

/// Encodes a message for the transport.
///
/// # Errors
///
/// Returns an error for [`Message::Unknown`], which only exists on the
/// receiving end.
pub fn encode(message: &Message) -> Result<String> {
    let text = serde_json::to_string(message)?;
    Ok(text)
}

/// Decodes a message received from the transport.
///
/// Returns `None` for payloads that are not a peer message, logging them at
/// `debug` level with the raw text at `trace` level.
#[must_use]
pub fn decode(text: &str) -> Option<Message> {
    match serde_json::from_str::<Message>(text) {
        Ok(message) => {
            trace!("received {message:?}");
            Some(message)
        }
        Err(e) => {
            debug!("ignoring undecodable message: {e}");
            trace!("{text}");
            None
        }
    }
}
