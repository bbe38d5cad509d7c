//! Events surfaced by a peer session and the role loops built on it.
//!
//! A [`Session`](crate::session::Session) reports link lifecycle and
//! inbound commands; the [`Host`](crate::host::Host) loop adds playback
//! status changes. Heartbeat traffic is never surfaced.
//!
//! # Example
//!
//! ```rust
//! use pixelwave::events::Event;
//!
//! fn describe(event: &Event) -> String {
//!     match event {
//!         Event::Ready(peer_id) => format!("registered as {peer_id}"),
//!         Event::Connected => "remote connected".to_owned(),
//!         Event::Disconnected => "remote disconnected".to_owned(),
//!         Event::Message(message) => format!("received {message}"),
//!         Event::Status(status) => format!("playback {status}"),
//!     }
//! }
//! ```

use crate::{player::Status, protocol::Message, transport::PeerId};

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The transport endpoint is registered.
    ///
    /// For a host the peer id equals its session token; remotes pair by
    /// opening the page with `remote=<peer id>`.
    Ready(PeerId),

    /// A link opened.
    ///
    /// Emitted once per link, after the greeting or welcome went out.
    Connected,

    /// The open link closed.
    ///
    /// Emitted when the other end closed it, the transport dropped it, or the
    /// liveness deadline passed. Emitted at most once per link.
    Disconnected,

    /// A protocol message other than heartbeat traffic arrived.
    Message(Message),

    /// Playback status changed on the host.
    Status(Status),
}
