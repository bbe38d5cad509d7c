//! The peer-to-peer transport primitive.
//!
//! pixelwave does not negotiate peer links itself. It drives a [`Transport`]:
//! an endpoint registered under a peer identifier that can dial other
//! endpoints, accept inbound links and carry text payloads over them. The
//! transport reports everything that happens asynchronously as
//! [`TransportEvent`]s on the channel handed out with it.
//!
//! [`loopback`] implements the primitive in-process.

pub mod loopback;

use std::fmt;

use crate::error::Result;

/// Identifier of an endpoint on the transport.
///
/// A host registers under its session token; a remote is assigned one by the
/// transport.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PeerId(String);

impl PeerId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of one logical link between two endpoints.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something that happened on the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// The endpoint is registered under `PeerId`.
    Ready(PeerId),

    /// Another endpoint dialled this one. The link is not open yet.
    Incoming(LinkId),

    /// The link is open for sending.
    Open(LinkId),

    /// A payload arrived on the link. Payloads on one link arrive in the
    /// order they were sent.
    Data(LinkId, String),

    /// The link closed, from either end.
    Close(LinkId),

    /// A transport-level failure. Non-fatal: an affected link reports its
    /// own [`Close`](Self::Close).
    Error(String),
}

pub trait Transport {
    /// Registers the endpoint, under `id` or a transport-assigned
    /// identifier. Completion is reported as [`TransportEvent::Ready`].
    fn open(&mut self, id: Option<&PeerId>) -> Result<()>;

    /// Dials the endpoint registered as `peer`. The link reports
    /// [`TransportEvent::Open`] once usable.
    fn connect(&mut self, peer: &PeerId) -> Result<LinkId>;

    /// Sends a payload over an open link.
    fn send(&mut self, link: LinkId, data: String) -> Result<()>;

    /// Whether the transport considers `link` open. This can stay `true`
    /// long after the other end vanished.
    fn is_open(&self, link: LinkId) -> bool;

    /// Closes `link`. Closing a closed link does nothing.
    fn close(&mut self, link: LinkId);

    /// Closes all links and unregisters the endpoint.
    fn destroy(&mut self);

    fn is_destroyed(&self) -> bool;
}
