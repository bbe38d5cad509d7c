//! In-process transport.
//!
//! Endpoints created from the same [`Hub`] can reach each other by peer id.
//! Events are queued on each endpoint's channel, so they arrive
//! asynchronously and in order, as they would over a network.
//!
//! [`LoopbackTransport::vanish`] simulates a peer process that disappears
//! without closing its links: the hub keeps reporting its links as open but
//! nothing reaches it or comes from it any more.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use tokio::sync::mpsc;

use super::{LinkId, PeerId, Transport, TransportEvent};
use crate::error::{Error, Result};

/// Length of transport-assigned peer ids.
const ASSIGNED_ID_LENGTH: usize = 16;

#[derive(Debug)]
struct Endpoint {
    tx: mpsc::UnboundedSender<TransportEvent>,
    vanished: bool,
}

#[derive(Debug)]
struct Link {
    ends: [PeerId; 2],
}

impl Link {
    fn other_end(&self, this: &PeerId) -> &PeerId {
        if &self.ends[0] == this {
            &self.ends[1]
        } else {
            &self.ends[0]
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    endpoints: HashMap<PeerId, Endpoint>,
    links: HashMap<LinkId, Link>,
    next_link: u64,
}

impl Inner {
    fn deliver(&self, to: &PeerId, event: TransportEvent) {
        match self.endpoints.get(to) {
            Some(endpoint) if !endpoint.vanished => {
                if endpoint.tx.send(event).is_err() {
                    trace!("endpoint {to} stopped listening");
                }
            }
            _ => trace!("dropping {event:?} for {to}"),
        }
    }

    fn is_vanished(&self, id: &PeerId) -> bool {
        self.endpoints.get(id).is_some_and(|endpoint| endpoint.vanished)
    }

    fn close(&mut self, link: LinkId) {
        if let Some(closed) = self.links.remove(&link) {
            for end in &closed.ends {
                self.deliver(end, TransportEvent::Close(link));
            }
        }
    }
}

/// Shared registry of loopback endpoints.
#[derive(Clone, Debug, Default)]
pub struct Hub(Rc<RefCell<Inner>>);

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unregistered endpoint and the channel it reports on.
    #[must_use]
    pub fn endpoint(&self) -> (LoopbackTransport, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = LoopbackTransport {
            hub: self.clone(),
            tx,
            id: None,
            destroyed: false,
        };
        (transport, rx)
    }

    /// Whether an endpoint is registered as `id`.
    #[must_use]
    pub fn contains(&self, id: &PeerId) -> bool {
        self.0.borrow().endpoints.contains_key(id)
    }

    /// Number of links currently open.
    #[must_use]
    pub fn open_links(&self) -> usize {
        self.0.borrow().links.len()
    }
}

#[derive(Debug)]
pub struct LoopbackTransport {
    hub: Hub,
    tx: mpsc::UnboundedSender<TransportEvent>,
    id: Option<PeerId>,
    destroyed: bool,
}

impl LoopbackTransport {
    #[must_use]
    pub fn peer_id(&self) -> Option<&PeerId> {
        self.id.as_ref()
    }

    /// Silences this endpoint without closing anything.
    pub fn vanish(&mut self) {
        if let Some(id) = &self.id {
            if let Some(endpoint) = self.hub.0.borrow_mut().endpoints.get_mut(id) {
                debug!("endpoint {id} vanished");
                endpoint.vanished = true;
            }
        }
    }

    fn registered_id(&self) -> Result<&PeerId> {
        if self.destroyed {
            return Err(Error::unavailable("endpoint was destroyed"));
        }
        self.id
            .as_ref()
            .ok_or_else(|| Error::failed_precondition("endpoint is not open"))
    }
}

impl Transport for LoopbackTransport {
    fn open(&mut self, id: Option<&PeerId>) -> Result<()> {
        if self.destroyed {
            return Err(Error::unavailable("endpoint was destroyed"));
        }
        if let Some(current) = &self.id {
            return Err(Error::failed_precondition(format!(
                "endpoint is already open as {current}"
            )));
        }

        let id = id.cloned().unwrap_or_else(|| {
            let assigned: String = (0..ASSIGNED_ID_LENGTH)
                .map(|_| fastrand::alphanumeric().to_ascii_lowercase())
                .collect();
            PeerId::from(assigned)
        });

        let mut inner = self.hub.0.borrow_mut();
        if inner.endpoints.contains_key(&id) {
            let _ = self
                .tx
                .send(TransportEvent::Error(format!("id {id} is taken")));
            return Err(Error::already_exists(format!("id {id} is taken")));
        }

        inner.endpoints.insert(
            id.clone(),
            Endpoint {
                tx: self.tx.clone(),
                vanished: false,
            },
        );
        inner.deliver(&id, TransportEvent::Ready(id.clone()));
        self.id = Some(id);

        Ok(())
    }

    fn connect(&mut self, peer: &PeerId) -> Result<LinkId> {
        let this = self.registered_id()?.clone();

        let mut inner = self.hub.0.borrow_mut();
        if !inner.endpoints.contains_key(peer) {
            return Err(Error::unavailable(format!("could not connect to peer {peer}")));
        }

        inner.next_link += 1;
        let link = LinkId(inner.next_link);
        inner.links.insert(
            link,
            Link {
                ends: [this.clone(), peer.clone()],
            },
        );

        inner.deliver(peer, TransportEvent::Incoming(link));
        inner.deliver(peer, TransportEvent::Open(link));
        inner.deliver(&this, TransportEvent::Open(link));

        Ok(link)
    }

    fn send(&mut self, link: LinkId, data: String) -> Result<()> {
        let this = self.registered_id()?;

        let inner = self.hub.0.borrow();
        let Some(open) = inner.links.get(&link) else {
            return Err(Error::failed_precondition(format!("link {link} is not open")));
        };

        if inner.is_vanished(this) {
            trace!("vanished endpoint {this} cannot send");
            return Ok(());
        }

        inner.deliver(open.other_end(this), TransportEvent::Data(link, data));
        Ok(())
    }

    fn is_open(&self, link: LinkId) -> bool {
        self.hub.0.borrow().links.contains_key(&link)
    }

    fn close(&mut self, link: LinkId) {
        self.hub.0.borrow_mut().close(link);
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        if let Some(id) = self.id.take() {
            let mut inner = self.hub.0.borrow_mut();
            let owned: Vec<LinkId> = inner
                .links
                .iter()
                .filter(|(_, link)| link.ends.contains(&id))
                .map(|(link, _)| *link)
                .collect();
            for link in owned {
                inner.close(link);
            }
            inner.endpoints.remove(&id);
            debug!("endpoint {id} destroyed");
        }
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        self.destroy();
    }
}
