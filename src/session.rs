//! Peer session: one control link between a host and a remote.
//!
//! A [`Session`] owns the transport endpoint for its [`Role`] and at most one
//! link:
//!
//! * A host registers under its session token and waits. Each inbound link
//!   replaces the previous one, which is closed. Once a link opens the host
//!   sends a `WELCOME` and starts a liveness [`Monitor`] on it.
//! * A remote registers under a transport-assigned id and dials its host
//!   right away. Once the link opens it sends a `GREETING`. It answers every
//!   `HEARTBEAT` with a `HEARTBEAT_ACK`.
//!
//! Nothing is re-dialled automatically. A remote that wants back in creates a
//! fresh session, which dials from scratch.
//!
//! The session is driven by [`Session::recv`], which waits on the setup
//! delay, the transport and the liveness timers, and returns whenever
//! something happens that the caller needs to know about. Timers are owned
//! by the session; [`Session::teardown`] (or dropping the session) cancels
//! them all and destroys the endpoint.
//!
//! Transport errors are logged and otherwise ignored: a link that fails
//! reports its own close.

use tokio::sync::mpsc;

use crate::{
    config::Config,
    error::Result,
    events::Event,
    liveness::{Action, Monitor, Probe},
    protocol::{self, Message},
    role::Role,
    transport::{LinkId, PeerId, Transport, TransportEvent},
    util::{self, Timer},
};

struct Link {
    id: LinkId,
    open: bool,

    /// Host side only, from the moment the link opens.
    monitor: Option<Monitor>,
}

impl Link {
    fn new(id: LinkId) -> Self {
        Self {
            id,
            open: false,
            monitor: None,
        }
    }
}

/// What woke [`Session::recv`].
enum Wake {
    Setup,
    Transport(Option<TransportEvent>),
    Probe(Probe),
}

pub struct Session<T: Transport> {
    role: Role,
    config: Config,

    transport: T,
    events: mpsc::UnboundedReceiver<TransportEvent>,

    /// Armed on the first poll of `recv`.
    setup: Timer,
    started: bool,
    peer_id: Option<PeerId>,
    link: Option<Link>,
    torn_down: bool,
}

impl<T: Transport> Session<T> {
    /// Creates a session.
    ///
    /// Nothing happens until [`recv`](Self::recv) is first polled: that arms
    /// the setup delay, after which the transport endpoint is created. A
    /// session can therefore be created outside of a Tokio runtime, but must
    /// be driven inside one.
    ///
    /// # Arguments
    ///
    /// * `role` - Host or remote, as resolved from the page URL
    /// * `config` - Setup delay, heartbeat timings and greeting texts
    /// * `transport` - Unopened endpoint to run the link over
    /// * `events` - Channel on which `transport` reports
    pub fn new(
        role: Role,
        config: Config,
        transport: T,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        debug!("starting session as {role}");
        Self {
            role,
            config,
            transport,
            events,
            setup: None,
            started: false,
            peer_id: None,
            link: None,
            torn_down: false,
        }
    }

    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Identifier the transport registered this endpoint under.
    #[must_use]
    pub fn peer_id(&self) -> Option<&PeerId> {
        self.peer_id.as_ref()
    }

    /// Returns the current link once it is open.
    ///
    /// A link that was dialled or accepted but has not reported open yet,
    /// and a link that closed or was replaced, both yield `None`. The
    /// transport may still consider a returned link open after the other
    /// end vanished; liveness probing on the host catches that.
    #[must_use]
    pub fn connection(&self) -> Option<LinkId> {
        self.link
            .as_ref()
            .filter(|link| link.open)
            .map(|link| link.id)
    }

    /// Whether a liveness monitor is running on the link.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.monitor().is_some()
    }

    /// Whether a heartbeat is waiting for its acknowledgement.
    #[must_use]
    pub fn is_awaiting_ack(&self) -> bool {
        self.monitor().is_some_and(Monitor::is_awaiting_ack)
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Sends `message` over the open link.
    ///
    /// Without an open link the message is dropped, not queued, and this
    /// returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be encoded (only
    /// [`Message::Unknown`]) or the transport fails to send.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        match self.connection() {
            Some(link) if self.transport.is_open(link) => self.transmit(link, message),
            _ => {
                debug!("no open link, dropping {message}");
                Ok(())
            }
        }
    }

    /// Waits for the next event.
    ///
    /// Drives the setup delay, the transport and the liveness timers.
    /// Transport events are handled before liveness probes, so an
    /// acknowledgement that arrives in the same instant as its deadline still
    /// counts. Heartbeat traffic is handled here and never returned.
    ///
    /// # Returns
    ///
    /// The next [`Event`], or `None` once the session is torn down or the
    /// transport went away.
    ///
    /// This is cancel safe.
    pub async fn recv(&mut self) -> Option<Event> {
        if !self.started && !self.torn_down {
            self.started = true;
            self.setup = util::arm(self.config.setup_delay);
        }

        while !self.torn_down {
            let wake = tokio::select! {
                biased;

                () = util::elapsed(&mut self.setup) => Wake::Setup,
                event = self.events.recv() => Wake::Transport(event),
                probe = next_probe(&mut self.link) => Wake::Probe(probe),
            };

            let event = match wake {
                Wake::Setup => {
                    self.setup = None;
                    self.open_endpoint();
                    None
                }
                Wake::Transport(Some(event)) => self.handle_transport(event),
                Wake::Transport(None) => {
                    warn!("transport went away");
                    self.teardown();
                    None
                }
                Wake::Probe(probe) => self.handle_probe(probe),
            };

            if event.is_some() {
                return event;
            }
        }

        None
    }

    /// Cancels the setup delay and liveness timers and destroys the
    /// transport endpoint, closing its links.
    ///
    /// Safe to call any number of times, and before the session ever ran: an
    /// endpoint is never created after teardown.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.setup = None;
        self.link = None;
        if !self.transport.is_destroyed() {
            self.transport.destroy();
        }

        debug!("session torn down");
    }

    fn monitor(&self) -> Option<&Monitor> {
        self.link.as_ref().and_then(|link| link.monitor.as_ref())
    }

    fn is_current(&self, link: LinkId) -> bool {
        self.link.as_ref().is_some_and(|current| current.id == link)
    }

    fn open_endpoint(&mut self) {
        let id = match &self.role {
            Role::Host { session } => Some(session.peer_id()),
            Role::Remote { .. } => None,
        };

        if let Err(e) = self.transport.open(id.as_ref()) {
            error!("could not open transport endpoint: {e}");
        }
    }

    fn transmit(&mut self, link: LinkId, message: &Message) -> Result<()> {
        let text = protocol::encode(message)?;
        if message.is_heartbeat() {
            trace!("{message} on link {link}");
        } else {
            debug!("sending {message} on link {link}");
        }
        self.transport.send(link, text)
    }

    /// Makes `id` the current link, closing the previous one.
    fn replace_link(&mut self, id: LinkId) {
        if let Some(previous) = self.link.take() {
            debug!("link {id} replaces link {}", previous.id);
            self.transport.close(previous.id);
        }
        self.link = Some(Link::new(id));
    }

    fn handle_transport(&mut self, event: TransportEvent) -> Option<Event> {
        match event {
            TransportEvent::Ready(peer_id) => {
                info!("registered as {peer_id}");
                self.peer_id = Some(peer_id.clone());

                if let Role::Remote { host } = &self.role {
                    let host = host.clone();
                    match self.transport.connect(&host) {
                        Ok(link) => {
                            debug!("dialling host {host} on link {link}");
                            self.replace_link(link);
                        }
                        Err(e) => error!("could not connect to host {host}: {e}"),
                    }
                }

                Some(Event::Ready(peer_id))
            }

            TransportEvent::Incoming(link) => {
                if self.role.is_host() {
                    debug!("remote dialled in on link {link}");
                    self.replace_link(link);
                } else {
                    warn!("refusing inbound link {link}");
                    self.transport.close(link);
                }
                None
            }

            TransportEvent::Open(link) => self.handle_open(link),
            TransportEvent::Data(link, text) => self.handle_data(link, &text),
            TransportEvent::Close(link) => self.handle_close(link),

            TransportEvent::Error(e) => {
                error!("transport error: {e}");
                None
            }
        }
    }

    fn handle_open(&mut self, id: LinkId) -> Option<Event> {
        let is_host = self.role.is_host();
        let (interval, timeout) = (self.config.heartbeat_interval, self.config.heartbeat_timeout);

        let Some(link) = self.link.as_mut().filter(|link| link.id == id) else {
            trace!("ignoring open of superseded link {id}");
            return None;
        };
        link.open = true;

        let hello = if is_host {
            link.monitor = Some(Monitor::new(interval, timeout));
            Message::Welcome {
                message: self.config.welcome.clone(),
            }
        } else {
            Message::Greeting {
                message: self.config.greeting.clone(),
            }
        };

        info!("link {id} open");
        if let Err(e) = self.transmit(id, &hello) {
            error!("could not send {hello}: {e}");
        }

        Some(Event::Connected)
    }

    fn handle_data(&mut self, link: LinkId, text: &str) -> Option<Event> {
        if !self.is_current(link) {
            trace!("ignoring data on superseded link {link}");
            return None;
        }

        match protocol::decode(text)? {
            Message::Heartbeat => {
                if !self.role.is_host() {
                    if let Err(e) = self.transmit(link, &Message::HeartbeatAck) {
                        warn!("could not acknowledge heartbeat: {e}");
                    }
                }
                None
            }

            Message::HeartbeatAck => {
                let monitor = self.link.as_mut().and_then(|link| link.monitor.as_mut());
                if !monitor.is_some_and(Monitor::acknowledge) {
                    trace!("ignoring unsolicited heartbeat ack");
                }
                None
            }

            message => Some(Event::Message(message)),
        }
    }

    fn handle_close(&mut self, id: LinkId) -> Option<Event> {
        if !self.is_current(id) {
            trace!("superseded link {id} closed");
            return None;
        }

        let was_open = self.link.take().is_some_and(|link| link.open);
        info!("link {id} closed");
        was_open.then_some(Event::Disconnected)
    }

    fn handle_probe(&mut self, probe: Probe) -> Option<Event> {
        let link = self.link.as_mut()?;
        let id = link.id;
        let open = link.open && self.transport.is_open(id);
        let monitor = link.monitor.as_mut()?;

        match probe {
            Probe::Tick => match monitor.tick(open) {
                Action::Send => {
                    if let Err(e) = self.transmit(id, &Message::Heartbeat) {
                        warn!("could not send heartbeat on link {id}: {e}");
                        return self.force_close(id);
                    }
                    None
                }
                Action::Skip => {
                    trace!("heartbeat on link {id} still unacknowledged");
                    None
                }
                Action::Stop => {
                    debug!("link {id} no longer open, stopping liveness probes");
                    link.monitor = None;
                    None
                }
            },

            Probe::Expired => {
                warn!(
                    "remote did not acknowledge heartbeat within {:?}, closing link {id}",
                    self.config.heartbeat_timeout
                );
                self.force_close(id)
            }
        }
    }

    /// Closes the current link from this side, as a disconnect.
    fn force_close(&mut self, id: LinkId) -> Option<Event> {
        self.link = None;
        self.transport.close(id);
        Some(Event::Disconnected)
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn next_probe(link: &mut Option<Link>) -> Probe {
    match link.as_mut().and_then(|link| link.monitor.as_mut()) {
        Some(monitor) => monitor.next().await,
        None => std::future::pending().await,
    }
}
