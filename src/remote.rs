//! The remote: a control surface for a host.
//!
//! A [`Remote`] dials its host as soon as its session is set up and turns
//! user intents into commands. It keeps no player state of its own.
//! Reconnecting means dropping the remote and creating a new one.

use tokio::sync::mpsc;

use crate::{
    config::Config,
    dispatch::Intent,
    error::Result,
    events::Event,
    protocol::Message,
    role::Role,
    session::Session,
    transport::{PeerId, Transport, TransportEvent},
};

pub struct Remote<T: Transport> {
    session: Session<T>,
}

impl<T: Transport> Remote<T> {
    /// Creates a remote for the host registered as `host`.
    ///
    /// The remote dials once [`recv`](Self::recv) is first polled and the
    /// setup delay has passed.
    pub fn new(
        host: PeerId,
        config: Config,
        transport: T,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self {
            session: Session::new(Role::Remote { host }, config, transport, events),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    /// Whether commands currently reach the host.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.connection().is_some()
    }

    /// Sends the command for `intent` to the host. Without an open link the
    /// command is dropped, not queued.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to send.
    pub fn request(&mut self, intent: Intent) -> Result<()> {
        self.session.send(&Message::from(intent))
    }

    /// Waits for the next session event. Returns `None` once torn down.
    ///
    /// This is cancel safe.
    pub async fn recv(&mut self) -> Option<Event> {
        let event = self.session.recv().await;
        if let Some(Event::Message(Message::Welcome { message })) = &event {
            info!("host says: {message}");
        }
        event
    }

    pub fn teardown(&mut self) {
        self.session.teardown();
    }
}
