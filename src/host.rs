//! The host: owns playback and obeys its remote.
//!
//! [`Host`] ties a host [`Session`] to the [`PlayerState`] and the playback
//! [`Engine`]. It is a single dispatch loop: every step handles exactly one
//! session event or backend callback, mutates the state through its named
//! actions and brings the backend in line before the next step.

use tokio::sync::mpsc;

use crate::{
    config::Config,
    dispatch::{self, Intent},
    engine::{Backend, Engine, Notification},
    events::Event,
    player::{PlayerState, Status},
    role::{Role, SessionId},
    session::Session,
    transport::{Transport, TransportEvent},
};

enum Wake {
    Session(Option<Event>),
    Backend(Notification),
}

pub struct Host<T: Transport, B: Backend> {
    session: Session<T>,
    state: PlayerState,
    engine: Engine<B>,
}

impl<T: Transport, B: Backend> Host<T, B> {
    /// Creates a host for `session`, playing through `backend`.
    ///
    /// Like [`Session::new`], this arms no timers; the host starts when
    /// [`step`](Self::step) is first polled.
    pub fn new(
        session: SessionId,
        config: Config,
        transport: T,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        backend: B,
    ) -> Self {
        let state = PlayerState::new();
        let engine = Engine::new(backend, &state);
        let session = Session::new(Role::Host { session }, config, transport, events);

        Self {
            session,
            state,
            engine,
        }
    }

    #[must_use]
    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    #[must_use]
    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    #[must_use]
    pub fn engine(&self) -> &Engine<B> {
        &self.engine
    }

    /// Applies a control on the host itself. Returns the status change, if
    /// any.
    pub fn control(&mut self, intent: Intent) -> Option<Event> {
        self.update(|state| dispatch::apply(state, intent))
    }

    /// Mutes or unmutes the output.
    pub fn set_muted(&mut self, muted: bool) {
        self.update(|state| state.set_muted(muted));
    }

    /// Handles the next session event or backend callback.
    ///
    /// Backend callbacks are handled before session events, so a command
    /// always sees the effect of callbacks that were queued ahead of it.
    ///
    /// # Returns
    ///
    /// The next event that concerns the caller: link lifecycle, messages
    /// that are not commands, or a playback status change. `None` once the
    /// session is torn down.
    ///
    /// This is cancel safe.
    pub async fn step(&mut self) -> Option<Event> {
        loop {
            let wake = tokio::select! {
                // Callbacks queued by earlier actions are applied before the
                // next command.
                biased;

                notification = self.engine.recv() => Wake::Backend(notification),
                event = self.session.recv() => Wake::Session(event),
            };

            let event = match wake {
                Wake::Session(None) => return None,
                Wake::Session(Some(Event::Message(message))) => {
                    let mut handled = false;
                    let status = self.update(|state| {
                        handled = dispatch::dispatch(state, message.clone());
                    });
                    if handled {
                        status
                    } else {
                        Some(Event::Message(message))
                    }
                }
                Wake::Session(Some(event)) => Some(event),
                Wake::Backend(notification) => {
                    let before = self.state.status();
                    self.engine.handle(&mut self.state, notification);
                    self.engine.sync(&mut self.state);
                    self.status_change(before)
                }
            };

            if event.is_some() {
                return event;
            }
        }
    }

    /// Tears down the session and releases the current sound. Safe to call
    /// more than once.
    pub fn teardown(&mut self) {
        self.session.teardown();
        self.engine.shutdown();
    }

    /// Mutates the state, syncs the backend and reports a status change.
    fn update<F>(&mut self, action: F) -> Option<Event>
    where
        F: FnOnce(&mut PlayerState),
    {
        let before = self.state.status();
        action(&mut self.state);
        self.engine.sync(&mut self.state);
        self.status_change(before)
    }

    fn status_change(&self, before: Status) -> Option<Event> {
        let status = self.state.status();
        if status == before {
            return None;
        }

        info!("playback {status}");
        Some(Event::Status(status))
    }
}

impl<T: Transport, B: Backend> Drop for Host<T, B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
