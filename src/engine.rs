//! Playback adapter between [`PlayerState`] and an audio backend.
//!
//! The backend itself is opaque: it is asked to [`load`](Backend::load) a
//! [`Source`] and hands back a [`Sound`] that can be played, paused and
//! unloaded. Backend callbacks are reported through the [`Callbacks`] handle
//! it receives with each load, and queued until the owner of the
//! [`PlayerState`] is ready to apply them with [`Engine::handle`].
//!
//! The adapter is driven in two directions:
//!
//! * [`Engine::sync`] is called after every state mutation and brings the
//!   backend in line: a new selection rebuilds the sound, an intent change
//!   plays or pauses it, a volume or mute change goes to the backend mixer.
//! * [`Engine::handle`] applies backend callbacks to the state. Each sound is
//!   tagged with the selection it was created for; callbacks from a sound
//!   that has since been replaced are discarded.

use std::fmt;

use tokio::sync::mpsc;
use url::Url;

use crate::{
    player::{PlayerState, Volume},
    station::StationId,
};

/// What to load, and how to start it.
#[derive(Clone, Debug, PartialEq)]
pub struct Source {
    pub url: Url,
    pub volume: Volume,
    pub muted: bool,
    pub autoplay: bool,
}

/// Callbacks a backend reports for a loaded sound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendEvent {
    Loaded,
    Play,
    Pause,
    End,
    LoadError(String),
    PlayError(String),
}

impl fmt::Display for BackendEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => write!(f, "load success"),
            Self::Play => write!(f, "play"),
            Self::Pause => write!(f, "pause"),
            Self::End => write!(f, "stream end"),
            Self::LoadError(e) => write!(f, "load error: {e}"),
            Self::PlayError(e) => write!(f, "play error: {e}"),
        }
    }
}

/// A backend callback tagged with the sound instance that raised it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    generation: u64,
    station: StationId,
    pub event: BackendEvent,
}

/// Handle through which one sound instance reports its callbacks.
#[derive(Clone, Debug)]
pub struct Callbacks {
    generation: u64,
    station: StationId,
    tx: mpsc::UnboundedSender<Notification>,
}

impl Callbacks {
    /// Reports `event` for this sound. Reports after the engine is gone are
    /// dropped.
    pub fn emit(&self, event: BackendEvent) {
        let notification = Notification {
            generation: self.generation,
            station: self.station.clone(),
            event,
        };
        if self.tx.send(notification).is_err() {
            trace!("engine gone, dropping backend callback");
        }
    }
}

/// One loaded stream.
pub trait Sound {
    /// Starts playback. Calling this on a sound that is already playing has
    /// no effect.
    fn play(&mut self);
    fn pause(&mut self);
    fn is_loaded(&self) -> bool;
    fn is_playing(&self) -> bool;

    /// Releases every resource held by the sound, also while it is still
    /// loading. Must be safe to call more than once.
    fn unload(&mut self);
}

/// The audio output that creates sounds.
pub trait Backend {
    type Sound: Sound;

    /// Starts loading `source`. Callbacks for the returned sound must be
    /// reported through `callbacks`.
    fn load(&mut self, source: Source, callbacks: Callbacks) -> Self::Sound;

    /// Sets the master volume of all sounds.
    fn set_volume(&mut self, volume: Volume);

    /// Mutes or unmutes all sounds.
    fn set_muted(&mut self, muted: bool);
}

struct Instance<S> {
    generation: u64,
    station: StationId,
    sound: S,
}

/// Last state the backend was brought in line with.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Applied {
    selection: u64,
    playing: bool,
    volume: Volume,
    muted: bool,
}

impl Applied {
    fn from_state(state: &PlayerState) -> Self {
        Self {
            selection: state.selection(),
            playing: state.is_playing(),
            volume: state.volume(),
            muted: state.is_muted(),
        }
    }
}

pub struct Engine<B: Backend> {
    backend: B,
    current: Option<Instance<B::Sound>>,
    applied: Applied,

    tx: mpsc::UnboundedSender<Notification>,
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl<B: Backend> Engine<B> {
    /// Creates an adapter for `state`, seeding the backend mixer with its
    /// volume and mute setting.
    ///
    /// No sound is loaded until the first [`sync`](Self::sync), even when
    /// `state` already has a station selected.
    ///
    /// # Arguments
    ///
    /// * `backend` - Audio output to drive
    /// * `state` - Player state the backend is kept in line with
    pub fn new(mut backend: B, state: &PlayerState) -> Self {
        let applied = Applied::from_state(state);
        backend.set_volume(applied.volume);
        backend.set_muted(applied.muted);

        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend,
            current: None,
            // No station is ever loaded before the first `sync`.
            applied: Applied {
                selection: 0,
                ..applied
            },
            tx,
            rx,
        }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Station of the sound currently held, if any.
    #[must_use]
    pub fn loaded_station(&self) -> Option<&StationId> {
        self.current.as_ref().map(|instance| &instance.station)
    }

    /// Waits for the next backend callback.
    ///
    /// Callbacks from superseded sounds are returned too; [`handle`]
    /// discards them.
    ///
    /// This is cancel safe.
    ///
    /// [`handle`]: Self::handle
    pub async fn recv(&mut self) -> Notification {
        // The engine holds a sender itself, so the channel never closes.
        match self.rx.recv().await {
            Some(notification) => notification,
            None => std::future::pending().await,
        }
    }

    /// Brings the backend in line with `state`.
    ///
    /// Call after every mutation of `state`. Compares `state` with what was
    /// last applied and issues only the difference:
    ///
    /// * Volume and mute go straight to the mixer; the sound is kept.
    /// * A new selection, including re-selecting the current station,
    ///   unloads the current sound and loads the selected station's stream
    ///   with the current volume, mute and play intent.
    /// * Otherwise a changed play intent starts or pauses the current sound.
    ///   Play is deferred while the sound is still loading.
    ///
    /// # Arguments
    ///
    /// * `state` - Player state after the mutation
    pub fn sync(&mut self, state: &mut PlayerState) {
        let wanted = Applied::from_state(state);

        if wanted.volume != self.applied.volume {
            self.backend.set_volume(wanted.volume);
        }
        if wanted.muted != self.applied.muted {
            self.backend.set_muted(wanted.muted);
        }

        if wanted.selection != self.applied.selection {
            self.reload(state);
        } else if wanted.playing != self.applied.playing {
            self.reconcile(wanted.playing);
        }

        self.applied = wanted;
    }

    /// Applies a backend callback to `state`, unless it comes from a sound
    /// that is no longer current.
    ///
    /// A callback is current when both its selection generation and its
    /// `stationuuid` match the loaded sound. On load completion the play
    /// intent is reconciled, which starts a play that was deferred while
    /// loading or pauses a sound that autoplayed against a newer intent.
    ///
    /// # Arguments
    ///
    /// * `state` - Player state to update
    /// * `notification` - Callback as received from [`recv`](Self::recv)
    pub fn handle(&mut self, state: &mut PlayerState, notification: Notification) {
        let is_current = self.current.as_ref().is_some_and(|instance| {
            instance.generation == notification.generation
                && instance.station == notification.station
        });
        if !is_current {
            debug!(
                "discarding {} from superseded station {}",
                notification.event, notification.station
            );
            return;
        }

        match notification.event {
            BackendEvent::Loaded => {
                debug!("station {} loaded", notification.station);
                state.on_loaded();
                // A play or pause intent that arrived mid-load is honoured now.
                self.reconcile(state.is_playing());
            }
            BackendEvent::Play => state.on_play(),
            BackendEvent::Pause => state.on_pause(),
            BackendEvent::End => {
                info!("stream of station {} ended", notification.station);
                state.on_end();
            }
            BackendEvent::LoadError(e) => {
                error!("error loading station {}: {e}", notification.station);
                state.on_error();
            }
            BackendEvent::PlayError(e) => {
                error!("error playing station {}: {e}", notification.station);
                state.on_error();
            }
        }

        self.applied.playing = state.is_playing();
    }

    /// Releases the current sound. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(mut instance) = self.current.take() {
            debug!("unloading station {}", instance.station);
            instance.sound.unload();
        }
    }

    fn reload(&mut self, state: &PlayerState) {
        self.shutdown();

        let Some(station) = state.station() else {
            return;
        };

        let generation = state.selection();
        let source = Source {
            url: station.stream_url().clone(),
            volume: state.volume(),
            muted: state.is_muted(),
            autoplay: state.is_playing(),
        };
        let callbacks = Callbacks {
            generation,
            station: station.id().clone(),
            tx: self.tx.clone(),
        };

        info!("loading station {station} from {}", station.stream_url());
        let sound = self.backend.load(source, callbacks);
        self.current = Some(Instance {
            generation,
            station: station.id().clone(),
            sound,
        });
    }

    /// Starts or stops the current sound to match `playing`. Play is only
    /// issued to a sound that finished loading.
    fn reconcile(&mut self, playing: bool) {
        let Some(instance) = self.current.as_mut() else {
            return;
        };
        let sound = &mut instance.sound;

        if playing && !sound.is_playing() {
            if sound.is_loaded() {
                sound.play();
            } else {
                trace!("deferring play until station {} loads", instance.station);
            }
        } else if !playing && sound.is_playing() {
            sound.pause();
        }
    }
}

impl<B: Backend> Drop for Engine<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{player::Status, station::Station};

    #[derive(Default)]
    struct Shared {
        calls: Vec<String>,
        handles: Vec<Callbacks>,
        sources: Vec<Source>,
        loaded: Vec<bool>,
        playing: Vec<bool>,
    }

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Shared>>);

    struct RecordedSound {
        index: usize,
        shared: Rc<RefCell<Shared>>,
    }

    impl Sound for RecordedSound {
        fn play(&mut self) {
            let mut shared = self.shared.borrow_mut();
            shared.calls.push(format!("play {}", self.index));
            shared.playing[self.index] = true;
        }

        fn pause(&mut self) {
            let mut shared = self.shared.borrow_mut();
            shared.calls.push(format!("pause {}", self.index));
            shared.playing[self.index] = false;
        }

        fn is_loaded(&self) -> bool {
            self.shared.borrow().loaded[self.index]
        }

        fn is_playing(&self) -> bool {
            self.shared.borrow().playing[self.index]
        }

        fn unload(&mut self) {
            self.shared
                .borrow_mut()
                .calls
                .push(format!("unload {}", self.index));
        }
    }

    impl Backend for Recorder {
        type Sound = RecordedSound;

        fn load(&mut self, source: Source, callbacks: Callbacks) -> RecordedSound {
            let mut shared = self.0.borrow_mut();
            let index = shared.handles.len();
            shared.calls.push(format!("load {}", source.url));
            shared.sources.push(source);
            shared.handles.push(callbacks);
            shared.loaded.push(false);
            shared.playing.push(false);
            RecordedSound {
                index,
                shared: Rc::clone(&self.0),
            }
        }

        fn set_volume(&mut self, volume: Volume) {
            self.0
                .borrow_mut()
                .calls
                .push(format!("volume {}", volume.as_ratio()));
        }

        fn set_muted(&mut self, muted: bool) {
            self.0.borrow_mut().calls.push(format!("muted {muted}"));
        }
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.0.borrow().calls.clone()
        }

        fn handle(&self, index: usize) -> Callbacks {
            self.0.borrow().handles[index].clone()
        }

        fn finish_loading(&self, index: usize) {
            self.0.borrow_mut().loaded[index] = true;
            self.handle(index).emit(BackendEvent::Loaded);
        }
    }

    fn station(id: &str, url: &str) -> Station {
        Station::new(id, Url::parse(url).unwrap())
    }

    fn setup() -> (Recorder, Engine<Recorder>, PlayerState) {
        let recorder = Recorder::default();
        let state = PlayerState::new();
        let engine = Engine::new(recorder.clone(), &state);
        (recorder, engine, state)
    }

    async fn deliver(engine: &mut Engine<Recorder>, state: &mut PlayerState) {
        let notification = engine.recv().await;
        engine.handle(state, notification);
    }

    #[tokio::test]
    async fn selecting_a_station_loads_it_with_current_settings() {
        let (recorder, mut engine, mut state) = setup();
        state.set_volume(0.3);
        state.set_muted(true);
        state.select_station(station("42", "https://x/stream"));
        engine.sync(&mut state);

        let source = recorder.0.borrow().sources[0].clone();
        assert_eq!(source.url.as_str(), "https://x/stream");
        assert_eq!(source.volume, Volume::from_ratio(0.3));
        assert!(source.muted);
        assert!(source.autoplay);
        assert_eq!(engine.loaded_station().map(StationId::as_str), Some("42"));

        recorder.finish_loading(0);
        deliver(&mut engine, &mut state).await;
        assert_eq!(state.status(), Status::Playing);
    }

    #[test]
    fn resolved_stream_is_loaded() {
        let (recorder, mut engine, mut state) = setup();
        let mut listed = station("42", "https://x/listen.pls");
        listed.url_resolved = Some(Url::parse("https://x/stream").unwrap());
        state.select_station(listed);
        engine.sync(&mut state);

        let source = recorder.0.borrow().sources[0].clone();
        assert_eq!(source.url.as_str(), "https://x/stream");
    }

    #[tokio::test]
    async fn stale_callbacks_are_discarded() {
        let (recorder, mut engine, mut state) = setup();
        state.select_station(station("X", "https://x/one"));
        engine.sync(&mut state);
        state.select_station(station("Y", "https://x/two"));
        engine.sync(&mut state);

        assert_eq!(
            recorder.calls()[recorder.calls().len() - 2..],
            ["unload 0".to_owned(), "load https://x/two".to_owned()]
        );

        // The superseded sound finishes loading late.
        recorder.finish_loading(0);
        deliver(&mut engine, &mut state).await;
        assert_eq!(state.station().map(|s| s.id().as_str()), Some("Y"));
        assert_eq!(state.status(), Status::Loading);

        recorder.handle(0).emit(BackendEvent::LoadError("late".to_owned()));
        deliver(&mut engine, &mut state).await;
        assert_eq!(state.status(), Status::Loading);

        recorder.finish_loading(1);
        deliver(&mut engine, &mut state).await;
        assert_eq!(state.status(), Status::Playing);
    }

    #[tokio::test]
    async fn reselecting_the_same_station_rebuilds_the_sound() {
        let (recorder, mut engine, mut state) = setup();
        state.select_station(station("42", "https://x/stream"));
        engine.sync(&mut state);
        recorder
            .handle(0)
            .emit(BackendEvent::LoadError("404".to_owned()));
        deliver(&mut engine, &mut state).await;
        assert_eq!(state.status(), Status::Error);

        state.select_station(station("42", "https://x/stream"));
        engine.sync(&mut state);
        assert_eq!(state.status(), Status::Loading);

        // Same station, but the old instance's callbacks are still stale.
        recorder.handle(0).emit(BackendEvent::Loaded);
        deliver(&mut engine, &mut state).await;
        assert_eq!(state.status(), Status::Loading);

        recorder.finish_loading(1);
        deliver(&mut engine, &mut state).await;
        assert_eq!(state.status(), Status::Playing);
    }

    #[tokio::test]
    async fn play_intent_waits_for_load_completion() {
        let (recorder, mut engine, mut state) = setup();
        state.select_station(station("42", "https://x/stream"));
        state.pause();
        engine.sync(&mut state);
        assert!(!recorder.0.borrow().sources[0].autoplay);

        state.play();
        engine.sync(&mut state);
        assert!(!recorder.calls().contains(&"play 0".to_owned()));

        recorder.finish_loading(0);
        deliver(&mut engine, &mut state).await;
        assert_eq!(state.status(), Status::Playing);
        assert!(recorder.calls().contains(&"play 0".to_owned()));
    }

    #[tokio::test]
    async fn intent_changes_play_and_pause_a_loaded_sound() {
        let (recorder, mut engine, mut state) = setup();
        state.select_station(station("42", "https://x/stream"));
        state.pause();
        engine.sync(&mut state);
        recorder.finish_loading(0);
        deliver(&mut engine, &mut state).await;
        assert_eq!(state.status(), Status::Paused);

        state.toggle_play_pause();
        engine.sync(&mut state);
        state.toggle_play_pause();
        engine.sync(&mut state);

        let calls = recorder.calls();
        assert_eq!(calls[calls.len() - 2..], ["play 0".to_owned(), "pause 0".to_owned()]);
    }

    #[tokio::test]
    async fn stream_end_clears_play_intent() {
        let (recorder, mut engine, mut state) = setup();
        state.select_station(station("42", "https://x/stream"));
        engine.sync(&mut state);
        recorder.finish_loading(0);
        deliver(&mut engine, &mut state).await;

        recorder.handle(0).emit(BackendEvent::End);
        deliver(&mut engine, &mut state).await;
        assert!(!state.is_playing());
        assert_eq!(state.status(), Status::Paused);
    }

    #[test]
    fn volume_and_mute_propagate_without_reload() {
        let (recorder, mut engine, mut state) = setup();
        state.select_station(station("42", "https://x/stream"));
        engine.sync(&mut state);

        state.set_volume(0.5);
        state.set_muted(true);
        engine.sync(&mut state);

        let calls = recorder.calls();
        assert_eq!(
            calls[calls.len() - 2..],
            ["volume 0.5".to_owned(), "muted true".to_owned()]
        );
        assert!(!calls.iter().any(|call| call.starts_with("unload")));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let (recorder, mut engine, mut state) = setup();
        state.select_station(station("42", "https://x/stream"));
        engine.sync(&mut state);

        engine.shutdown();
        engine.shutdown();
        drop(engine);

        let unloads = recorder
            .calls()
            .iter()
            .filter(|call| call.starts_with("unload"))
            .count();
        assert_eq!(unloads, 1);
    }
}
