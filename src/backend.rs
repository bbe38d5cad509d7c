//! In-memory audio backend.
//!
//! [`Simulated`] decodes nothing. It accepts `http` and `https` stream URLs,
//! reports them loaded straight away and logs what a real output would do.
//! Any other scheme fails to load. The console binary and the host tests use
//! it in place of a real audio output.

use crate::{
    engine::{Backend, BackendEvent, Callbacks, Source, Sound},
    player::Volume,
};

#[derive(Debug, Default)]
pub struct Simulated {
    volume: Volume,
    muted: bool,
}

impl Simulated {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn volume(&self) -> Volume {
        self.volume
    }

    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.muted
    }
}

#[derive(Debug)]
pub struct SimulatedSound {
    url: String,
    loaded: bool,
    playing: bool,
    unloaded: bool,
    callbacks: Callbacks,
}

impl Backend for Simulated {
    type Sound = SimulatedSound;

    fn load(&mut self, source: Source, callbacks: Callbacks) -> SimulatedSound {
        let mut sound = SimulatedSound {
            url: source.url.to_string(),
            loaded: false,
            playing: false,
            unloaded: false,
            callbacks,
        };

        match source.url.scheme() {
            "http" | "https" => {
                sound.loaded = true;
                sound.callbacks.emit(BackendEvent::Loaded);
                if source.autoplay {
                    sound.play();
                }
            }
            scheme => sound
                .callbacks
                .emit(BackendEvent::LoadError(format!("unsupported scheme {scheme}"))),
        }

        sound
    }

    fn set_volume(&mut self, volume: Volume) {
        self.volume = volume;
        info!("output volume {volume}");
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        info!("output {}", if muted { "muted" } else { "unmuted" });
    }
}

impl Sound for SimulatedSound {
    fn play(&mut self) {
        if self.unloaded {
            self.callbacks
                .emit(BackendEvent::PlayError("sound was unloaded".to_owned()));
            return;
        }
        if !self.playing {
            self.playing = true;
            info!("playing {}", self.url);
            self.callbacks.emit(BackendEvent::Play);
        }
    }

    fn pause(&mut self) {
        if self.playing {
            self.playing = false;
            info!("paused {}", self.url);
            self.callbacks.emit(BackendEvent::Pause);
        }
    }

    fn is_loaded(&self) -> bool {
        self.loaded && !self.unloaded
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn unload(&mut self) {
        if !self.unloaded {
            self.unloaded = true;
            self.playing = false;
            debug!("released {}", self.url);
        }
    }
}
