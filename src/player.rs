//! Playback intent and observed playback status.
//!
//! [`PlayerState`] is the authoritative record on the host. It holds no I/O:
//! local controls and remote commands mutate it through its actions, and the
//! [`Engine`](crate::engine::Engine) reports backend callbacks back into it
//! through the `on_*` methods.
//!
//! | Action                 | New status                                   |
//! |------------------------|----------------------------------------------|
//! | `select_station`       | `Loading`, intent set to play                |
//! | `play`                 | `Playing`                                    |
//! | `pause`                | `Paused`                                     |
//! | `toggle_play_pause`    | mirrors the new intent                       |
//! | `on_loaded`            | `Playing` if intent is to play, else `Paused`|
//! | `on_play` / `on_pause` | `Playing` / `Paused`                         |
//! | `on_end`               | `Paused`, intent cleared                     |
//! | `on_error`             | `Error`                                      |
//!
//! An `Error` status sticks until a station is selected, a load completes or
//! the backend reports playback; intent changes alone do not clear it.

use std::fmt;

use crate::station::Station;

/// Observed playback condition.
#[derive(Copy, Clone, Debug, Default, Hash, PartialEq, Eq)]
pub enum Status {
    #[default]
    Paused,
    Loading,
    Playing,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paused => write!(f, "paused"),
            Self::Loading => write!(f, "loading"),
            Self::Playing => write!(f, "playing"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Output volume as a ratio in `[0, 1]`.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Volume(f64);

impl Volume {
    pub const MIN: Self = Self(0.0);
    pub const MAX: Self = Self(1.0);

    /// Creates a volume, clamping `ratio` into `[0, 1]`.
    ///
    /// `NaN` is treated as silence.
    #[must_use]
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio.is_nan() {
            return Self::MIN;
        }
        Self(ratio.clamp(0.0, 1.0))
    }

    #[must_use]
    pub fn as_ratio(&self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn as_percent(&self) -> f64 {
        self.0 * 100.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::MAX
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}%", self.as_percent())
    }
}

#[derive(Clone, Debug, Default)]
pub struct PlayerState {
    station: Option<Station>,
    playing: bool,
    volume: Volume,
    muted: bool,
    status: Status,

    /// Bumped on every station selection, including re-selecting the
    /// current station.
    selection: u64,
}

impl PlayerState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn station(&self) -> Option<&Station> {
        self.station.as_ref()
    }

    /// Whether playback is wanted. This is intent, not what the backend does.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    #[must_use]
    pub fn volume(&self) -> Volume {
        self.volume
    }

    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub fn selection(&self) -> u64 {
        self.selection
    }

    pub fn select_station(&mut self, station: Station) {
        debug!("selecting station {station}");
        self.station = Some(station);
        self.playing = true;
        self.status = Status::Loading;
        self.selection = self.selection.wrapping_add(1);
    }

    pub fn play(&mut self) {
        self.playing = true;
        self.set_intent_status(Status::Playing);
    }

    pub fn pause(&mut self) {
        self.playing = false;
        self.set_intent_status(Status::Paused);
    }

    pub fn toggle_play_pause(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn set_volume(&mut self, ratio: f64) {
        self.volume = Volume::from_ratio(ratio);
        debug!("volume set to {}", self.volume);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// The backend finished loading the current station.
    pub fn on_loaded(&mut self) {
        if self.station.is_none() {
            warn!("ignoring load completion without a station");
            return;
        }
        self.status = if self.playing {
            Status::Playing
        } else {
            Status::Paused
        };
    }

    pub fn on_play(&mut self) {
        self.status = Status::Playing;
    }

    pub fn on_pause(&mut self) {
        self.status = Status::Paused;
    }

    /// The stream ended on its own.
    pub fn on_end(&mut self) {
        self.playing = false;
        self.status = Status::Paused;
    }

    pub fn on_error(&mut self) {
        self.status = Status::Error;
    }

    fn set_intent_status(&mut self, status: Status) {
        if self.status != Status::Error {
            self.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    fn station(id: &str) -> Station {
        Station::new(id, Url::parse("https://x/stream").unwrap())
    }

    #[test]
    fn volume_is_clamped() {
        let mut state = PlayerState::new();
        state.set_volume(-0.5);
        assert_eq!(state.volume().as_ratio(), 0.0);
        state.set_volume(1.7);
        assert_eq!(state.volume().as_ratio(), 1.0);
        state.set_volume(0.42);
        assert_eq!(state.volume().as_ratio(), 0.42);
        state.set_volume(f64::NAN);
        assert_eq!(state.volume(), Volume::MIN);
    }

    #[test]
    fn selecting_a_station_loads_and_wants_playback() {
        let mut state = PlayerState::new();
        assert_eq!(state.status(), Status::Paused);

        state.select_station(station("42"));
        assert_eq!(state.status(), Status::Loading);
        assert!(state.is_playing());
        assert_eq!(state.station().map(|s| s.id().as_str()), Some("42"));
        assert_eq!(state.selection(), 1);

        state.select_station(station("42"));
        assert_eq!(state.selection(), 2);
    }

    #[test]
    fn load_completion_follows_intent() {
        let mut state = PlayerState::new();
        state.select_station(station("1"));
        state.on_loaded();
        assert_eq!(state.status(), Status::Playing);

        state.select_station(station("2"));
        state.pause();
        state.on_loaded();
        assert_eq!(state.status(), Status::Paused);
    }

    #[test]
    fn load_completion_without_station_is_ignored() {
        let mut state = PlayerState::new();
        state.on_loaded();
        assert_eq!(state.status(), Status::Paused);
    }

    #[test]
    fn toggle_mirrors_new_intent() {
        let mut state = PlayerState::new();
        state.toggle_play_pause();
        assert!(state.is_playing());
        assert_eq!(state.status(), Status::Playing);
        state.toggle_play_pause();
        assert!(!state.is_playing());
        assert_eq!(state.status(), Status::Paused);
    }

    #[test]
    fn stream_end_clears_intent() {
        let mut state = PlayerState::new();
        state.select_station(station("1"));
        state.on_loaded();
        state.on_end();
        assert!(!state.is_playing());
        assert_eq!(state.status(), Status::Paused);
    }

    #[test]
    fn error_persists_until_recovery() {
        let mut state = PlayerState::new();
        state.select_station(station("1"));
        state.on_error();

        state.toggle_play_pause();
        state.toggle_play_pause();
        assert_eq!(state.status(), Status::Error);

        state.on_loaded();
        assert_eq!(state.status(), Status::Playing);

        state.on_error();
        state.select_station(station("2"));
        assert_eq!(state.status(), Status::Loading);
    }
}
