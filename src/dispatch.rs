//! Commands between remote controls and the host player.
//!
//! On the host, [`dispatch`] applies an inbound message to the
//! [`PlayerState`]. On the remote, every [`Intent`] maps to exactly one
//! outbound message. The host applies its own buttons through [`apply`].

use crate::{player::PlayerState, protocol::Message, station::Station};

/// Something a user asked for on a control surface.
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    TogglePlayPause,
    SetVolume(f64),
    SelectStation(Station),
}

impl From<Intent> for Message {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::TogglePlayPause => Self::PlayPause,
            Intent::SetVolume(value) => Self::SetVolume { value },
            Intent::SelectStation(station) => Self::SetStation {
                station: Some(station),
            },
        }
    }
}

/// Applies a local intent to `state`.
pub fn apply(state: &mut PlayerState, intent: Intent) {
    match intent {
        Intent::TogglePlayPause => state.toggle_play_pause(),
        Intent::SetVolume(value) => state.set_volume(value),
        Intent::SelectStation(station) => state.select_station(station),
    }
}

/// Applies a message from a remote to `state`.
///
/// Returns whether `state` was touched. Messages that are not commands, and
/// `SET_STATION` without a station, are ignored.
pub fn dispatch(state: &mut PlayerState, message: Message) -> bool {
    match message {
        Message::PlayPause => apply(state, Intent::TogglePlayPause),
        Message::SetVolume { value } => apply(state, Intent::SetVolume(value)),
        Message::SetStation {
            station: Some(station),
        } => {
            info!("remote selected station {station}");
            apply(state, Intent::SelectStation(station));
        }
        Message::SetStation { station: None } => {
            warn!("ignoring SET_STATION without a station");
            return false;
        }
        Message::Greeting { message } => {
            info!("remote says: {message}");
            return false;
        }
        message => {
            debug!("ignoring {message}");
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::player::{Status, Volume};

    fn station(id: &str) -> Station {
        Station::new(id, Url::parse("https://streams.example/live.mp3").unwrap())
    }

    #[test]
    fn play_pause_toggles() {
        let mut state = PlayerState::new();
        assert!(dispatch(&mut state, Message::PlayPause));
        assert!(state.is_playing());
        assert_eq!(state.status(), Status::Playing);

        assert!(dispatch(&mut state, Message::PlayPause));
        assert!(!state.is_playing());
        assert_eq!(state.status(), Status::Paused);
    }

    #[test]
    fn volume_is_clamped() {
        let mut state = PlayerState::new();
        dispatch(&mut state, Message::SetVolume { value: 1.7 });
        assert_eq!(state.volume(), Volume::MAX);
        dispatch(&mut state, Message::SetVolume { value: -0.3 });
        assert_eq!(state.volume(), Volume::MIN);
        dispatch(&mut state, Message::SetVolume { value: 0.25 });
        assert_eq!(state.volume().as_ratio(), 0.25);
    }

    #[test]
    fn set_station_selects_and_loads() {
        let mut state = PlayerState::new();
        let touched = dispatch(
            &mut state,
            Message::SetStation {
                station: Some(station("42")),
            },
        );

        assert!(touched);
        assert_eq!(state.station().map(|s| s.id().as_str()), Some("42"));
        assert_eq!(state.status(), Status::Loading);
        assert!(state.is_playing());
    }

    #[test]
    fn malformed_and_foreign_messages_are_ignored() {
        let mut state = PlayerState::new();
        for message in [
            Message::SetStation { station: None },
            Message::Unknown,
            Message::Welcome {
                message: "hi".to_owned(),
            },
            Message::Greeting {
                message: "hello".to_owned(),
            },
        ] {
            assert!(!dispatch(&mut state, message));
        }

        assert!(state.station().is_none());
        assert!(!state.is_playing());
        assert_eq!(state.status(), Status::Paused);
        assert_eq!(state.selection(), 0);
    }

    #[test]
    fn intents_map_to_messages() {
        assert_eq!(Message::from(Intent::TogglePlayPause), Message::PlayPause);
        assert_eq!(
            Message::from(Intent::SetVolume(0.5)),
            Message::SetVolume { value: 0.5 }
        );
        assert!(matches!(
            Message::from(Intent::SelectStation(station("7"))),
            Message::SetStation { station: Some(s) } if s.id().as_str() == "7"
        ));
    }
}
