//! Messages exchanged over a peer link.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::station::Station;

/// A message on a peer link, tagged by its `type` on the wire.
///
/// # Message Categories
///
/// * Handshake: [`Greeting`](Self::Greeting) from the remote once its link
///   opens, [`Welcome`](Self::Welcome) from the host once it accepts one.
/// * Liveness: [`Heartbeat`](Self::Heartbeat) probes from the host,
///   answered by [`HeartbeatAck`](Self::HeartbeatAck). Both may be lost or
///   duplicated; they never reach the dispatcher.
/// * Commands from remote to host: [`PlayPause`](Self::PlayPause),
///   [`SetVolume`](Self::SetVolume) and [`SetStation`](Self::SetStation).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    Greeting {
        #[serde(default)]
        message: String,
    },
    Welcome {
        #[serde(default)]
        message: String,
    },
    Heartbeat,
    HeartbeatAck,
    PlayPause,
    SetVolume {
        value: f64,
    },
    SetStation {
        /// Absent or `null` in malformed commands, which are ignored.
        #[serde(default)]
        station: Option<Station>,
    },

    /// Any message type this side does not know.
    #[serde(other, skip_serializing)]
    Unknown,
}

impl Message {
    /// Whether this is liveness traffic, handled by the session itself.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Self::Heartbeat | Self::HeartbeatAck)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Greeting { .. } => write!(f, "GREETING"),
            Self::Welcome { .. } => write!(f, "WELCOME"),
            Self::Heartbeat => write!(f, "HEARTBEAT"),
            Self::HeartbeatAck => write!(f, "HEARTBEAT_ACK"),
            Self::PlayPause => write!(f, "PLAY_PAUSE"),
            Self::SetVolume { value } => write!(f, "SET_VOLUME {value}"),
            Self::SetStation { station: Some(station) } => write!(f, "SET_STATION {station}"),
            Self::SetStation { station: None } => write!(f, "SET_STATION"),
            Self::Unknown => write!(f, "unknown message"),
        }
    }
}
