//! Peer-to-peer remote control for an internet radio player.
//!
//! A host page owns playback. It registers on a peer transport under a short
//! session token, and a phone opening the pairing URL becomes its remote:
//! it sends play/pause, volume and station commands over a single link. The
//! host probes that link with heartbeats, so a remote that vanished without
//! closing it is noticed within one probe interval plus one deadline.
//!
//! * [`role`] decides host or remote from the page URL.
//! * [`session`] runs one link for either role over a
//!   [`transport::Transport`], with [`liveness`] probing on the host.
//! * [`dispatch`] turns remote commands into [`player::PlayerState`] actions.
//! * [`engine`] keeps an audio [`engine::Backend`] in line with that state.
//! * [`host`] and [`remote`] tie it all into one loop per role.
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod host;
pub mod liveness;
pub mod player;
pub mod protocol;
pub mod remote;
pub mod role;
pub mod session;
pub mod station;
pub mod transport;
pub mod util;
