//! Host or remote, decided from the page URL.
//!
//! A page URL carrying `remote=<peerId>` is a remote aimed at that host.
//! Anything else is a host. A host without a `session` parameter gets a fresh
//! token written into its URL in place, so that reloading the same URL keeps
//! the same host identity.

use std::fmt;

use url::Url;

use crate::transport::PeerId;

/// Query parameter that carries the host's session token.
pub const SESSION_PARAM: &str = "session";

/// Query parameter that marks a remote and names its host.
pub const REMOTE_PARAM: &str = "remote";

/// Short token identifying a host across reloads.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct SessionId(String);

impl SessionId {
    /// Token length.
    pub const LENGTH: usize = 5;

    const ALPHABET: &'static [u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

    /// Generates a random uppercase alphanumeric token.
    #[must_use]
    pub fn generate() -> Self {
        let token = (0..Self::LENGTH)
            .map(|_| char::from(Self::ALPHABET[fastrand::usize(..Self::ALPHABET.len())]))
            .collect();
        Self(token)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A host registers on the transport under its session token.
    #[must_use]
    pub fn peer_id(&self) -> PeerId {
        PeerId::from(self.0.as_str())
    }
}

impl From<&str> for SessionId {
    fn from(token: &str) -> Self {
        Self(token.to_owned())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    /// Owns playback. Registers on the transport under its session token.
    Host { session: SessionId },

    /// Sends commands to the host registered as `host`.
    Remote { host: PeerId },
}

impl Role {
    #[must_use]
    pub fn is_host(&self) -> bool {
        matches!(self, Self::Host { .. })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host { session } => write!(f, "host of session {session}"),
            Self::Remote { host } => write!(f, "remote of host {host}"),
        }
    }
}

/// Resolves the role of the page at `url`.
///
/// Empty parameters count as absent. For a host without a session token one
/// is generated and stored into `url`, replacing an empty `session`. Other
/// query parameters are preserved.
pub fn resolve(url: &mut Url) -> Role {
    let mut session = None;
    let mut remote = None;
    for (key, value) in url.query_pairs() {
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            SESSION_PARAM if session.is_none() => session = Some(value.into_owned()),
            REMOTE_PARAM if remote.is_none() => remote = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(host) = remote {
        return Role::Remote {
            host: PeerId::from(host.as_str()),
        };
    }

    let session = match session {
        Some(token) => SessionId(token),
        None => {
            let session = SessionId::generate();
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(key, _)| key != SESSION_PARAM)
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect();
            url.query_pairs_mut()
                .clear()
                .extend_pairs(kept)
                .append_pair(SESSION_PARAM, session.as_str());
            debug!("generated session {session}; page url is now {url}");
            session
        }
    };

    Role::Host { session }
}

/// URL a remote opens to pair with the host registered as `host`, e.g. the
/// payload of a pairing QR code.
#[must_use]
pub fn pairing_url(page: &Url, host: &PeerId) -> Url {
    let mut url = page.clone();
    url.set_query(None);
    url.query_pairs_mut().append_pair(REMOTE_PARAM, host.as_str());
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_without_session_gets_a_persistent_token() {
        let mut url = Url::parse("https://radio.example/?theme=dark").unwrap();
        let Role::Host { session } = resolve(&mut url) else {
            panic!("expected host role");
        };

        assert_eq!(session.as_str().len(), SessionId::LENGTH);
        assert!(session
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert!(url.query().unwrap().contains("theme=dark"));

        // Reloading the rewritten URL keeps the token and the URL.
        let reloaded = url.clone();
        let mut again = url.clone();
        assert_eq!(resolve(&mut again), Role::Host { session });
        assert_eq!(again, reloaded);
    }

    #[test]
    fn remote_param_selects_remote_role() {
        let mut url = Url::parse("https://radio.example/?remote=AB12C").unwrap();
        let before = url.clone();
        assert_eq!(
            resolve(&mut url),
            Role::Remote {
                host: PeerId::from("AB12C")
            }
        );
        assert_eq!(url, before);
    }

    #[test]
    fn empty_session_is_replaced() {
        let mut url = Url::parse("https://radio.example/?session=&theme=dark").unwrap();
        let Role::Host { session } = resolve(&mut url) else {
            panic!("expected host role");
        };

        assert_eq!(session.as_str().len(), SessionId::LENGTH);
        let sessions: Vec<String> = url
            .query_pairs()
            .filter(|(key, _)| key == SESSION_PARAM)
            .map(|(_, value)| value.into_owned())
            .collect();
        assert_eq!(sessions, [session.as_str()]);
        assert!(url.query().unwrap().contains("theme=dark"));
    }

    #[test]
    fn empty_remote_resolves_to_host() {
        let mut url = Url::parse("https://radio.example/?remote=").unwrap();
        let Role::Host { session } = resolve(&mut url) else {
            panic!("expected host role");
        };

        assert_eq!(session.as_str().len(), SessionId::LENGTH);
        let mut reloaded = url.clone();
        assert_eq!(resolve(&mut reloaded), Role::Host { session });
    }

    #[test]
    fn pairing_url_targets_host_peer() {
        let page = Url::parse("https://radio.example/?session=AB12C").unwrap();
        let pairing = pairing_url(&page, &PeerId::from("AB12C"));
        assert_eq!(pairing.as_str(), "https://radio.example/?remote=AB12C");

        let mut pairing = pairing;
        assert!(!resolve(&mut pairing).is_host());
    }
}
