//! Internet radio stations.
//!
//! Stations travel over the wire inside `SET_STATION` messages and are loaded
//! from a static JSON catalog. Only `url` and `stationuuid` are required;
//! identity is decided by `stationuuid` alone. Directory records often carry
//! both the listed `url` (possibly a playlist) and the `url_resolved` stream
//! behind it; playback uses the latter when present.

use std::{fmt, fs, path::Path};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Identity of a station.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(String);

impl StationId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StationId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An audio stream to tune into.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Station {
    /// Listed location.
    pub url: Url,

    /// Stream behind `url`, when the directory resolved it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_resolved: Option<Url>,

    /// Identity used for equality and selection.
    pub stationuuid: StationId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(
        default,
        rename = "coverUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub cover_url: Option<String>,
}

impl Station {
    /// Creates a station with only the required fields set.
    #[must_use]
    pub fn new(stationuuid: &str, url: Url) -> Self {
        Self {
            url,
            url_resolved: None,
            stationuuid: stationuuid.into(),
            name: None,
            country: None,
            favicon: None,
            artist: None,
            cover_url: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &StationId {
        &self.stationuuid
    }

    /// Location to play: `url_resolved` if known, `url` otherwise.
    #[must_use]
    pub fn stream_url(&self) -> &Url {
        self.url_resolved.as_ref().unwrap_or(&self.url)
    }
}

impl PartialEq for Station {
    fn eq(&self, other: &Self) -> bool {
        self.stationuuid == other.stationuuid
    }
}

impl Eq for Station {}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({})", self.stationuuid),
            None => write!(f, "{}", self.stationuuid),
        }
    }
}

/// Upper bound on catalog size to keep a bad path from eating memory.
const MAX_CATALOG_SIZE: u64 = 4 * 1024 * 1024;

/// Loads a station catalog: a JSON array of stations.
///
/// # Errors
///
/// Returns an error if the file cannot be read, exceeds a few megabytes, or is
/// not a JSON array of stations.
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<Vec<Station>> {
    let path = path.as_ref();
    let file_size = fs::metadata(path)?.len();
    if file_size > MAX_CATALOG_SIZE {
        return Err(Error::resource_exhausted(format!(
            "{} is too large ({file_size} bytes)",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path)?;
    let stations: Vec<Station> = serde_json::from_str(&contents)?;
    debug!("loaded {} stations from {}", stations.len(), path.display());

    Ok(stations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_stationuuid() {
        let a = Station::new("42", Url::parse("https://a.example/stream").unwrap());
        let mut b = Station::new("42", Url::parse("https://b.example/other").unwrap());
        b.name = Some("Other name".to_owned());
        assert_eq!(a, b);

        let c = Station::new("43", Url::parse("https://a.example/stream").unwrap());
        assert_ne!(a, c);
    }

    #[test]
    fn directory_record_with_both_urls() {
        let station: Station = serde_json::from_str(
            r#"{"url":"https://x/listen.pls","url_resolved":"https://x/stream","stationuuid":"7","name":"Seven","coverUrl":"https://x/c.png"}"#,
        )
        .unwrap();
        assert_eq!(station.url.as_str(), "https://x/listen.pls");
        assert_eq!(station.stream_url().as_str(), "https://x/stream");
        assert_eq!(station.name.as_deref(), Some("Seven"));
        assert_eq!(station.cover_url.as_deref(), Some("https://x/c.png"));
    }

    #[test]
    fn stream_url_falls_back_to_url() {
        let station: Station =
            serde_json::from_str(r#"{"url":"https://x/stream","stationuuid":"7"}"#).unwrap();
        assert_eq!(station.url_resolved, None);
        assert_eq!(station.stream_url().as_str(), "https://x/stream");
    }

    #[test]
    fn stationuuid_and_url_are_required() {
        assert!(serde_json::from_str::<Station>(r#"{"url":"https://x/stream"}"#).is_err());
        assert!(serde_json::from_str::<Station>(
            r#"{"url_resolved":"https://x/stream","stationuuid":"7"}"#
        )
        .is_err());
    }

    #[test]
    fn bundled_catalog_loads() {
        let catalog = load_catalog(concat!(env!("CARGO_MANIFEST_DIR"), "/stations.json")).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog[0].stream_url().as_str(),
            "https://ice1.somafm.com/groovesalad-128-mp3"
        );
    }
}
