//! Runtime configuration.
//!
//! [`Config::default`] carries the timings that the peer protocol depends on.
//! A TOML file can override any of them:
//!
//! ```toml
//! setup_delay_ms = 100
//! heartbeat_interval_ms = 2000
//! heartbeat_timeout_ms = 2000
//! greeting = "Mobile Remote Connected!"
//! welcome = "Connected to PixelWave Radio"
//! ```

use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Settings shared by the host and remote roles.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Config {
    /// Delay before the transport endpoint is created.
    ///
    /// Rapid setup and teardown cycles are absorbed by this delay: an endpoint
    /// is never created for a session that was torn down within it.
    pub setup_delay: Duration,

    /// Period between liveness probes on an open link.
    pub heartbeat_interval: Duration,

    /// Time a remote has to acknowledge a probe before the link is
    /// force-closed.
    pub heartbeat_timeout: Duration,

    /// Text of the `GREETING` a remote sends once its link opens.
    pub greeting: String,

    /// Text of the `WELCOME` a host sends once it accepts a link.
    pub welcome: String,
}

impl Config {
    /// Upper bound on the configuration file size.
    const MAX_FILE_SIZE: u64 = 4096;

    /// Default delay before the transport endpoint is created.
    pub const SETUP_DELAY: Duration = Duration::from_millis(100);

    /// Default liveness probe period.
    pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(2000);

    /// Default liveness probe deadline.
    pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_millis(2000);

    /// Loads the defaults and overlays the settings found in a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is larger than a few
    /// kilobytes, is not valid TOML, or sets a zero heartbeat interval or
    /// timeout.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Prevent out-of-memory conditions: a configuration file is small.
        let file_size = fs::metadata(path)?.len();
        if file_size > Self::MAX_FILE_SIZE {
            return Err(Error::resource_exhausted(format!(
                "{} is too large ({file_size} bytes)",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        Self::default().overlay(&contents)
    }

    /// Overlays the settings in TOML `contents` on top of `self`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on malformed TOML or zero heartbeat timings.
    pub fn overlay(mut self, contents: &str) -> Result<Self> {
        let file: File = toml::from_str(contents)?;

        if let Some(ms) = file.setup_delay_ms {
            self.setup_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.heartbeat_interval_ms {
            if ms == 0 {
                return Err(Error::invalid_argument("heartbeat interval must be non-zero"));
            }
            self.heartbeat_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = file.heartbeat_timeout_ms {
            if ms == 0 {
                return Err(Error::invalid_argument("heartbeat timeout must be non-zero"));
            }
            self.heartbeat_timeout = Duration::from_millis(ms);
        }
        if let Some(greeting) = file.greeting {
            self.greeting = greeting;
        }
        if let Some(welcome) = file.welcome {
            self.welcome = welcome;
        }

        debug!(
            "heartbeat every {:?} with a {:?} deadline",
            self.heartbeat_interval, self.heartbeat_timeout
        );
        Ok(self)
    }

    /// Worst-case time for a host to notice a silently vanished remote.
    #[must_use]
    pub fn detection_bound(&self) -> Duration {
        self.heartbeat_interval + self.heartbeat_timeout
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            setup_delay: Self::SETUP_DELAY,
            heartbeat_interval: Self::HEARTBEAT_INTERVAL,
            heartbeat_timeout: Self::HEARTBEAT_TIMEOUT,

            greeting: "Mobile Remote Connected!".to_owned(),
            welcome: "Connected to PixelWave Radio".to_owned(),
        }
    }
}

/// On-disk representation; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct File {
    setup_delay_ms: Option<u64>,
    heartbeat_interval_ms: Option<u64>,
    heartbeat_timeout_ms: Option<u64>,
    greeting: Option<String>,
    welcome: Option<String>,
}
