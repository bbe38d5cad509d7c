use std::{path::PathBuf, process};

use clap::{command, Parser, ValueHint};
use log::{debug, error, info, warn, LevelFilter};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use url::Url;

use pixelwave::{
    backend::Simulated,
    config::Config,
    dispatch::Intent,
    error::{Error, ErrorKind, Result},
    events::Event,
    host::Host,
    remote::Remote,
    role::{self, Role},
    station::{self, Station},
    transport::{
        loopback::{Hub, LoopbackTransport},
        PeerId,
    },
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when built in release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Page URL of the host
    ///
    /// A session token is generated and appended when the URL has none.
    #[arg(short, long, value_hint = ValueHint::Url, default_value_t = String::from("http://localhost:5173/"))]
    url: String,

    /// Station catalog
    ///
    /// A JSON array of stations with at least `stationuuid` and `url`.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("stations.json"))]
    stations: String,

    /// Configuration file
    ///
    /// TOML file overriding the setup delay, heartbeat timings and
    /// greeting texts.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, env = "PIXELWAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            // Quiet and verbose are mutually exclusive, and `verbose` is 0 by
            // default. So this arm means: quiet mode.
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Loads the station catalog, hinting at the option when it is missing.
fn load_stations(path: &str) -> Result<Vec<Station>> {
    let stations = station::load_catalog(path);

    if let Err(ref e) = stations {
        if e.kind == ErrorKind::NotFound {
            info!("pass a station catalog with --stations; {path} does not exist");
        }
    }

    stations
}

/// Console command, one per input line.
#[derive(Clone, Debug, PartialEq)]
enum Command {
    Toggle,
    Volume(f64),
    Station(String),
    Stations,
    Status,
    Vanish,
    Reload,
    Quit,
}

impl std::str::FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let command = match (words.next(), words.next()) {
            (Some("toggle"), None) => Self::Toggle,
            (Some("volume"), Some(value)) => Self::Volume(
                value
                    .parse()
                    .map_err(|e| Error::invalid_argument(format!("volume {value}: {e}")))?,
            ),
            (Some("station"), Some(station)) => Self::Station(station.to_owned()),
            (Some("stations"), None) => Self::Stations,
            (Some("status"), None) => Self::Status,
            (Some("vanish"), None) => Self::Vanish,
            (Some("reload"), None) => Self::Reload,
            (Some("quit" | "exit"), None) => Self::Quit,
            _ => {
                return Err(Error::invalid_argument(format!(
                    "unknown command \"{line}\"; try toggle, volume <0..1>, station <uuid|index>, stations, status, vanish, reload or quit"
                )))
            }
        };

        Ok(command)
    }
}

/// Looks a station up by `stationuuid` or by its index in the catalog.
fn find_station<'a>(catalog: &'a [Station], key: &str) -> Option<&'a Station> {
    catalog
        .iter()
        .find(|station| station.id().as_str() == key)
        .or_else(|| key.parse::<usize>().ok().and_then(|i| catalog.get(i)))
}

/// Creates a remote that dials `host` from scratch.
fn pair_remote(hub: &Hub, host: &PeerId, config: &Config) -> Remote<LoopbackTransport> {
    let (transport, events) = hub.endpoint();
    Remote::new(host.clone(), config.clone(), transport, events)
}

/// Main application loop.
///
/// Runs a host and a paired remote over an in-process transport. Commands on
/// standard input act on the remote, as a phone would.
///
/// # Errors
///
/// Returns an error when the configuration or the station catalog cannot be
/// loaded, or when the URL is a pairing URL.
async fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let catalog = load_stations(&args.stations)?;
    info!("{} stations in catalog", catalog.len());

    let mut page = Url::parse(&args.url)?;
    let session = match role::resolve(&mut page) {
        Role::Host { session } => session,
        Role::Remote { host } => {
            return Err(Error::invalid_argument(format!(
                "{page} pairs a remote with host {host}; pass the host page URL instead"
            )))
        }
    };
    let host_id = session.peer_id();
    info!("host page: {page}");
    info!("pairing url: {}", role::pairing_url(&page, &host_id));

    let hub = Hub::new();
    let (transport, events) = hub.endpoint();
    let mut host = Host::new(session, config.clone(), transport, events, Simulated::new());
    let mut remote = Some(pair_remote(&hub, &host_id, &config));

    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        tokio::select! {
            // Prioritize shutdown signals.
            biased;

            _ = tokio::signal::ctrl_c() => {
                info!("shutting down gracefully");
                break;
            }

            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("end of input, shutting down");
                        break;
                    }
                    Err(e) => {
                        error!("error reading input: {e}");
                        break;
                    }
                };

                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let command = match line.parse::<Command>() {
                    Ok(command) => command,
                    Err(e) => {
                        warn!("{e}");
                        continue;
                    }
                };

                let intent = match command {
                    Command::Quit => break,
                    Command::Toggle => Intent::TogglePlayPause,
                    Command::Volume(value) => Intent::SetVolume(value),
                    Command::Station(key) => match find_station(&catalog, &key) {
                        Some(station) => Intent::SelectStation(station.clone()),
                        None => {
                            warn!("no station {key} in catalog");
                            continue;
                        }
                    },
                    Command::Stations => {
                        for (i, station) in catalog.iter().enumerate() {
                            info!("{i}: {station}");
                        }
                        continue;
                    }
                    Command::Status => {
                        let state = host.state();
                        let station = state
                            .station()
                            .map_or_else(|| "no station".to_owned(), ToString::to_string);
                        let link = if host.session().connection().is_some() {
                            "remote connected"
                        } else {
                            "no remote"
                        };
                        info!("{station}; {}; volume {}; {link}", state.status(), state.volume());
                        continue;
                    }
                    Command::Vanish => {
                        match remote.as_mut() {
                            Some(remote) => {
                                info!("remote vanishes without closing its link");
                                remote.session_mut().transport_mut().vanish();
                            }
                            None => warn!("no remote to vanish"),
                        }
                        continue;
                    }
                    Command::Reload => {
                        info!("reloading remote");
                        drop(remote.take());
                        remote = Some(pair_remote(&hub, &host_id, &config));
                        continue;
                    }
                };

                match remote.as_mut() {
                    Some(remote) if remote.is_connected() => {
                        if let Err(e) = remote.request(intent) {
                            error!("error sending command: {e}");
                        }
                    }
                    _ => warn!("remote is not connected; command dropped"),
                }
            }

            event = host.step() => {
                match event {
                    Some(Event::Ready(peer_id)) => info!("host ready as {peer_id}"),
                    Some(Event::Connected) => info!("remote connected"),
                    Some(Event::Disconnected) => info!("remote disconnected"),
                    Some(Event::Message(message)) => debug!("host ignored {message}"),
                    Some(Event::Status(status)) => debug!("host status is now {status}"),
                    None => break,
                }
            }

            event = async { remote.as_mut()?.recv().await }, if remote.is_some() => {
                match event {
                    Some(Event::Ready(peer_id)) => debug!("remote ready as {peer_id}"),
                    Some(Event::Connected) => info!("remote linked to host {host_id}"),
                    Some(Event::Disconnected) => info!("remote lost its link"),
                    Some(_) => {}
                    None => {
                        debug!("remote session ended");
                        remote = None;
                    }
                }
            }
        }
    }

    if let Some(mut remote) = remote {
        remote.teardown();
    }
    host.teardown();

    Ok(())
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and starts the main application loop.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
