use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use rtklink::ntrip::{ClientOptions, ConnectionConfig, ConnectionMode};
use serialport::{FlowControl as SerialFlowControl, SerialPort};

pub fn command() -> Command {
    Command::new("rtklink")
        .version(clap::crate_version!())
        .about("Streams RTK corrections from an NTRIP caster to a serial GNSS receiver")
        .arg_required_else_help(true)
        .arg(
            Arg::new("port")
                .value_name("port")
                .short('p')
                .long("port")
                .required(true)
                .help("Serial port the receiver is attached to"),
        )
        .arg(
            Arg::new("baud")
                .value_name("baud")
                .short('s')
                .long("baud")
                .required(false)
                .default_value("115200")
                .value_parser(value_parser!(u32))
                .help("Baud rate of the serial port"),
        )
        .arg(
            Arg::new("stop-bits")
                .long("stop-bits")
                .help("Number of stop bits to use for open port")
                .required(false)
                .value_parser(["1", "2"])
                .default_value("1"),
        )
        .arg(
            Arg::new("data-bits")
                .long("data-bits")
                .help("Number of data bits to use for open port")
                .required(false)
                .value_parser(["7", "8"])
                .default_value("8"),
        )
        .arg(
            Arg::new("parity")
                .long("parity")
                .help("Parity to use for open port")
                .required(false)
                .value_parser(["even", "odd"]),
        )
        .arg(
            Arg::new("config")
                .value_name("file")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("JSON connection settings; the caster flags below override its fields"),
        )
        .arg(
            Arg::new("host")
                .value_name("host")
                .long("host")
                .help("Caster host name"),
        )
        .arg(
            Arg::new("caster-port")
                .value_name("port")
                .long("caster-port")
                .value_parser(value_parser!(u16))
                .help("Caster port [default: 2101]"),
        )
        .arg(
            Arg::new("mountpoint")
                .value_name("mountpoint")
                .short('m')
                .long("mountpoint")
                .help("Stream to subscribe to"),
        )
        .arg(Arg::new("user").value_name("user").long("user").help("Caster user name"))
        .arg(
            Arg::new("password")
                .value_name("password")
                .long("password")
                .env("RTKLINK_PASSWORD")
                .hide_env_values(true)
                .help("Caster password"),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .value_parser(["auto", "direct", "proxy", "websocket"])
                .help("Transport used to reach the caster [default: auto]"),
        )
        .arg(
            Arg::new("proxy-url")
                .value_name("url")
                .long("proxy-url")
                .help("HTTP relay used by the proxy transport"),
        )
        .arg(
            Arg::new("ws-url")
                .value_name("url")
                .long("ws-url")
                .help("WebSocket bridge used by the websocket transport"),
        )
        .arg(
            Arg::new("gga-interval")
                .value_name("seconds")
                .long("gga-interval")
                .value_parser(value_parser!(u64).range(1..))
                .help("Seconds between position reports [default: 10]"),
        )
        .arg(
            Arg::new("no-gga")
                .long("no-gga")
                .action(ArgAction::SetTrue)
                .help("Do not report the receiver position to the caster"),
        )
        .arg(
            Arg::new("options")
                .value_name("file")
                .long("options")
                .value_parser(value_parser!(PathBuf))
                .help("JSON client options (reconnection, timeouts in milliseconds, GGA defaults)"),
        )
        .arg(
            Arg::new("stats-interval")
                .value_name("seconds")
                .long("stats-interval")
                .default_value("30")
                .value_parser(value_parser!(u64).range(1..))
                .help("Seconds between correction statistics log lines"),
        )
        .arg(
            Arg::new("log-file")
                .value_name("file")
                .long("log-file")
                .value_parser(value_parser!(PathBuf))
                .help("Also write logs to this file, without colors"),
        )
}

#[derive(Debug)]
pub struct SerialSettings {
    pub port: String,
    pub baud: u32,
    pub stop_bits: serialport::StopBits,
    pub data_bits: serialport::DataBits,
    pub parity: serialport::Parity,
}

#[derive(Debug)]
pub struct Settings {
    pub serial: SerialSettings,
    pub connection: ConnectionConfig,
    pub options: ClientOptions,
    pub stats_interval: Duration,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let options = match matches.get_one::<PathBuf>("options") {
            Some(path) => read_json(path)?,
            None => ClientOptions::default(),
        };
        let stats_interval = matches.get_one::<u64>("stats-interval").copied().unwrap_or(30);
        Ok(Self {
            serial: serial_settings(matches)?,
            connection: connection_config(matches)?,
            options,
            stats_interval: Duration::from_secs(stats_interval),
            log_file: matches.get_one::<PathBuf>("log-file").cloned(),
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn serial_settings(matches: &ArgMatches) -> Result<SerialSettings> {
    let port = matches
        .get_one::<String>("port")
        .context("Expected required 'port' cli argument")?
        .clone();
    let baud = matches.get_one::<u32>("baud").copied().unwrap_or(115200);
    let stop_bits = match matches.get_one::<String>("stop-bits").map(|s| s.as_str()) {
        Some("2") => serialport::StopBits::Two,
        _ => serialport::StopBits::One,
    };
    let data_bits = match matches.get_one::<String>("data-bits").map(|s| s.as_str()) {
        Some("7") => serialport::DataBits::Seven,
        _ => serialport::DataBits::Eight,
    };
    let parity = match matches.get_one::<String>("parity").map(|s| s.as_str()) {
        Some("odd") => serialport::Parity::Odd,
        Some("even") => serialport::Parity::Even,
        _ => serialport::Parity::None,
    };
    Ok(SerialSettings {
        port,
        baud,
        stop_bits,
        data_bits,
        parity,
    })
}

fn connection_config(matches: &ArgMatches) -> Result<ConnectionConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => read_json(path)?,
        None => ConnectionConfig::default(),
    };
    let text = |name: &str| matches.get_one::<String>(name).cloned();

    if let Some(host) = text("host") {
        config.caster_host = host;
    }
    if let Some(port) = matches.get_one::<u16>("caster-port") {
        config.caster_port = *port;
    }
    if let Some(mountpoint) = text("mountpoint") {
        config.mountpoint = mountpoint;
    }
    if let Some(user) = text("user") {
        config.username = user;
    }
    if let Some(password) = text("password") {
        config.password = password;
    }
    if let Some(mode) = matches.get_one::<String>("mode") {
        config.connection_mode = match mode.as_str() {
            "direct" => ConnectionMode::Direct,
            "proxy" => ConnectionMode::Proxy,
            "websocket" => ConnectionMode::WebSocket,
            _ => ConnectionMode::Auto,
        };
    }
    if let Some(url) = text("proxy-url") {
        config.proxy_url = Some(url);
    }
    if let Some(url) = text("ws-url") {
        config.websocket_url = Some(url);
    }
    if let Some(seconds) = matches.get_one::<u64>("gga-interval") {
        config.gga_update_interval_seconds = *seconds;
    }
    if matches.get_flag("no-gga") {
        config.send_gga = false;
    }

    if config.caster_host.trim().is_empty() || config.mountpoint.trim().is_empty() {
        bail!(
            "A caster host and mountpoint are required, pass --host and --mountpoint or --config"
        );
    }
    Ok(config)
}

pub fn open_serial(settings: &SerialSettings) -> Result<Box<dyn SerialPort>> {
    let builder = serialport::new(&settings.port, settings.baud)
        .stop_bits(settings.stop_bits)
        .data_bits(settings.data_bits)
        .timeout(Duration::from_millis(10))
        .parity(settings.parity)
        .flow_control(SerialFlowControl::None);

    tracing::debug!(?builder, "opening serial port");
    builder
        .open()
        .with_context(|| format!("Failed to open port: {}", settings.port))
}
