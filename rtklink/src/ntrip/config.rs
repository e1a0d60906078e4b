use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConnectionMode;
use crate::{
    encoder::GgaDefaults,
    error::{NtripError, Result},
};

const DEFAULT_CASTER_PORT: u16 = 2101;
const DEFAULT_GGA_INTERVAL_SECONDS: u64 = 10;

/// Where to fetch corrections from and how.
///
/// Field names follow the camelCase JSON used by the WebSocket bridge and
/// by stored settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    pub caster_host: String,
    pub caster_port: u16,
    /// Stream name, with or without a leading `/`
    pub mountpoint: String,
    /// Empty for casters that do not require authentication
    pub username: String,
    pub password: String,
    /// Report the receiver position to the caster
    pub send_gga: bool,
    pub connection_mode: ConnectionMode,
    /// Base URL of the HTTP relay used by [`ConnectionMode::Proxy`]
    pub proxy_url: Option<String>,
    /// Endpoint of the bridge used by [`ConnectionMode::WebSocket`]
    pub websocket_url: Option<String>,
    pub gga_update_interval_seconds: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            caster_host: String::new(),
            caster_port: DEFAULT_CASTER_PORT,
            mountpoint: String::new(),
            username: String::new(),
            password: String::new(),
            send_gga: true,
            connection_mode: ConnectionMode::Auto,
            proxy_url: None,
            websocket_url: None,
            gga_update_interval_seconds: DEFAULT_GGA_INTERVAL_SECONDS,
        }
    }
}

impl ConnectionConfig {
    pub fn new(
        caster_host: impl Into<String>,
        caster_port: u16,
        mountpoint: impl Into<String>,
    ) -> Self {
        Self {
            caster_host: caster_host.into(),
            caster_port,
            mountpoint: mountpoint.into(),
            ..Default::default()
        }
    }

    /// Checks made before any transport is attempted.
    pub fn validate(&self) -> Result<()> {
        if self.caster_host.trim().is_empty() {
            return Err(NtripError::Config("caster host is required".into()));
        }
        if self.mountpoint().is_empty() {
            return Err(NtripError::Config("mountpoint is required".into()));
        }
        if self.caster_port == 0 {
            return Err(NtripError::Config("caster port must not be 0".into()));
        }
        if self.gga_update_interval_seconds == 0 {
            return Err(NtripError::Config("GGA update interval must be at least 1 second".into()));
        }
        match self.connection_mode {
            ConnectionMode::Proxy if self.proxy_url.is_none() => Err(NtripError::Config(
                "proxy mode needs a proxy URL".into(),
            )),
            ConnectionMode::WebSocket if self.websocket_url.is_none() => Err(NtripError::Config(
                "websocket mode needs a WebSocket URL".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Mountpoint without surrounding whitespace or leading slash.
    pub fn mountpoint(&self) -> &str {
        self.mountpoint.trim().trim_start_matches('/')
    }

    pub fn caster_host(&self) -> &str {
        self.caster_host.trim()
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }

    pub fn gga_interval(&self) -> Duration {
        Duration::from_secs(self.gga_update_interval_seconds)
    }
}

/// Client behaviour fixed at construction.
///
/// Durations are given in milliseconds when loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Default `true`
    pub auto_reconnect: bool,
    /// Default `10`
    pub max_reconnect_attempts: u32,
    /// Default 1 s
    #[serde(with = "millis")]
    pub base_reconnect_delay: Duration,
    /// Default 30 s
    #[serde(with = "millis")]
    pub max_reconnect_delay: Duration,
    /// How long the WebSocket bridge may take to confirm the caster
    /// connection. Default 10 s
    #[serde(with = "millis")]
    pub status_timeout: Duration,
    /// TCP connect plus response headers. Default 10 s
    #[serde(with = "millis")]
    pub connect_timeout: Duration,
    /// A connected stream without any data for this long counts as lost.
    /// Default 60 s
    #[serde(with = "millis")]
    pub idle_timeout: Duration,
    /// Extra GGA reports after connecting, until corrections arrive.
    /// Default 1 s and 3 s
    #[serde(with = "millis_list")]
    pub gga_retry_delays: Vec<Duration>,
    /// Running in a secure context where plain HTTP to the caster counts as
    /// mixed content. Default `false`
    pub secure_origin: bool,
    pub user_agent: String,
    pub gga_defaults: GgaDefaults,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            max_reconnect_attempts: 10,
            base_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            status_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
            gga_retry_delays: vec![Duration::from_secs(1), Duration::from_secs(3)],
            secure_origin: false,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            gga_defaults: GgaDefaults::default(),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod millis_list {
    use std::time::Duration;

    use serde::{ser::SerializeSeq, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[Duration], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&u64::try_from(value.as_millis()).unwrap_or(u64::MAX))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Duration>, D::Error> {
        Vec::<u64>::deserialize(deserializer)
            .map(|v| v.into_iter().map(Duration::from_millis).collect())
    }
}
