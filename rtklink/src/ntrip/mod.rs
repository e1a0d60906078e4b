//! NTRIP correction client.
//!
//! [`NtripClient`] negotiates a connection to a caster, relays the RTCM3
//! stream to a [`DeviceSink`] and keeps the caster supplied with GGA position
//! reports. Connection lifecycle and correction traffic are published on the
//! channels in [`ClientEvents`](crate::events::ClientEvents).

use core::fmt;

use serde::{Deserialize, Serialize};

mod backoff;
mod client;
mod config;
mod http;
mod stats;
mod transport;
#[cfg(feature = "websocket")]
mod websocket;

pub use backoff::{ReconnectPolicy, ReconnectState};
pub use client::{DeviceSink, NtripClient};
pub use config::{ClientOptions, ConnectionConfig};
pub use stats::RtcmStats;

/// Transport used to reach the caster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// WebSocket, then direct HTTP, then the HTTP proxy
    #[default]
    Auto,
    /// Plain HTTP straight to the caster
    Direct,
    /// HTTP through a relay that forwards to the caster
    Proxy,
    /// JSON-controlled WebSocket bridge
    #[serde(rename = "websocket")]
    WebSocket,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Direct => "direct",
            Self::Proxy => "proxy",
            Self::WebSocket => "websocket",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
}

/// Connection state together with the transport in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ClientState {
    pub connection: ConnectionState,
    /// Requested mode while connecting, the transport that won once connected
    pub mode: Option<ConnectionMode>,
}

impl ClientState {
    pub fn is_idle(&self) -> bool {
        self.connection == ConnectionState::Idle
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }
}
