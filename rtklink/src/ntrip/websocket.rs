//! WebSocket bridge transport.
//!
//! The bridge speaks JSON control frames in both directions and relays the
//! caster's binary stream as-is. Any frame that is not a known control
//! message is correction data.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use super::{ConnectionConfig, ConnectionMode};
use crate::error::{NtripError, Result};

#[derive(Debug, Serialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub(crate) enum ControlCommand<'a> {
    Connect { config: CasterConfig<'a> },
    Gga { data: &'a str },
    Disconnect,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CasterConfig<'a> {
    caster_host: &'a str,
    caster_port: u16,
    mountpoint: &'a str,
    username: &'a str,
    password: &'a str,
}

impl<'a> From<&'a ConnectionConfig> for CasterConfig<'a> {
    fn from(config: &'a ConnectionConfig) -> Self {
        Self {
            caster_host: config.caster_host(),
            caster_port: config.caster_port,
            mountpoint: config.mountpoint(),
            username: &config.username,
            password: &config.password,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum ControlMessage {
    Status {
        connected: bool,
        #[serde(default)]
        message: Option<String>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
    Info {
        #[serde(default)]
        message: String,
    },
    Ping,
}

impl ControlMessage {
    /// `None` for anything that is not a control frame.
    pub(crate) fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub(crate) struct WsLink {
    socket: Socket,
}

impl WsLink {
    /// Open the socket, ask the bridge to connect to the caster and wait for
    /// its status reply.
    pub(crate) async fn open(
        url: &str,
        config: &ConnectionConfig,
        connect_timeout: Duration,
        status_timeout: Duration,
    ) -> Result<Self> {
        let (socket, _) =
            tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url))
                .await
                .map_err(|_| NtripError::Timeout(connect_timeout))??;
        let mut link = Self { socket };
        link.send_command(&ControlCommand::Connect {
            config: config.into(),
        })
        .await?;
        tokio::time::timeout(status_timeout, link.wait_for_status())
            .await
            .map_err(|_| NtripError::Timeout(status_timeout))??;
        Ok(link)
    }

    async fn wait_for_status(&mut self) -> Result<()> {
        loop {
            let message = match self.socket.next().await {
                Some(message) => message?,
                None => return Err(NtripError::StreamEnded),
            };
            match message {
                Message::Text(text) => match ControlMessage::parse(&text) {
                    Some(ControlMessage::Status {
                        connected: true, ..
                    }) => return Ok(()),
                    Some(ControlMessage::Status { message, .. }) => {
                        return Err(NtripError::transport(
                            ConnectionMode::WebSocket,
                            message.unwrap_or_else(|| "bridge could not reach the caster".into()),
                        ))
                    },
                    Some(ControlMessage::Error { message }) => {
                        return Err(NtripError::transport(ConnectionMode::WebSocket, message))
                    },
                    other => trace!(?other, "frame before status"),
                },
                Message::Close(_) => return Err(NtripError::StreamEnded),
                other => trace!(len = other.len(), "frame before status"),
            }
        }
    }

    async fn send_command(&mut self, command: &ControlCommand<'_>) -> Result<()> {
        let text = serde_json::to_string(command)?;
        self.socket.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Next block of correction data, `None` once the bridge closed.
    pub(crate) async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        while let Some(message) = self.socket.next().await {
            match message? {
                Message::Binary(data) => return Ok(Some(data)),
                Message::Text(text) => match ControlMessage::parse(&text) {
                    Some(ControlMessage::Status {
                        connected: false,
                        message,
                    }) => {
                        return Err(NtripError::transport(
                            ConnectionMode::WebSocket,
                            message.unwrap_or_else(|| "caster connection lost".into()),
                        ))
                    },
                    Some(ControlMessage::Error { message }) => warn!("bridge error: {message}"),
                    Some(ControlMessage::Info { message }) => info!("bridge: {message}"),
                    Some(ControlMessage::Status { .. } | ControlMessage::Ping) => {
                        trace!("bridge control frame")
                    },
                    None => return Ok(Some(text.into_bytes())),
                },
                Message::Close(frame) => {
                    debug!(?frame, "bridge closed the socket");
                    return Ok(None);
                },
                // ping replies are queued by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {},
            }
        }
        Ok(None)
    }

    pub(crate) async fn send_gga(&mut self, sentence: &str) -> Result<()> {
        self.send_command(&ControlCommand::Gga { data: sentence }).await
    }

    /// Tell the bridge to drop the caster connection, then close the socket.
    pub(crate) async fn close(mut self) {
        if let Err(e) = self.send_command(&ControlCommand::Disconnect).await {
            debug!("disconnect command not delivered: {e}");
        }
        if let Err(e) = self.socket.close(None).await {
            debug!("closing socket: {e}");
        }
    }
}
