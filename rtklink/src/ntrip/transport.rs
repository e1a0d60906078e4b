//! Transport selection and the link to the caster once connected.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    http::{HttpLink, HttpTarget},
    ClientOptions, ConnectionConfig, ConnectionMode,
};
use crate::error::{NtripError, Result};

#[cfg(feature = "websocket")]
use super::websocket::WsLink;

/// An open correction stream.
pub(crate) enum Link {
    #[cfg(feature = "websocket")]
    WebSocket(WsLink),
    /// Direct and proxy connections
    Http(HttpLink),
}

impl Link {
    pub(crate) async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self {
            #[cfg(feature = "websocket")]
            Self::WebSocket(link) => link.next_chunk().await,
            Self::Http(link) => link.next_chunk().await,
        }
    }

    /// Failures are only logged; position reports are best effort.
    pub(crate) async fn send_gga(&mut self, sentence: &str) {
        match self {
            #[cfg(feature = "websocket")]
            Self::WebSocket(link) => {
                if let Err(e) = link.send_gga(sentence).await {
                    warn!("GGA not sent over websocket: {e}");
                }
            },
            Self::Http(link) => link.send_gga(sentence),
        }
    }

    pub(crate) async fn close(self) {
        match self {
            #[cfg(feature = "websocket")]
            Self::WebSocket(link) => link.close().await,
            Self::Http(link) => drop(link),
        }
    }
}

/// Outcome of a successful connection attempt.
pub(crate) struct Established {
    pub(crate) link: Link,
    pub(crate) mode: ConnectionMode,
}

/// Transports to try, in order.
///
/// In a secure context plain HTTP to the caster would be blocked as mixed
/// content, so direct is replaced by websocket followed by the proxy.
pub(crate) fn plan(mode: ConnectionMode, secure_origin: bool) -> Vec<ConnectionMode> {
    match (mode, secure_origin) {
        (ConnectionMode::Auto, false) => vec![
            ConnectionMode::WebSocket,
            ConnectionMode::Direct,
            ConnectionMode::Proxy,
        ],
        (ConnectionMode::Auto | ConnectionMode::Direct, true) => {
            vec![ConnectionMode::WebSocket, ConnectionMode::Proxy]
        },
        (explicit, _) => vec![explicit],
    }
}

/// Try each planned transport until one connects.
pub(crate) async fn establish(
    config: ConnectionConfig,
    options: ClientOptions,
) -> Result<Established> {
    let plan = plan(config.connection_mode, options.secure_origin);
    if config.connection_mode == ConnectionMode::Direct && options.secure_origin {
        warn!("direct HTTP is mixed content in a secure context, using websocket then proxy");
    }

    let mut failures = Vec::with_capacity(plan.len());
    for mode in plan {
        debug!(%mode, "trying transport");
        match open(mode, &config, &options).await {
            Ok(link) => {
                info!(
                    %mode,
                    host = config.caster_host(),
                    mountpoint = config.mountpoint(),
                    "connected to caster"
                );
                return Ok(Established { link, mode });
            },
            Err(e) => {
                let e = match e {
                    e @ NtripError::Transport { .. } => e,
                    e => NtripError::transport(mode, e),
                };
                warn!("{e}");
                failures.push(e);
            },
        }
    }
    Err(match failures.len() {
        1 => failures.remove(0),
        _ => NtripError::AllTransportsFailed(failures),
    })
}

async fn open(
    mode: ConnectionMode,
    config: &ConnectionConfig,
    options: &ClientOptions,
) -> Result<Link> {
    match mode {
        ConnectionMode::WebSocket => open_websocket(config, options).await,
        ConnectionMode::Direct => {
            let target = HttpTarget::direct(config)?;
            open_http(&target, target.clone(), options).await
        },
        ConnectionMode::Proxy => {
            let proxy_url = config
                .proxy_url
                .as_deref()
                .ok_or_else(|| NtripError::Config("no proxy URL configured".into()))?;
            let target = HttpTarget::proxy(config, proxy_url)?;
            let gga_target = HttpTarget::proxy_gga(config, proxy_url)?;
            open_http(&target, gga_target, options).await
        },
        ConnectionMode::Auto => Err(NtripError::Config(
            "auto is not a transport".into(),
        )),
    }
}

async fn open_http(
    target: &HttpTarget,
    gga_target: HttpTarget,
    options: &ClientOptions,
) -> Result<Link> {
    let link = with_timeout(
        options.connect_timeout,
        HttpLink::open(target, gga_target, &options.user_agent),
    )
    .await?;
    Ok(Link::Http(link))
}

#[cfg(feature = "websocket")]
async fn open_websocket(config: &ConnectionConfig, options: &ClientOptions) -> Result<Link> {
    let url = config
        .websocket_url
        .as_deref()
        .ok_or_else(|| NtripError::Config("no WebSocket URL configured".into()))?;
    let link = WsLink::open(url, config, options.connect_timeout, options.status_timeout).await?;
    Ok(Link::WebSocket(link))
}

#[cfg(not(feature = "websocket"))]
async fn open_websocket(_config: &ConnectionConfig, _options: &ClientOptions) -> Result<Link> {
    Err(NtripError::transport(
        ConnectionMode::WebSocket,
        "built without websocket support",
    ))
}

async fn with_timeout<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| NtripError::Timeout(limit))?
}
