#![cfg(feature = "websocket")]

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rtklink::{
    constants::NEUTRAL_GGA,
    ntrip::{ClientOptions, ConnectionConfig, ConnectionMode, NtripClient},
    NtripError,
};
use serde_json::{json, Value};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::mpsc,
};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

const FRAME_1005: [u8; 9] = [0xd3, 0x00, 0x03, 0x3e, 0xd0, 0x00, 0x7a, 0x79, 0xfe];

type Bridge = WebSocketStream<TcpStream>;

async fn within<T>(fut: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}

async fn next_command(bridge: &mut Bridge) -> Value {
    loop {
        match bridge.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(_)) => {},
            other => panic!("unexpected {other:?}"),
        }
    }
}

/// Accept the socket and read the connect command.
async fn accept_bridge(listener: &TcpListener) -> (Bridge, Value) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut bridge = accept_async(stream).await.unwrap();
    let command = next_command(&mut bridge).await;
    (bridge, command)
}

fn discard(_: &[u8]) -> std::io::Result<()> {
    Ok(())
}

fn ws_config(port: u16) -> ConnectionConfig {
    ConnectionConfig {
        username: "user".into(),
        password: "pass".into(),
        connection_mode: ConnectionMode::WebSocket,
        websocket_url: Some(format!("ws://127.0.0.1:{port}")),
        ..ConnectionConfig::new("caster.example", 2101, "/MOUNT")
    }
}

#[tokio::test]
async fn test_bridge_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, mut forwarded) = mpsc::unbounded_channel();
    let client = NtripClient::spawn(
        ClientOptions::default(),
        move |data: &[u8]| -> std::io::Result<()> {
            let _ = tx.send(data.to_vec());
            Ok(())
        },
    );

    let bridge = async {
        let (mut bridge, command) = accept_bridge(&listener).await;
        assert_eq!(
            command,
            json!({
                "command": "connect",
                "config": {
                    "casterHost": "caster.example",
                    "casterPort": 2101,
                    "mountpoint": "MOUNT",
                    "username": "user",
                    "password": "pass",
                }
            })
        );
        bridge
            .send(Message::Text(r#"{"type":"status","connected":true}"#.into()))
            .await
            .unwrap();
        bridge
    };
    let (mode, mut bridge) =
        within(async { tokio::join!(client.connect(ws_config(port)), bridge) }).await;
    assert_eq!(mode.unwrap(), ConnectionMode::WebSocket);

    let gga = within(next_command(&mut bridge)).await;
    assert_eq!(gga["command"], "gga");
    assert_eq!(gga["data"], NEUTRAL_GGA);

    bridge
        .send(Message::Text(r#"{"type":"info","message":"caster reached"}"#.into()))
        .await
        .unwrap();
    bridge.send(Message::Binary(FRAME_1005.to_vec())).await.unwrap();
    assert_eq!(within(forwarded.recv()).await.unwrap(), FRAME_1005);

    client.disconnect().await.unwrap();
    assert_eq!(
        within(next_command(&mut bridge)).await,
        json!({ "command": "disconnect" })
    );
}

#[tokio::test]
async fn test_bridge_refusal_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let client = NtripClient::spawn(ClientOptions::default(), discard);

    let bridge = async {
        let (mut bridge, _) = accept_bridge(&listener).await;
        bridge
            .send(Message::Text(
                r#"{"type":"status","connected":false,"message":"401 Unauthorized"}"#.into(),
            ))
            .await
            .unwrap();
        bridge
    };
    let (result, _bridge) =
        within(async { tokio::join!(client.connect(ws_config(port)), bridge) }).await;
    match result {
        Err(NtripError::Transport { mode, reason }) => {
            assert_eq!(mode, ConnectionMode::WebSocket);
            assert_eq!(reason, "401 Unauthorized");
        },
        other => panic!("unexpected {other:?}"),
    }
    assert!(client.state().is_idle());
}

#[tokio::test]
async fn test_silent_bridge_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let options = ClientOptions {
        status_timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let client = NtripClient::spawn(options, discard);

    let (result, _bridge) = within(async {
        tokio::join!(client.connect(ws_config(port)), accept_bridge(&listener))
    })
    .await;
    match result {
        Err(NtripError::Transport { mode, reason }) => {
            assert_eq!(mode, ConnectionMode::WebSocket);
            assert!(reason.contains("timed out"), "{reason}");
        },
        other => panic!("unexpected {other:?}"),
    }
}

/// Plain HTTP relay: read the request head and start an NTRIP 1.0 stream.
async fn accept_relay(listener: &TcpListener) -> (TcpStream, String) {
    let (mut stream, _) = listener.accept().await.unwrap();
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await.unwrap() == 0 {
            break;
        }
        head.push(byte[0]);
    }
    stream.write_all(b"ICY 200 OK\r\n\r\n").await.unwrap();
    (stream, String::from_utf8(head).unwrap())
}

#[tokio::test]
async fn test_auto_mode_moves_on_from_silent_bridge() {
    let bridge = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge_port = bridge.local_addr().unwrap().port();
    let relay = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_port = relay.local_addr().unwrap().port();
    let caster_port = {
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        closed.local_addr().unwrap().port()
    };
    let options = ClientOptions {
        status_timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let client = NtripClient::spawn(options, discard);
    let config = ConnectionConfig {
        send_gga: false,
        websocket_url: Some(format!("ws://127.0.0.1:{bridge_port}")),
        proxy_url: Some(format!("http://127.0.0.1:{relay_port}/relay")),
        ..ConnectionConfig::new("127.0.0.1", caster_port, "MOUNT")
    };

    // the bridge takes the connect command and never answers it, the
    // caster itself is unreachable, so the relay is the one that works
    let (mode, (_bridge, command), (_relay, request)) = within(async {
        tokio::join!(
            client.connect(config),
            accept_bridge(&bridge),
            accept_relay(&relay)
        )
    })
    .await;
    assert_eq!(command["command"], "connect");
    assert_eq!(mode.unwrap(), ConnectionMode::Proxy);
    assert!(request.starts_with("GET /relay/MOUNT?host=127.0.0.1&port="), "{request}");
    assert_eq!(client.state().mode, Some(ConnectionMode::Proxy));
}
