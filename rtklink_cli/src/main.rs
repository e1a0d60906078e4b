mod cli;
mod logging;

use std::{
    io::{self, Read, Write},
    thread,
};

use anyhow::{Context, Result};
use rtklink::{
    events::ConnectionEvent,
    ntrip::{DeviceSink, NtripClient},
    NmeaDecoder,
};
use serialport::SerialPort;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, error, info, warn};

const READ_BUFFER_SIZE: usize = 1024;

/// Corrections go straight back out of the receiver's serial port.
struct SerialSink(Box<dyn SerialPort>);

impl DeviceSink for SerialSink {
    fn send_data(&mut self, data: &[u8]) -> io::Result<()> {
        self.0.write_all(data)
    }
}

/// Reads the serial port, converting timeouts into "no data received"
fn read_port(port: &mut dyn SerialPort, output: &mut [u8]) -> io::Result<usize> {
    match port.read(output) {
        Ok(b) => Ok(b),
        Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
        Err(e) => Err(e),
    }
}

/// Blocking reader thread; stops once the decoder side went away.
fn pump_serial(mut port: Box<dyn SerialPort>, tx: &mpsc::Sender<Vec<u8>>) {
    let mut buf = [0; READ_BUFFER_SIZE];
    loop {
        match read_port(port.as_mut(), &mut buf) {
            Ok(0) => {},
            Ok(n) => {
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    break;
                }
            },
            Err(e) => {
                error!("serial port read failed: {e}");
                break;
            },
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let matches = cli::command().get_matches();
    let settings = cli::Settings::from_matches(&matches)?;
    logging::initialize(settings.log_file.as_deref())?;
    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let port = cli::open_serial(&settings.serial)?;
    let writer = port
        .try_clone()
        .context("Failed to clone serial port for writing")?;

    let (tx, mut serial) = mpsc::channel(64);
    thread::spawn(move || pump_serial(port, &tx));

    let mut decoder = NmeaDecoder::new();
    let mut positions = decoder.events().position.subscribe();
    let client = NtripClient::spawn(settings.options, SerialSink(writer));
    let mut connection = client.events().connection.subscribe();

    let mode = client
        .connect(settings.connection)
        .await
        .context("Failed to connect to caster")?;
    info!(%mode, "streaming corrections");

    let mut stats_timer = tokio::time::interval(settings.stats_interval);
    loop {
        tokio::select! {
            data = serial.recv() => match data {
                Some(data) => {
                    decoder.feed(&data);
                },
                None => {
                    warn!("serial reader stopped");
                    break;
                },
            },
            event = positions.recv() => match event {
                Ok(event) => client.update_position(event.position)?,
                Err(RecvError::Lagged(n)) => debug!("skipped {n} position updates"),
                Err(RecvError::Closed) => break,
            },
            event = connection.recv() => match event {
                Ok(ConnectionEvent::Error { message }) => warn!("{message}"),
                Ok(event) => info!(?event, "connection"),
                Err(RecvError::Lagged(_)) => {},
                Err(RecvError::Closed) => break,
            },
            _ = stats_timer.tick() => {
                let stats = client.stats().await?;
                info!(
                    satellites = decoder.satellites().len(),
                    sentences = decoder.stats().total_sentences,
                    corrections = %serde_json::to_string(&stats)?,
                    "status"
                );
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            },
        }
    }

    if let Err(e) = client.disconnect().await {
        debug!("disconnect: {e}");
    }
    Ok(())
}
