use std::{collections::VecDeque, future::Future, io, pin::Pin, time::Duration};

use chrono::Utc;
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{self, Instant, Interval, MissedTickBehavior, Sleep},
};
use tracing::{debug, error, info, trace, warn};

use super::{
    backoff::{ReconnectPolicy, ReconnectState},
    transport::{self, Established, Link},
    ClientOptions, ClientState, ConnectionConfig, ConnectionMode, ConnectionState, RtcmStats,
};
use crate::{
    constants::NEUTRAL_GGA,
    encoder::GgaEncoder,
    error::{NtripError, Result},
    events::{ClientEvents, ConnectionEvent, RtcmEvent},
    position::Position,
    rtcm,
};

/// Destination of the correction stream, usually the receiver's serial port.
///
/// A failed write is logged and the buffer dropped; it never affects the
/// caster connection.
pub trait DeviceSink: Send + 'static {
    fn send_data(&mut self, data: &[u8]) -> io::Result<()>;
}

impl<F> DeviceSink for F
where
    F: FnMut(&[u8]) -> io::Result<()> + Send + 'static,
{
    fn send_data(&mut self, data: &[u8]) -> io::Result<()> {
        (self)(data)
    }
}

type Reply<T> = oneshot::Sender<Result<T>>;
type Attempt = Pin<Box<dyn Future<Output = Result<Established>> + Send>>;

enum Command {
    Connect {
        config: ConnectionConfig,
        reply: Reply<ConnectionMode>,
    },
    Disconnect {
        reply: Reply<()>,
    },
    UpdatePosition(Position),
    SendGgaNow,
    SetGgaInterval(u64),
    Stats(Reply<RtcmStats>),
    ResetStats,
}

/// Handle to the NTRIP client task.
///
/// All connection state lives in a task spawned on the current Tokio
/// runtime; the handle only sends it commands. Dropping the handle
/// disconnects and stops the task.
///
/// ```no_run
/// use rtklink::ntrip::{ClientOptions, ConnectionConfig, NtripClient};
///
/// # async fn run() -> Result<(), rtklink::NtripError> {
/// let client = NtripClient::spawn(ClientOptions::default(), |rtcm: &[u8]| -> std::io::Result<()> {
///     // write `rtcm` to the receiver
///     Ok(())
/// });
/// let mut connection = client.events().connection.subscribe();
/// let mode = client
///     .connect(ConnectionConfig::new("caster.example", 2101, "MOUNT"))
///     .await?;
/// println!("streaming corrections over {mode}");
/// while let Ok(event) = connection.recv().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct NtripClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ClientState>,
    events: ClientEvents,
}

impl NtripClient {
    /// Start the client task. Must be called from within a Tokio runtime.
    pub fn spawn(options: ClientOptions, sink: impl DeviceSink) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ClientState::default());
        let events = ClientEvents::default();
        let actor = Actor::new(options, sink, events.clone(), state_tx);
        tokio::spawn(actor.run(rx));
        Self {
            commands,
            state,
            events,
        }
    }

    pub fn events(&self) -> &ClientEvents {
        &self.events
    }

    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Receiver that is notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<ClientState> {
        self.state.clone()
    }

    /// Connect to the caster and return the transport that won.
    ///
    /// Fails right away while another attempt is running or a connection is
    /// up, and for an invalid `config` before any transport is tried. A failed
    /// first attempt is not retried; reconnection only kicks in once a
    /// connection was established.
    pub async fn connect(&self, config: ConnectionConfig) -> Result<ConnectionMode> {
        self.request(|reply| Command::Connect { config, reply }).await
    }

    /// Drop the connection, abort a running attempt or cancel a pending
    /// reconnection.
    pub async fn disconnect(&self) -> Result<()> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Latest receiver fix, used for every following GGA report.
    pub fn update_position(&self, position: Position) -> Result<()> {
        self.send(Command::UpdatePosition(position))
    }

    /// Report the position now, even when periodic reports are disabled.
    pub fn send_gga_now(&self) -> Result<()> {
        self.send(Command::SendGgaNow)
    }

    /// Change the GGA period of the current configuration and restart the
    /// timer. Ignored before the first `connect`.
    pub fn set_gga_interval(&self, seconds: u64) -> Result<()> {
        if seconds == 0 {
            return Err(NtripError::Config(
                "GGA update interval must be at least 1 second".into(),
            ));
        }
        self.send(Command::SetGgaInterval(seconds))
    }

    /// Snapshot of the correction counters with the current correction age.
    pub async fn stats(&self) -> Result<RtcmStats> {
        self.request(Command::Stats).await
    }

    pub fn reset_stats(&self) -> Result<()> {
        self.send(Command::ResetStats)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| NtripError::ClientClosed)
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(command(tx))?;
        rx.await.map_err(|_| NtripError::ClientClosed)?
    }
}

/// Cancelable as a unit by [`Timers::clear`].
#[derive(Default)]
struct Timers {
    gga_interval: Option<Interval>,
    gga_retry: Option<Pin<Box<Sleep>>>,
    gga_retry_queue: VecDeque<Instant>,
    reconnect: Option<Pin<Box<Sleep>>>,
    /// Rearmed by every chunk from the caster
    idle: Option<Pin<Box<Sleep>>>,
}

impl Timers {
    fn clear(&mut self) {
        *self = Self::default();
    }

    fn clear_gga_retries(&mut self) {
        self.gga_retry = None;
        self.gga_retry_queue.clear();
    }

    fn arm_next_gga_retry(&mut self) {
        self.gga_retry = self
            .gga_retry_queue
            .pop_front()
            .map(|at| Box::pin(time::sleep_until(at)));
    }
}

fn gga_interval(period: Duration) -> Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

struct Actor<S> {
    options: ClientOptions,
    sink: S,
    events: ClientEvents,
    state_tx: watch::Sender<ClientState>,
    state: ClientState,
    encoder: GgaEncoder,
    policy: ReconnectPolicy,
    reconnect: ReconnectState,
    config: Option<ConnectionConfig>,
    position: Option<Position>,
    stats: RtcmStats,
    corrections_seen: bool,
    attempt: Option<Attempt>,
    pending_reply: Option<Reply<ConnectionMode>>,
    link: Option<Link>,
    timers: Timers,
}

impl<S: DeviceSink> Actor<S> {
    fn new(
        options: ClientOptions,
        sink: S,
        events: ClientEvents,
        state_tx: watch::Sender<ClientState>,
    ) -> Self {
        Self {
            encoder: GgaEncoder::new(options.gga_defaults),
            policy: ReconnectPolicy::from(&options),
            options,
            sink,
            events,
            state_tx,
            state: ClientState::default(),
            reconnect: ReconnectState::default(),
            config: None,
            position: None,
            stats: RtcmStats::default(),
            corrections_seen: false,
            attempt: None,
            pending_reply: None,
            link: None,
            timers: Timers::default(),
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                result = poll_attempt(&mut self.attempt) => self.attempt_finished(result).await,
                chunk = next_chunk(&mut self.link) => self.on_chunk(chunk).await,
                () = tick(&mut self.timers.gga_interval) => self.send_gga(false).await,
                () = fire(&mut self.timers.gga_retry) => self.gga_retry_due().await,
                () = fire(&mut self.timers.reconnect) => self.reconnect_due(),
                () = fire(&mut self.timers.idle) => {
                    self.connection_lost(NtripError::Timeout(self.options.idle_timeout));
                },
            }
        }
        debug!("client handle dropped, shutting down");
        self.teardown().await;
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Connect { config, reply } => self.connect(config, reply),
            Command::Disconnect { reply } => {
                let _ = reply.send(self.disconnect().await);
            },
            Command::UpdatePosition(position) => self.position = Some(position),
            Command::SendGgaNow => self.send_gga(true).await,
            Command::SetGgaInterval(seconds) => self.set_gga_interval(seconds),
            Command::Stats(reply) => {
                let _ = reply.send(Ok(self.stats.snapshot(Utc::now())));
            },
            Command::ResetStats => self.stats = RtcmStats::default(),
        }
    }

    fn set_state(&mut self, connection: ConnectionState, mode: Option<ConnectionMode>) {
        self.state = ClientState { connection, mode };
        self.state_tx.send_replace(self.state);
    }

    fn connect(&mut self, config: ConnectionConfig, reply: Reply<ConnectionMode>) {
        let rejected = match self.state.connection {
            ConnectionState::Connected => Some(NtripError::AlreadyConnected),
            ConnectionState::Connecting => Some(NtripError::AlreadyConnecting),
            ConnectionState::Idle => config.validate().err(),
        };
        if let Some(e) = rejected {
            if e.is_config() {
                warn!("{e}");
                self.events.connection.publish(ConnectionEvent::Error {
                    message: e.to_string(),
                });
            }
            let _ = reply.send(Err(e));
            return;
        }

        // supersedes any pending reconnection
        self.timers.reconnect = None;
        self.reconnect.reset();
        self.stats = RtcmStats::default();
        self.config = Some(config);
        self.pending_reply = Some(reply);
        self.start_attempt();
    }

    fn start_attempt(&mut self) {
        let Some(config) = self.config.clone() else {
            return;
        };
        let mode = config.connection_mode;
        let attempt = self.reconnect.attempts;
        info!(
            %mode,
            attempt,
            host = config.caster_host(),
            mountpoint = config.mountpoint(),
            "connecting"
        );
        self.set_state(ConnectionState::Connecting, Some(mode));
        self.events
            .connection
            .publish(ConnectionEvent::Connecting { mode, attempt });
        self.attempt = Some(Box::pin(transport::establish(config, self.options.clone())));
    }

    async fn attempt_finished(&mut self, result: Result<Established>) {
        match result {
            Ok(Established { link, mode }) => {
                self.link = Some(link);
                self.reconnect.reset();
                self.corrections_seen = false;
                self.set_state(ConnectionState::Connected, Some(mode));
                self.events
                    .connection
                    .publish(ConnectionEvent::Connected { mode });
                if let Some(reply) = self.pending_reply.take() {
                    let _ = reply.send(Ok(mode));
                }
                self.timers.idle = Some(Box::pin(time::sleep(self.options.idle_timeout)));
                self.start_gga_schedule().await;
            },
            Err(e) => {
                error!("connection attempt failed: {e}");
                self.set_state(ConnectionState::Idle, None);
                self.reconnect.record_failure(e.to_string());
                self.events.connection.publish(ConnectionEvent::Error {
                    message: e.to_string(),
                });
                match self.pending_reply.take() {
                    Some(reply) => {
                        let _ = reply.send(Err(e));
                    },
                    None => self.schedule_reconnect(),
                }
            },
        }
    }

    /// GGA right away, again after each retry delay until corrections flow,
    /// and then every interval.
    async fn start_gga_schedule(&mut self) {
        let Some(config) = &self.config else {
            return;
        };
        if !config.send_gga {
            return;
        }
        let period = config.gga_interval();
        let now = Instant::now();
        let mut delays = self.options.gga_retry_delays.clone();
        delays.sort();
        self.timers.gga_retry_queue = delays.into_iter().map(|delay| now + delay).collect();
        self.timers.arm_next_gga_retry();
        self.timers.gga_interval = Some(gga_interval(period));
        self.send_gga(false).await;
    }

    async fn gga_retry_due(&mut self) {
        if self.corrections_seen {
            self.timers.clear_gga_retries();
            return;
        }
        debug!("no corrections yet, repeating GGA");
        self.send_gga(false).await;
        self.timers.arm_next_gga_retry();
    }

    fn set_gga_interval(&mut self, seconds: u64) {
        let Some(config) = self.config.as_mut() else {
            debug!("no configuration yet, GGA interval change ignored");
            return;
        };
        config.gga_update_interval_seconds = seconds;
        if self.timers.gga_interval.is_some() {
            self.timers.gga_interval = Some(gga_interval(config.gga_interval()));
        }
    }

    /// `forced` reports go out even when `send_gga` is off.
    async fn send_gga(&mut self, forced: bool) {
        let Some(link) = self.link.as_mut() else {
            debug!("not connected, GGA skipped");
            return;
        };
        let enabled = self.config.as_ref().is_some_and(|config| config.send_gga);
        if !(enabled || forced) {
            return;
        }
        let sentence = match &self.position {
            Some(position) => self.encoder.encode(position),
            None => NEUTRAL_GGA.to_string(),
        };
        trace!(sentence = sentence.trim_end(), "sending GGA");
        link.send_gga(&sentence).await;
    }

    async fn on_chunk(&mut self, chunk: Result<Option<Vec<u8>>>) {
        let data = match chunk {
            Ok(Some(data)) => data,
            Ok(None) => return self.connection_lost(NtripError::StreamEnded),
            Err(e) => return self.connection_lost(e),
        };
        if let Some(idle) = self.timers.idle.as_mut() {
            idle.as_mut().reset(Instant::now() + self.options.idle_timeout);
        }
        let now = Utc::now();
        let info = rtcm::inspect(&data);
        let valid = rtcm::is_valid(&data);
        let message_type = info.message_type.filter(|_| valid);
        self.stats.record_received(data.len(), message_type, now);

        if valid {
            trace!(len = data.len(), ?message_type, crc_ok = ?info.crc_ok, "correction data");
            if !self.corrections_seen {
                self.corrections_seen = true;
                self.timers.clear_gga_retries();
            }
            match self.sink.send_data(&data) {
                Ok(()) => self.stats.record_forwarded(data.len()),
                Err(e) => warn!("forwarding corrections to the receiver failed: {e}"),
            }
        } else if rtcm::is_sourcetable(&data) {
            info!("caster answered with its source table, sending a position report");
            self.send_gga(true).await;
        } else {
            debug!(len = data.len(), "not forwarding non-RTCM data");
        }

        self.events.rtcm.publish(RtcmEvent {
            len: data.len(),
            message_type,
            valid,
            stats: self.stats.snapshot(now),
        });
    }

    fn connection_lost(&mut self, reason: NtripError) {
        warn!("caster connection lost: {reason}");
        self.reconnect.record_failure(reason.to_string());
        // the link is gone, no point in a graceful close
        self.timers.clear();
        self.attempt = None;
        self.link = None;
        self.set_state(ConnectionState::Idle, None);
        self.events.connection.publish(ConnectionEvent::Disconnected {
            reason: reason.to_string(),
        });
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if !self.options.auto_reconnect || self.config.is_none() {
            return;
        }
        if !self.reconnect.can_retry(&self.policy) {
            let e = NtripError::RetriesExhausted {
                attempts: self.reconnect.attempts,
            };
            error!("{e}");
            self.events.connection.publish(ConnectionEvent::Error {
                message: e.to_string(),
            });
            return;
        }
        let delay = self.policy.next_delay(self.reconnect.attempts);
        self.reconnect.attempts += 1;
        let attempt = self.reconnect.attempts;
        info!(attempt, ?delay, "scheduling reconnection");
        self.events
            .connection
            .publish(ConnectionEvent::ReconnectScheduled { attempt, delay });
        self.timers.reconnect = Some(Box::pin(time::sleep(delay)));
    }

    fn reconnect_due(&mut self) {
        if self.state.connection == ConnectionState::Idle {
            self.start_attempt();
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.state.connection == ConnectionState::Idle && self.timers.reconnect.is_none() {
            return Err(NtripError::NotConnected);
        }
        if let Some(reply) = self.pending_reply.take() {
            let _ = reply.send(Err(NtripError::Aborted));
        }
        self.teardown().await;
        self.reconnect.reset();
        info!("disconnected from caster");
        self.events.connection.publish(ConnectionEvent::Disconnected {
            reason: "disconnected by user".into(),
        });
        Ok(())
    }

    /// Drop timers and a running attempt, then close the link.
    async fn teardown(&mut self) {
        self.timers.clear();
        self.attempt = None;
        if let Some(link) = self.link.take() {
            link.close().await;
        }
        self.set_state(ConnectionState::Idle, None);
    }
}

async fn poll_attempt(attempt: &mut Option<Attempt>) -> Result<Established> {
    let Some(fut) = attempt.as_mut() else {
        return std::future::pending().await;
    };
    let result = fut.await;
    *attempt = None;
    result
}

async fn next_chunk(link: &mut Option<Link>) -> Result<Option<Vec<u8>>> {
    match link {
        Some(link) => link.next_chunk().await,
        None => std::future::pending().await,
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        },
        None => std::future::pending().await,
    }
}

async fn fire(sleep: &mut Option<Pin<Box<Sleep>>>) {
    let Some(timer) = sleep.as_mut() else {
        return std::future::pending().await;
    };
    timer.await;
    *sleep = None;
}
