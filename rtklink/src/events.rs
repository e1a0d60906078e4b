//! Typed notification channels.
//!
//! Each category gets its own [`Topic`], so subscribers only ever see the
//! event type they asked for. Publishing with nobody listening is a no-op.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::{
    ntrip::{ConnectionMode, RtcmStats},
    position::Position,
    satellites::SatelliteRecord,
    sentences::SentenceKind,
};

/// Slow subscribers lag (and get `RecvError::Lagged`) once this many
/// events are queued.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// One broadcast channel carrying a single event type.
#[derive(Debug)]
pub struct Topic<T> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone> Topic<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub(crate) fn publish(&self, event: T) {
        // Err only means there are no receivers right now
        let _ = self.tx.send(event);
    }
}

impl<T: Clone> Default for Topic<T> {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionEvent {
    pub position: Position,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatellitesEvent {
    pub satellites: Vec<SatelliteRecord>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentenceStatsEvent {
    /// Kind of the last sentence accepted in the batch
    pub kind: SentenceKind,
    pub data_rate: Option<f64>,
    pub total_sentences: u64,
    pub dropped_sentences: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConnectionEvent {
    Connecting { mode: ConnectionMode, attempt: u32 },
    Connected { mode: ConnectionMode },
    Disconnected { reason: String },
    Error { message: String },
    ReconnectScheduled { attempt: u32, delay: Duration },
}

/// Emitted for every buffer received from the caster, forwarded or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RtcmEvent {
    pub len: usize,
    pub message_type: Option<u16>,
    pub valid: bool,
    pub stats: RtcmStats,
}

/// Notifications published by [`crate::NmeaDecoder`].
#[derive(Debug, Clone, Default)]
pub struct DecoderEvents {
    pub position: Topic<PositionEvent>,
    pub satellites: Topic<SatellitesEvent>,
    pub sentence_stats: Topic<SentenceStatsEvent>,
}

/// Notifications published by [`crate::ntrip::NtripClient`].
#[derive(Debug, Clone, Default)]
pub struct ClientEvents {
    pub connection: Topic<ConnectionEvent>,
    pub rtcm: Topic<RtcmEvent>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn publish_without_subscribers() {
        let topic: Topic<u32> = Topic::default();
        assert_eq!(topic.receiver_count(), 0);
        topic.publish(1);
    }

    #[test]
    fn every_subscriber_sees_the_event() {
        let topic: Topic<u32> = Topic::new(4);
        let mut first = topic.subscribe();
        let mut second = topic.clone().subscribe();
        topic.publish(7);
        assert_eq!(first.try_recv(), Ok(7));
        assert_eq!(second.try_recv(), Ok(7));
    }

    #[test]
    fn connection_event_json_shape() {
        let event = ConnectionEvent::Connected {
            mode: ConnectionMode::Direct,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "connected");
        assert_eq!(json["mode"], "direct");
    }

    #[test]
    fn position_event_timestamp_is_rfc3339() {
        use chrono::TimeZone;

        let event = PositionEvent {
            position: Position::new(53.361337, -6.50562),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 9, 27, 50).unwrap(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["timestamp"], "2024-05-01T09:27:50Z");
        assert_eq!(json["position"]["latitude"], 53.361337);
    }
}
