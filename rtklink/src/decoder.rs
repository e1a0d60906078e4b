use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, trace};

use crate::{
    events::{DecoderEvents, PositionEvent, SatellitesEvent, SentenceStatsEvent},
    parser::Parser,
    position::{Position, PositionStore},
    satellites::{SatelliteRecord, SatelliteTracker},
    sentences::{ParsedSentence, Sentence, SentenceKind},
};

/// Counters for accepted and dropped sentences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SentenceStats {
    pub total_sentences: u64,
    pub dropped_sentences: u64,
    pub by_kind: BTreeMap<SentenceKind, u64>,
}

/// Turns the receiver's byte stream into typed sentences and keeps the
/// derived position and satellite state up to date.
///
/// ```
/// use rtklink::NmeaDecoder;
///
/// let mut decoder = NmeaDecoder::new();
/// let mut positions = decoder.events().position.subscribe();
///
/// let sentences = decoder
///     .feed("$GPGGA,092750.000,5321.6802,N,00630.3372,W,1,8,1.03,61.7,M,55.2,M,,*76\r\n");
/// assert_eq!(sentences.len(), 1);
/// assert_eq!(positions.try_recv().unwrap().position.latitude, 53.361337);
/// ```
#[derive(Debug, Default)]
pub struct NmeaDecoder {
    parser: Parser,
    position: PositionStore,
    satellites: SatelliteTracker,
    stats: SentenceStats,
    events: DecoderEvents,
}

impl NmeaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom line buffer limit.
    pub fn with_max_buffer_len(max_buffer_len: usize) -> Self {
        Self {
            parser: Parser::new(max_buffer_len),
            ..Self::default()
        }
    }

    pub fn events(&self) -> &DecoderEvents {
        &self.events
    }

    /// Process a chunk of raw input and return every sentence completed by it.
    ///
    /// Malformed sentences are logged and counted, never returned. At most one
    /// notification of each kind is published per call.
    pub fn feed(&mut self, data: impl AsRef<[u8]>) -> Vec<ParsedSentence> {
        let mut accepted = Vec::new();
        let mut position_changed = false;
        let mut satellites_changed = false;

        let mut it = self.parser.consume(data.as_ref());
        while let Some(result) = it.next() {
            match result {
                Ok(parsed) => {
                    trace!(raw = %parsed.raw, "sentence");
                    match &parsed.sentence {
                        Sentence::Gga(gga) => position_changed |= self.position.apply_gga(gga),
                        Sentence::Rmc(rmc) => position_changed |= self.position.apply_rmc(rmc),
                        Sentence::Gsv(gsv) => satellites_changed |= self.satellites.apply_gsv(gsv),
                        Sentence::Gsa(gsa) => {
                            self.satellites.apply_gsa(gsa);
                            satellites_changed = true;
                        },
                        Sentence::Gst(_) | Sentence::Vtg(_) | Sentence::Unknown(_) => {},
                    }
                    self.stats.total_sentences += 1;
                    *self.stats.by_kind.entry(parsed.kind()).or_default() += 1;
                    accepted.push(parsed);
                },
                Err(e) => {
                    debug!("dropping sentence: {e}");
                    self.stats.dropped_sentences += 1;
                },
            }
        }

        self.publish(accepted.last(), position_changed, satellites_changed);
        accepted
    }

    fn publish(&self, last: Option<&ParsedSentence>, position: bool, satellites: bool) {
        let timestamp = Utc::now();
        if position {
            if let Some(position) = self.position.current() {
                self.events.position.publish(PositionEvent {
                    position: position.clone(),
                    timestamp,
                });
            }
        }
        if satellites {
            self.events.satellites.publish(SatellitesEvent {
                satellites: self.satellites.satellites().to_vec(),
                timestamp,
            });
        }
        if let Some(last) = last {
            self.events.sentence_stats.publish(SentenceStatsEvent {
                kind: last.kind(),
                data_rate: last.data_rate,
                total_sentences: self.stats.total_sentences,
                dropped_sentences: self.stats.dropped_sentences,
            });
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.current()
    }

    /// Satellites of the last completed GSV group.
    pub fn satellites(&self) -> &[SatelliteRecord] {
        self.satellites.satellites()
    }

    pub fn stats(&self) -> &SentenceStats {
        &self.stats
    }

    /// Drop buffered input, the stored fix, the satellite table and all counters.
    pub fn reset(&mut self) {
        self.parser.reset();
        self.position.reset();
        self.satellites.reset();
        self.stats = SentenceStats::default();
    }
}
