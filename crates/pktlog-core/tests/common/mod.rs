//! Shared helpers for integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use pktlog_core::observe::{LogEvent, LogSink};
use pktlog_core::{Cadence, Direction, ObservationSettings, Packet};
use serde::Serialize;

/// Sink that keeps every event in memory
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LogEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().clone()
    }

    /// Hidden reports of one direction, in order
    pub fn hidden(&self, direction: Direction) -> Vec<u64> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                LogEvent::Hidden {
                    direction: d,
                    count,
                } if *d == direction => Some(*count),
                _ => None,
            })
            .collect()
    }

    /// Packet types whose body could not be rendered, in order
    pub fn render_failures(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                LogEvent::RenderFailed { packet_type, .. } => Some(packet_type.clone()),
                _ => None,
            })
            .collect()
    }

    /// Packet types logged in full, in order
    pub fn observed(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                LogEvent::Observed { packet_type, .. } => Some(packet_type.clone()),
                _ => None,
            })
            .collect()
    }
}

impl LogSink for RecordingSink {
    fn emit(&self, event: LogEvent) {
        self.events.lock().push(event);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestPacket {
    #[serde(skip)]
    pub name: String,
    pub entity_id: u64,
    /// Fails to serialize when set
    #[serde(skip_serializing_if = "is_false", serialize_with = "refuse")]
    pub unrenderable: bool,
}

impl TestPacket {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entity_id: 42,
            unrenderable: false,
        }
    }

    /// A packet whose body cannot be rendered into the log
    pub fn unrenderable(name: &str) -> Self {
        Self {
            unrenderable: true,
            ..Self::new(name)
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn refuse<S: serde::Serializer>(_: &bool, _: S) -> Result<S::Ok, S::Error> {
    Err(serde::ser::Error::custom("unsupported field"))
}

impl Packet for TestPacket {
    fn type_name(&self) -> &str {
        &self.name
    }
}

pub fn settings(entries: &[&str], receive_ms: i64, send_ms: i64) -> ObservationSettings {
    ObservationSettings {
        filter_entries: entries.iter().map(|s| (*s).to_string()).collect(),
        receive_cadence: Cadence::from_millis(receive_ms),
        send_cadence: Cadence::from_millis(send_ms),
        auto_reload: true,
    }
}
