//! Transition records and the line format of the door log.
//!
//! Each record occupies exactly one line:
//!
//! ```text
//! state,epochSeconds,stateLabel,humanTimestamp,durationPhrase
//! 1,1363111387,open,Tue Mar 12 14:03:07 2013,2 hours and 5 minutes
//! ```
//!
//! `stateLabel` and `humanTimestamp` are always derived from `state` and the
//! epoch field when encoding; the epoch field is the canonical timestamp.

use crate::error::ParseError;
use crate::input::PinLevel;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// strftime layout of the human readable timestamp column
pub const DATE_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

const FIELD_COUNT: usize = 5;

/// Logical state of the door
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    Closed,
    Open,
}

impl DoorState {
    /// Digit stored in the first log column
    pub fn as_digit(self) -> u8 {
        match self {
            DoorState::Closed => 0,
            DoorState::Open => 1,
        }
    }

    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(DoorState::Closed),
            1 => Some(DoorState::Open),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DoorState::Closed => "closed",
            DoorState::Open => "open",
        }
    }

    /// Map a raw pin level to a door state given the level that means "open"
    pub fn from_level(level: PinLevel, open_level: PinLevel) -> Self {
        if level == open_level {
            DoorState::Open
        } else {
            DoorState::Closed
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One durable entry of the door history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub state: DoorState,
    pub timestamp: DateTime<Utc>,
    /// Time spent in the previous state; empty for the first record
    pub duration_in_previous_state: String,
}

impl TransitionRecord {
    pub fn new(state: DoorState, timestamp: DateTime<Utc>, duration: impl Into<String>) -> Self {
        Self {
            state,
            timestamp,
            duration_in_previous_state: duration.into(),
        }
    }

    pub fn epoch_seconds(&self) -> i64 {
        self.timestamp.timestamp()
    }
}

/// Encodes and decodes log lines, rendering human timestamps in a fixed timezone
#[derive(Debug, Clone, Copy)]
pub struct LogCodec {
    timezone: Tz,
}

impl LogCodec {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn human_timestamp(&self, timestamp: &DateTime<Utc>) -> String {
        timestamp
            .with_timezone(&self.timezone)
            .format(DATE_FORMAT)
            .to_string()
    }

    /// Render a record as one newline-terminated log line.
    ///
    /// Field and line separators inside the duration phrase are replaced by
    /// spaces so the line always decodes to five fields.
    pub fn encode(&self, record: &TransitionRecord) -> String {
        let duration = record
            .duration_in_previous_state
            .replace([',', '\n', '\r'], " ");
        format!(
            "{},{},{},{},{}\n",
            record.state.as_digit(),
            record.epoch_seconds(),
            record.state.label(),
            self.human_timestamp(&record.timestamp),
            duration.trim(),
        )
    }

    pub fn decode(&self, line: &str) -> Result<TransitionRecord, ParseError> {
        let line = line.trim_end_matches(['\n', '\r']);
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != FIELD_COUNT {
            return Err(ParseError::FieldCount {
                found: fields.len(),
                line: line.to_string(),
            });
        }

        let state = fields[0]
            .trim()
            .parse::<u8>()
            .ok()
            .and_then(DoorState::from_digit)
            .ok_or_else(|| ParseError::InvalidState {
                value: fields[0].to_string(),
            })?;

        let timestamp = parse_epoch(fields[1].trim()).ok_or_else(|| ParseError::InvalidTimestamp {
            value: fields[1].to_string(),
        })?;

        // The digit is authoritative; early logs paired 0 with "open"
        let label = fields[2].trim();
        if label != state.label() {
            warn!(
                "Log label {:?} disagrees with state digit {}, using {}",
                label,
                state.as_digit(),
                state
            );
        }

        Ok(TransitionRecord {
            state,
            timestamp,
            duration_in_previous_state: fields[4].trim().to_string(),
        })
    }
}

/// Accepts integer or fractional seconds since the epoch
fn parse_epoch(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(seconds) = value.parse::<i64>() {
        if seconds < 0 {
            return None;
        }
        return Utc.timestamp_opt(seconds, 0).single();
    }

    let seconds = value.parse::<f64>().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    let whole = seconds.trunc();
    let nanos = ((seconds - whole) * 1_000_000_000.0).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(whole as i64, nanos).single()
}
