use crate::error::{DoorsensorError, Result};
use crate::record::{DoorState, TransitionRecord};
use crate::time_delta::TimeDeltaFormatter;
use chrono::{DateTime, SubsecRound, Utc};

/// Outcome of evaluating one reading against the durable history
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Reading matches the last recorded state
    NoChange,
    /// A transition that must be appended and announced
    NewRecord(TransitionRecord),
}

/// Decides whether a reading is a new transition.
///
/// The decision only depends on its inputs: the reading, the last durable
/// record and the current time. Persistence and notification belong to the
/// caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionDetector {
    formatter: TimeDeltaFormatter,
}

impl TransitionDetector {
    pub fn new(formatter: TimeDeltaFormatter) -> Self {
        Self { formatter }
    }

    /// Evaluate a reading.
    ///
    /// With no previous record the reading is logged unconditionally as the
    /// initial state with an empty duration. A previous record dated after
    /// `now` is reported as [`DoorsensorError::ClockSkew`].
    pub fn evaluate(
        &self,
        reading: DoorState,
        last: Option<&TransitionRecord>,
        now: DateTime<Utc>,
    ) -> Result<Evaluation> {
        let now = now.trunc_subsecs(0);

        let Some(last) = last else {
            return Ok(Evaluation::NewRecord(TransitionRecord::new(reading, now, "")));
        };

        if last.state == reading {
            return Ok(Evaluation::NoChange);
        }

        // Fractional epochs from older logs are compared at whole-second precision
        let since = last.timestamp.trunc_subsecs(0);
        let elapsed = (now - since)
            .to_std()
            .map_err(|_| DoorsensorError::ClockSkew {
                last: last.epoch_seconds(),
                now: now.timestamp(),
            })?;

        Ok(Evaluation::NewRecord(TransitionRecord::new(
            reading,
            now,
            self.formatter.format(elapsed),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn record(state: DoorState, seconds: i64) -> TransitionRecord {
        TransitionRecord::new(state, at(seconds), "")
    }

    #[test]
    fn test_first_reading_is_forced() {
        let detector = TransitionDetector::default();
        let result = detector.evaluate(DoorState::Open, None, at(1_000)).unwrap();

        assert_eq!(
            result,
            Evaluation::NewRecord(TransitionRecord::new(DoorState::Open, at(1_000), ""))
        );
    }

    #[test]
    fn test_same_state_is_no_change() {
        let detector = TransitionDetector::default();
        let last = record(DoorState::Closed, 1_000);

        let result = detector
            .evaluate(DoorState::Closed, Some(&last), at(5_000))
            .unwrap();
        assert_eq!(result, Evaluation::NoChange);
    }

    #[test]
    fn test_change_records_elapsed_time() {
        let detector = TransitionDetector::default();
        let last = record(DoorState::Closed, 1_000);

        let result = detector
            .evaluate(DoorState::Open, Some(&last), at(1_000 + 3_725))
            .unwrap();

        let Evaluation::NewRecord(new) = result else {
            panic!("expected a new record");
        };
        assert_eq!(new.state, DoorState::Open);
        assert_eq!(new.timestamp, at(4_725));
        assert_eq!(new.duration_in_previous_state, "1 hour and 2 minutes");
    }

    #[test]
    fn test_change_in_same_second_has_empty_duration() {
        let detector = TransitionDetector::default();
        let last = record(DoorState::Open, 1_000);

        let result = detector
            .evaluate(DoorState::Closed, Some(&last), at(1_000))
            .unwrap();
        assert!(matches!(result, Evaluation::NewRecord(r) if r.duration_in_previous_state.is_empty()));
    }

    #[test]
    fn test_clock_skew_fails() {
        let detector = TransitionDetector::default();
        let last = record(DoorState::Open, 10_000);

        let err = detector
            .evaluate(DoorState::Closed, Some(&last), at(9_000))
            .unwrap_err();
        assert!(matches!(
            err,
            DoorsensorError::ClockSkew {
                last: 10_000,
                now: 9_000
            }
        ));
    }

    #[test]
    fn test_fractional_last_record_in_same_second() {
        let detector = TransitionDetector::default();
        let last = TransitionRecord::new(
            DoorState::Closed,
            at(1_000) + Duration::milliseconds(500),
            "",
        );

        let result = detector
            .evaluate(DoorState::Open, Some(&last), at(1_000) + Duration::milliseconds(700))
            .unwrap();
        assert_eq!(
            result,
            Evaluation::NewRecord(TransitionRecord::new(DoorState::Open, at(1_000), ""))
        );
    }

    #[test]
    fn test_fractional_last_record_elapsed_is_whole_seconds() {
        let detector = TransitionDetector::default();
        let last = TransitionRecord::new(
            DoorState::Closed,
            at(1_000) + Duration::milliseconds(900),
            "",
        );

        let result = detector
            .evaluate(DoorState::Open, Some(&last), at(1_060) + Duration::milliseconds(100))
            .unwrap();
        let Evaluation::NewRecord(new) = result else {
            panic!("expected a new record");
        };
        assert_eq!(new.timestamp, at(1_060));
        assert_eq!(new.duration_in_previous_state, "1 minute");
    }

    #[test]
    fn test_subsecond_now_is_truncated() {
        let detector = TransitionDetector::default();
        let now = at(2_000) + Duration::milliseconds(750);

        let Evaluation::NewRecord(new) = detector.evaluate(DoorState::Closed, None, now).unwrap()
        else {
            panic!("expected a new record");
        };
        assert_eq!(new.timestamp, at(2_000));
    }

    #[test]
    fn test_applied_readings_alternate() {
        let detector = TransitionDetector::default();
        let readings = [
            DoorState::Closed,
            DoorState::Closed,
            DoorState::Open,
            DoorState::Open,
            DoorState::Open,
            DoorState::Closed,
            DoorState::Open,
            DoorState::Closed,
            DoorState::Closed,
        ];

        let mut log: Vec<TransitionRecord> = Vec::new();
        for (i, reading) in readings.iter().enumerate() {
            let now = at(1_000 + i as i64 * 60);
            if let Evaluation::NewRecord(r) = detector.evaluate(*reading, log.last(), now).unwrap() {
                log.push(r);
            }
        }

        assert_eq!(log.len(), 5);
        assert!(log.windows(2).all(|pair| pair[0].state != pair[1].state));
        assert_eq!(log[1].duration_in_previous_state, "2 minutes");
    }
}
