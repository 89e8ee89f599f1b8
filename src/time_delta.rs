use std::time::Duration;

/// Number of units shown when nothing else is configured
pub const DEFAULT_DESIRED_PARTS: usize = 2;

/// Largest useful part count: days, hours, minutes and seconds
pub const MAX_DESIRED_PARTS: usize = UNITS.len();

const UNITS: [(u64, &str, &str); 4] = [
    (86_400, "day", "days"),
    (3_600, "hour", "hours"),
    (60, "minute", "minutes"),
    (1, "second", "seconds"),
];

/// Renders elapsed time as a short English phrase such as `1 day and 1 hour`.
///
/// Only the largest nonzero units are kept, at most `desired_parts` of them.
/// The output never contains a comma, so it can be stored as the last field
/// of a log line without escaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeDeltaFormatter {
    desired_parts: usize,
}

impl TimeDeltaFormatter {
    pub fn new(desired_parts: usize) -> Self {
        Self { desired_parts }
    }

    /// Format a duration; sub-second remainders are dropped and zero yields an empty string
    pub fn format(&self, delta: Duration) -> String {
        let mut remaining = delta.as_secs();
        let mut parts: Vec<String> = Vec::with_capacity(self.desired_parts.min(MAX_DESIRED_PARTS));

        for (unit_seconds, singular, plural) in UNITS {
            let value = remaining / unit_seconds;
            remaining %= unit_seconds;

            if value > 0 && parts.len() < self.desired_parts {
                let unit = if value == 1 { singular } else { plural };
                parts.push(format!("{} {}", value, unit));
            }
        }

        parts.join(" and ")
    }
}

impl Default for TimeDeltaFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_DESIRED_PARTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_zero_is_empty() {
        let formatter = TimeDeltaFormatter::default();
        assert_eq!(formatter.format(secs(0)), "");
        assert_eq!(formatter.format(Duration::from_millis(999)), "");
    }

    #[test]
    fn test_seconds_only() {
        let formatter = TimeDeltaFormatter::default();
        assert_eq!(formatter.format(secs(45)), "45 seconds");
        assert_eq!(formatter.format(secs(1)), "1 second");
    }

    #[test]
    fn test_two_largest_units() {
        let formatter = TimeDeltaFormatter::default();
        assert_eq!(formatter.format(secs(90_061)), "1 day and 1 hour");
        assert_eq!(formatter.format(secs(3_725)), "1 hour and 2 minutes");
        assert_eq!(formatter.format(secs(172_800 + 59)), "2 days and 59 seconds");
    }

    #[test]
    fn test_skips_zero_units() {
        let formatter = TimeDeltaFormatter::default();
        assert_eq!(formatter.format(secs(86_400)), "1 day");
        assert_eq!(formatter.format(secs(7_200 + 5)), "2 hours and 5 seconds");
    }

    #[test]
    fn test_configurable_parts() {
        let formatter = TimeDeltaFormatter::new(4);
        assert_eq!(
            formatter.format(secs(90_061)),
            "1 day and 1 hour and 1 minute and 1 second"
        );

        let formatter = TimeDeltaFormatter::new(1);
        assert_eq!(formatter.format(secs(90_061)), "1 day");

        let formatter = TimeDeltaFormatter::new(0);
        assert_eq!(formatter.format(secs(90_061)), "");
    }

    #[test]
    fn test_oversized_part_count_shows_every_unit() {
        let formatter = TimeDeltaFormatter::new(usize::MAX);
        assert_eq!(formatter.format(secs(61)), "1 minute and 1 second");
        assert_eq!(
            formatter.format(secs(90_061)),
            "1 day and 1 hour and 1 minute and 1 second"
        );
    }

    proptest! {
        #[test]
        fn prop_output_is_comma_free(seconds in 0u64..10_000_000, parts in 0usize..5) {
            let phrase = TimeDeltaFormatter::new(parts).format(secs(seconds));
            prop_assert!(phrase.chars().all(|c| c.is_ascii_alphanumeric() || c == ' '));
        }

        #[test]
        fn prop_part_count_is_bounded(seconds in 1u64..10_000_000, parts in 1usize..5) {
            let phrase = TimeDeltaFormatter::new(parts).format(secs(seconds));
            let count = phrase.split(" and ").count();
            prop_assert!(count >= 1 && count <= parts);
        }
    }
}
