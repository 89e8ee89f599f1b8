use std::time::{Duration, Instant};

/// Quiet-period filter for switch bounce.
///
/// An edge is accepted when no edge has been accepted during the previous
/// `window`; everything inside the window is dropped.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    pub fn accept(&mut self, now: Instant) -> bool {
        match self.last_accepted {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last_accepted = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_edge_is_accepted() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        assert!(debouncer.accept(Instant::now()));
    }

    #[test]
    fn test_bounce_within_window_is_dropped() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let start = Instant::now();

        assert!(debouncer.accept(start));
        assert!(!debouncer.accept(start + Duration::from_millis(5)));
        assert!(!debouncer.accept(start + Duration::from_millis(99)));
        assert!(debouncer.accept(start + Duration::from_millis(100)));
        assert!(!debouncer.accept(start + Duration::from_millis(150)));
    }

    #[test]
    fn test_zero_window_accepts_everything() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        let now = Instant::now();
        assert!(debouncer.accept(now));
        assert!(debouncer.accept(now));
    }
}
