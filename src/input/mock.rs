use super::{Debouncer, DoorInput, EdgeEvent, PinLevel};
use crate::error::InputError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// In-memory door input for tests and simulation
#[derive(Clone)]
pub struct MockDoorInput {
    inner: Arc<Mutex<MockState>>,
}

struct MockState {
    level: PinLevel,
    fail_reads: bool,
    subscriber: Option<(mpsc::Sender<EdgeEvent>, Debouncer, CancellationToken)>,
}

impl MockDoorInput {
    pub fn new(level: PinLevel) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                level,
                fail_reads: false,
                subscriber: None,
            })),
        }
    }

    /// Change the level without reporting an edge, as a poll-only pin would
    pub fn set_level(&self, level: PinLevel) {
        self.inner.lock().level = level;
    }

    /// Make subsequent reads fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.lock().fail_reads = fail;
    }

    /// Change the level and report an edge through the debouncer.
    /// Returns whether the edge was delivered.
    pub fn trigger_edge(&self, level: PinLevel) -> bool {
        let mut state = self.inner.lock();
        state.level = level;

        let Some((sender, debouncer, cancel)) = state.subscriber.as_mut() else {
            return false;
        };
        if cancel.is_cancelled() {
            return false;
        }
        if !debouncer.accept(Instant::now()) {
            debug!("Mock edge suppressed by debounce");
            return false;
        }

        sender
            .try_send(EdgeEvent {
                level,
                timestamp: SystemTime::now(),
            })
            .is_ok()
    }
}

impl DoorInput for MockDoorInput {
    fn read_level(&self) -> Result<PinLevel, InputError> {
        let state = self.inner.lock();
        if state.fail_reads {
            return Err(InputError::Read {
                pin: 0,
                details: "mock read failure".to_string(),
            });
        }
        Ok(state.level)
    }

    fn subscribe_edges(
        &self,
        debounce: Duration,
        sender: mpsc::Sender<EdgeEvent>,
        cancel: CancellationToken,
    ) -> Result<(), InputError> {
        self.inner.lock().subscriber = Some((sender, Debouncer::new(debounce), cancel));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_level_is_read_back() {
        let input = MockDoorInput::new(PinLevel::High);
        assert_eq!(input.read_level().unwrap(), PinLevel::High);

        input.set_level(PinLevel::Low);
        assert_eq!(input.read_level().unwrap(), PinLevel::Low);

        input.set_fail_reads(true);
        assert!(input.read_level().is_err());
    }

    #[tokio::test]
    async fn test_edges_are_debounced() {
        let input = MockDoorInput::new(PinLevel::High);
        let (tx, mut rx) = mpsc::channel(8);
        input
            .subscribe_edges(Duration::from_secs(60), tx, CancellationToken::new())
            .unwrap();

        assert!(input.trigger_edge(PinLevel::Low));
        assert!(!input.trigger_edge(PinLevel::High));
        assert!(!input.trigger_edge(PinLevel::Low));

        let edge = rx.recv().await.unwrap();
        assert_eq!(edge.level, PinLevel::Low);
        assert!(rx.try_recv().is_err());
        assert_eq!(input.read_level().unwrap(), PinLevel::Low);
    }

    #[test]
    fn test_edge_without_subscriber_only_sets_level() {
        let input = MockDoorInput::new(PinLevel::High);
        assert!(!input.trigger_edge(PinLevel::Low));
        assert_eq!(input.read_level().unwrap(), PinLevel::Low);
    }
}
