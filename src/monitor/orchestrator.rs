use crate::config::{DoorsensorConfig, DriveMode};
use crate::detector::{Evaluation, TransitionDetector};
use crate::error::{DoorsensorError, NotifierError, Result};
use crate::events::{DoorEvent, EventBus};
use crate::history::HistoryStore;
use crate::input::{DoorInput, PinLevel};
use crate::notify::{self, Notifier};
use crate::record::{DoorState, LogCodec, TransitionRecord};
use crate::time_delta::TimeDeltaFormatter;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Result of one detection cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The reading matched the last record
    Unchanged(DoorState),
    /// A transition was appended
    Recorded(TransitionRecord),
}

/// Wires the door input, detector, history log and notifiers together
pub struct DoorMonitor {
    pub(super) input: Arc<dyn DoorInput>,
    store: HistoryStore,
    codec: LogCodec,
    detector: TransitionDetector,
    notifiers: Vec<Arc<dyn Notifier>>,
    pub(super) event_bus: Arc<EventBus>,
    open_level: PinLevel,
    notify_timeout: Duration,
    pub(super) mode: DriveMode,
    pub(super) debounce: Duration,
    pub(super) poll_interval: Duration,
    pub(super) edge_queue_capacity: usize,
    cycle_lock: Mutex<()>,
}

impl DoorMonitor {
    pub fn builder() -> DoorMonitorBuilder {
        DoorMonitorBuilder::default()
    }

    /// Build a monitor from configuration with the given hardware input
    pub fn from_config(config: &DoorsensorConfig, input: Arc<dyn DoorInput>) -> Result<Self> {
        let timezone = config.timezone()?;

        Self::builder()
            .with_input(input)
            .with_store(HistoryStore::new(&config.log.path))
            .with_codec(LogCodec::new(timezone))
            .with_formatter(TimeDeltaFormatter::new(config.log.duration_parts))
            .with_notifiers(notify::from_config(config))
            .with_event_bus(Arc::new(EventBus::new(config.system.event_bus_capacity)))
            .with_open_level(config.sensor.open_level)
            .with_notify_timeout(config.notify_timeout())
            .with_mode(config.sensor.mode)
            .with_debounce(config.debounce())
            .with_poll_interval(config.poll_interval())
            .with_edge_queue_capacity(config.system.edge_queue_capacity)
            .build()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Read the pin and map it to a door state
    pub fn current_state(&self) -> Result<DoorState> {
        let level = self.input.read_level()?;
        Ok(DoorState::from_level(level, self.open_level))
    }

    /// Last durable record, decoded. A corrupt last line is an error, not a fresh start.
    pub async fn last_record(&self) -> Result<Option<TransitionRecord>> {
        match self.store.read_last().await? {
            Some(line) => Ok(Some(self.codec.decode(&line)?)),
            None => Ok(None),
        }
    }

    /// Run one detection cycle.
    ///
    /// Reading the last record, evaluating and appending happen under the
    /// monitor's lock, so overlapping calls can never append the same
    /// transition twice. Notifications are dispatched even when the append
    /// fails.
    pub async fn cycle(&self) -> Result<CycleOutcome> {
        let _guard = self.cycle_lock.lock().await;

        let reading = self.current_state()?;
        let last = self.last_record().await?;

        let record = match self.detector.evaluate(reading, last.as_ref(), Utc::now())? {
            Evaluation::NoChange => {
                debug!("Door still {}, nothing to record", reading);
                return Ok(CycleOutcome::Unchanged(reading));
            }
            Evaluation::NewRecord(record) => record,
        };

        let line = self.codec.encode(&record);
        let appended = self.store.append(&line).await;
        self.dispatch(&record);
        appended?;

        let _ = self.event_bus.publish(DoorEvent::TransitionRecorded {
            record: record.clone(),
        });
        Ok(CycleOutcome::Recorded(record))
    }

    /// Spawn one bounded delivery task per notifier
    pub(super) fn dispatch(&self, record: &TransitionRecord) -> Vec<JoinHandle<()>> {
        self.notifiers
            .iter()
            .map(|notifier| {
                let notifier = Arc::clone(notifier);
                let record = record.clone();
                let event_bus = Arc::clone(&self.event_bus);
                let limit = self.notify_timeout;

                tokio::spawn(async move {
                    let error = match timeout(limit, notifier.notify(&record)).await {
                        Ok(Ok(())) => {
                            debug!("{} notified of door {}", notifier.name(), record.state);
                            return;
                        }
                        Ok(Err(e)) => e.to_string(),
                        Err(_) => NotifierError::Timeout {
                            notifier: notifier.name().to_string(),
                            limit,
                        }
                        .to_string(),
                    };

                    let _ = event_bus.publish(DoorEvent::NotificationFailed {
                        notifier: notifier.name().to_string(),
                        error,
                    });
                })
            })
            .collect()
    }
}

/// Builder for [`DoorMonitor`]; the input and the history store are required
pub struct DoorMonitorBuilder {
    input: Option<Arc<dyn DoorInput>>,
    store: Option<HistoryStore>,
    codec: LogCodec,
    formatter: TimeDeltaFormatter,
    notifiers: Vec<Arc<dyn Notifier>>,
    event_bus: Option<Arc<EventBus>>,
    open_level: PinLevel,
    notify_timeout: Duration,
    mode: DriveMode,
    debounce: Duration,
    poll_interval: Duration,
    edge_queue_capacity: usize,
}

impl Default for DoorMonitorBuilder {
    fn default() -> Self {
        let defaults = DoorsensorConfig::default();
        Self {
            input: None,
            store: None,
            codec: LogCodec::new(chrono_tz::America::New_York),
            formatter: TimeDeltaFormatter::default(),
            notifiers: Vec::new(),
            event_bus: None,
            open_level: defaults.sensor.open_level,
            notify_timeout: defaults.notify_timeout(),
            mode: defaults.sensor.mode,
            debounce: defaults.debounce(),
            poll_interval: defaults.poll_interval(),
            edge_queue_capacity: defaults.system.edge_queue_capacity,
        }
    }
}

impl DoorMonitorBuilder {
    pub fn with_input(mut self, input: Arc<dyn DoorInput>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_store(mut self, store: HistoryStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_codec(mut self, codec: LogCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_formatter(mut self, formatter: TimeDeltaFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_notifiers(mut self, notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        self.notifiers = notifiers;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_open_level(mut self, level: PinLevel) -> Self {
        self.open_level = level;
        self
    }

    pub fn with_notify_timeout(mut self, limit: Duration) -> Self {
        self.notify_timeout = limit;
        self
    }

    pub fn with_mode(mut self, mode: DriveMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_edge_queue_capacity(mut self, capacity: usize) -> Self {
        self.edge_queue_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<DoorMonitor> {
        let input = self
            .input
            .ok_or_else(|| DoorsensorError::system("Door monitor requires an input"))?;
        let store = self
            .store
            .ok_or_else(|| DoorsensorError::system("Door monitor requires a history store"))?;

        if self.notifiers.is_empty() {
            warn!("No notifiers configured; transitions will only be logged");
        }
        info!(
            "Door monitor using {} in {:?} mode with {} notifier(s)",
            store.path().display(),
            self.mode,
            self.notifiers.len()
        );

        Ok(DoorMonitor {
            input,
            store,
            codec: self.codec,
            detector: TransitionDetector::new(self.formatter),
            notifiers: self.notifiers,
            event_bus: self.event_bus.unwrap_or_else(|| Arc::new(EventBus::new(100))),
            open_level: self.open_level,
            notify_timeout: self.notify_timeout,
            mode: self.mode,
            debounce: self.debounce,
            poll_interval: self.poll_interval,
            edge_queue_capacity: self.edge_queue_capacity,
            cycle_lock: Mutex::new(()),
        })
    }
}
