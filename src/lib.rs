pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod history;
pub mod input;
pub mod monitor;
pub mod notify;
pub mod record;
pub mod time_delta;

pub use config::{DoorsensorConfig, DriveMode};
pub use detector::{Evaluation, TransitionDetector};
pub use error::{DoorsensorError, InputError, NotifierError, ParseError, Result};
pub use events::{DoorEvent, EventBus};
pub use history::{HistoryStore, LOG_HEADER};
pub use input::{Debouncer, DoorInput, EdgeEvent, MockDoorInput, PinLevel, SysfsGpio};
pub use monitor::{CycleOutcome, DoorMonitor, DoorMonitorBuilder, ShutdownReason};
pub use notify::{Notification, Notifier, RemctlAlert, ZephyrNotifier};
pub use record::{DoorState, LogCodec, TransitionRecord, DATE_FORMAT};
pub use time_delta::{TimeDeltaFormatter, DEFAULT_DESIRED_PARTS};
