mod debounce;
mod mock;
mod sysfs;

pub use debounce::Debouncer;
pub use mock::MockDoorInput;
pub use sysfs::{SysfsGpio, DEFAULT_SYSFS_ROOT};

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Raw electrical level of the sensor pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinLevel {
    Low,
    High,
}

impl PinLevel {
    pub fn parse(value: &str) -> Result<Self, InputError> {
        match value.trim() {
            "0" => Ok(PinLevel::Low),
            "1" => Ok(PinLevel::High),
            other => Err(InputError::InvalidValue(other.to_string())),
        }
    }
}

/// A debounced edge reported by the hardware input
#[derive(Debug, Clone, Copy)]
pub struct EdgeEvent {
    pub level: PinLevel,
    pub timestamp: SystemTime,
}

/// Hardware capability for reading the door switch
pub trait DoorInput: Send + Sync {
    /// Read the current pin level
    fn read_level(&self) -> Result<PinLevel, InputError>;

    /// Start delivering edges onto `sender`, suppressing edges that arrive
    /// within `debounce` of the last accepted one. Delivery stops when
    /// `cancel` fires or the receiver is dropped.
    fn subscribe_edges(
        &self,
        debounce: Duration,
        sender: mpsc::Sender<EdgeEvent>,
        cancel: CancellationToken,
    ) -> Result<(), InputError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(PinLevel::parse("0\n").unwrap(), PinLevel::Low);
        assert_eq!(PinLevel::parse("1").unwrap(), PinLevel::High);
        assert!(matches!(
            PinLevel::parse("x"),
            Err(InputError::InvalidValue(v)) if v == "x"
        ));
    }
}
