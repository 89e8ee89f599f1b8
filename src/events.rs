use crate::error::EventBusError;
use crate::input::PinLevel;
use crate::record::TransitionRecord;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur in the door sensor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DoorEvent {
    /// A debounced edge arrived from the input
    EdgeDetected {
        level: PinLevel,
        timestamp: SystemTime,
    },
    /// A transition was appended to the history log
    TransitionRecorded { record: TransitionRecord },
    /// A detection cycle failed; the next cycle retries
    CycleFailed { error: String, timestamp: SystemTime },
    /// A notifier could not deliver a transition
    NotificationFailed { notifier: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl DoorEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            DoorEvent::EdgeDetected { level, .. } => format!("Edge detected, pin {:?}", level),
            DoorEvent::TransitionRecorded { record } => {
                if record.duration_in_previous_state.is_empty() {
                    format!("Door {}", record.state)
                } else {
                    format!(
                        "Door {} after {}",
                        record.state, record.duration_in_previous_state
                    )
                }
            }
            DoorEvent::CycleFailed { error, .. } => format!("Cycle failed: {}", error),
            DoorEvent::NotificationFailed { notifier, error } => {
                format!("Notification via {} failed: {}", notifier, error)
            }
            DoorEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            DoorEvent::EdgeDetected { .. } => "edge_detected",
            DoorEvent::TransitionRecorded { .. } => "transition_recorded",
            DoorEvent::CycleFailed { .. } => "cycle_failed",
            DoorEvent::NotificationFailed { .. } => "notification_failed",
            DoorEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Broadcast bus for door events
pub struct EventBus {
    sender: broadcast::Sender<DoorEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<DoorEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers.
    ///
    /// Publishing with no subscribers is not an error for the door sensor;
    /// it returns `Ok(0)`.
    pub fn publish(&self, event: DoorEvent) -> Result<usize, EventBusError> {
        match &event {
            DoorEvent::TransitionRecorded { .. } => info!("{}", event.description()),
            DoorEvent::CycleFailed { error, .. } => error!("Door cycle failed: {}", error),
            DoorEvent::NotificationFailed { .. } => warn!("{}", event.description()),
            DoorEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason)
            }
            DoorEvent::EdgeDetected { .. } => debug!("{}", event.description()),
        }

        if self.sender.receiver_count() == 0 {
            return Ok(0);
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
