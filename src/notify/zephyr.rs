use super::{run_command, Notification, Notifier};
use crate::config::ZephyrTarget;
use crate::error::NotifierError;
use crate::record::TransitionRecord;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Broadcasts transitions as zephyrgrams through `zwrite`
pub struct ZephyrNotifier {
    zwrite_path: String,
    signature: String,
    targets: Vec<ZephyrTarget>,
}

impl ZephyrNotifier {
    pub fn new(zwrite_path: &str, signature: &str, targets: Vec<ZephyrTarget>) -> Self {
        Self {
            zwrite_path: zwrite_path.to_string(),
            signature: signature.to_string(),
            targets,
        }
    }

    /// One notification per configured target
    pub fn notifications(&self, record: &TransitionRecord) -> Vec<Notification> {
        self.targets
            .iter()
            .map(|target| Notification {
                state: record.state,
                class: target.class.clone(),
                instance: target
                    .instance
                    .clone()
                    .unwrap_or_else(|| record.state.label().to_string()),
                signature: self.signature.clone(),
                message: Notification::door_message(record.state),
            })
            .collect()
    }

    pub fn zwrite_args(notification: &Notification) -> Vec<String> {
        vec![
            "-c".to_string(),
            notification.class.clone(),
            "-i".to_string(),
            notification.instance.clone(),
            "-s".to_string(),
            notification.signature.clone(),
            "-m".to_string(),
            notification.message.clone(),
        ]
    }
}

#[async_trait]
impl Notifier for ZephyrNotifier {
    fn name(&self) -> &str {
        "zephyr"
    }

    /// Sends to every target; the first failure is reported after all
    /// targets have been attempted
    async fn notify(&self, record: &TransitionRecord) -> Result<(), NotifierError> {
        let mut first_error = None;

        for notification in self.notifications(record) {
            let args = Self::zwrite_args(&notification);
            match run_command(self.name(), &self.zwrite_path, &args).await {
                Ok(()) => debug!(
                    "Zephyr for door {} sent to -c {} -i {}",
                    notification.state, notification.class, notification.instance
                ),
                Err(e) => {
                    warn!(
                        "Zephyr for door {} to -c {} -i {} failed: {}",
                        notification.state, notification.class, notification.instance, e
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DoorState;
    use chrono::Utc;

    fn default_targets() -> Vec<ZephyrTarget> {
        vec![
            ZephyrTarget {
                class: "sipb-auto".to_string(),
                instance: Some("door".to_string()),
            },
            ZephyrTarget {
                class: "sipb-door".to_string(),
                instance: None,
            },
        ]
    }

    #[test]
    fn test_notifications_per_target() {
        let notifier = ZephyrNotifier::new("/usr/bin/zwrite", "SIPB Door", default_targets());
        let record = TransitionRecord::new(DoorState::Open, Utc::now(), "3 minutes");

        let notifications = notifier.notifications(&record);
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].instance, "door");
        assert_eq!(notifications[1].class, "sipb-door");
        assert_eq!(notifications[1].instance, "open");
        assert!(notifications.iter().all(|n| n.state == DoorState::Open
            && n.message == "The door is now open."
            && n.signature == "SIPB Door"));
    }

    #[test]
    fn test_zwrite_args() {
        let notification = Notification {
            state: DoorState::Closed,
            class: "sipb-auto".to_string(),
            instance: "door".to_string(),
            signature: "SIPB Door".to_string(),
            message: "The door is now closed.".to_string(),
        };

        assert_eq!(
            ZephyrNotifier::zwrite_args(&notification),
            vec![
                "-c",
                "sipb-auto",
                "-i",
                "door",
                "-s",
                "SIPB Door",
                "-m",
                "The door is now closed."
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_zwrite_is_reported() {
        let notifier = ZephyrNotifier::new("/nonexistent/zwrite", "SIPB Door", default_targets());
        let record = TransitionRecord::new(DoorState::Closed, Utc::now(), "");

        let err = notifier.notify(&record).await.unwrap_err();
        assert!(matches!(err, NotifierError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_successful_program_is_ok() {
        // `true` ignores its arguments and exits 0
        let notifier = ZephyrNotifier::new("true", "SIPB Door", default_targets());
        let record = TransitionRecord::new(DoorState::Closed, Utc::now(), "");
        notifier.notify(&record).await.unwrap();
    }
}
