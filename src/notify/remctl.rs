use super::{run_command, Notifier};
use crate::error::NotifierError;
use crate::record::{DoorState, TransitionRecord};
use async_trait::async_trait;
use tracing::debug;

/// Triggers a remote alert with `remctl <host> <command...>` when the door
/// enters a given state
pub struct RemctlAlert {
    remctl_path: String,
    host: String,
    command: Vec<String>,
    on_state: DoorState,
}

impl RemctlAlert {
    pub fn new(remctl_path: &str, host: &str, command: Vec<String>, on_state: DoorState) -> Self {
        Self {
            remctl_path: remctl_path.to_string(),
            host: host.to_string(),
            command,
            on_state,
        }
    }

    pub fn should_alert(&self, record: &TransitionRecord) -> bool {
        record.state == self.on_state
    }

    pub fn remctl_args(&self) -> Vec<String> {
        std::iter::once(self.host.clone())
            .chain(self.command.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl Notifier for RemctlAlert {
    fn name(&self) -> &str {
        "remctl"
    }

    async fn notify(&self, record: &TransitionRecord) -> Result<(), NotifierError> {
        if !self.should_alert(record) {
            debug!("No alert for transition to {}", record.state);
            return Ok(());
        }
        run_command(self.name(), &self.remctl_path, &self.remctl_args()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_args_and_state_filter() {
        let alert = RemctlAlert::new(
            "/usr/bin/remctl",
            "alerts.example.org",
            vec!["alert".to_string()],
            DoorState::Open,
        );

        assert_eq!(alert.remctl_args(), vec!["alerts.example.org", "alert"]);
        assert!(alert.should_alert(&TransitionRecord::new(DoorState::Open, Utc::now(), "")));
        assert!(!alert.should_alert(&TransitionRecord::new(DoorState::Closed, Utc::now(), "")));
    }

    #[tokio::test]
    async fn test_other_state_skips_command() {
        let alert = RemctlAlert::new(
            "/nonexistent/remctl",
            "alerts.example.org",
            vec!["alert".to_string()],
            DoorState::Open,
        );

        // Would fail to spawn if it ran
        let record = TransitionRecord::new(DoorState::Closed, Utc::now(), "");
        alert.notify(&record).await.unwrap();

        let record = TransitionRecord::new(DoorState::Open, Utc::now(), "");
        assert!(alert.notify(&record).await.is_err());
    }
}
