//! Outbound notification transports.
//!
//! Notifiers are best effort. The monitor spawns every delivery as its own
//! task under a timeout, so a failing or hung transport never delays the
//! next detection cycle.

mod remctl;
mod zephyr;

pub use remctl::RemctlAlert;
pub use zephyr::ZephyrNotifier;

use crate::config::DoorsensorConfig;
use crate::error::NotifierError;
use crate::record::{DoorState, TransitionRecord};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// A message about one transition as a transport sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub state: DoorState,
    pub class: String,
    pub instance: String,
    pub signature: String,
    pub message: String,
}

impl Notification {
    pub fn door_message(state: DoorState) -> String {
        format!("The door is now {}.", state.label())
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn notify(&self, record: &TransitionRecord) -> Result<(), NotifierError>;
}

/// Build the notifiers enabled in the configuration
pub fn from_config(config: &DoorsensorConfig) -> Vec<Arc<dyn Notifier>> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();

    if config.notify.enabled && !config.notify.zephyrs.is_empty() {
        notifiers.push(Arc::new(ZephyrNotifier::new(
            &config.notify.zwrite_path,
            &config.notify.signature,
            config.notify.zephyrs.clone(),
        )));
    }

    if config.alert.enabled {
        notifiers.push(Arc::new(RemctlAlert::new(
            &config.alert.remctl_path,
            &config.alert.host,
            config.alert.command.clone(),
            config.alert.on_state,
        )));
    }

    notifiers
}

/// Run an external program to completion, mapping spawn failures and
/// non-zero exits to `NotifierError`. The child is killed if the future is
/// dropped, which is how the caller's timeout ends a hung delivery.
pub(crate) async fn run_command(
    notifier: &str,
    program: &str,
    args: &[String],
) -> Result<(), NotifierError> {
    debug!("{}: running {} {:?}", notifier, program, args);

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| NotifierError::Spawn {
            notifier: notifier.to_string(),
            program: program.to_string(),
            details: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(NotifierError::ExitStatus {
            notifier: notifier.to_string(),
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}
