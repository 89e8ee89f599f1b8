use super::DoorMonitor;
use crate::config::DriveMode;
use crate::error::{DoorsensorError, Result};
use crate::events::DoorEvent;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::signal;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Time allowed for the detection loop to finish after cancellation
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// System shutdown reason
#[derive(Debug, Clone)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
}

impl DoorMonitor {
    /// Run the detection loop until `cancel` fires.
    ///
    /// One reconciliation cycle runs first so a change made while the daemon
    /// was down is recorded right away. In interrupt mode it runs after the
    /// edge subscription is in place. Failed cycles are reported and the
    /// loop carries on.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        info!("Door monitor running in {:?} mode", self.mode);

        match self.mode {
            DriveMode::Poll => self.run_polling(cancel).await,
            DriveMode::Interrupt => self.run_interrupts(cancel).await,
        }
    }

    async fn run_polling(&self, cancel: CancellationToken) -> Result<()> {
        self.run_cycle_logged().await;

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately and the startup cycle already ran
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.run_cycle_logged().await,
            }
        }

        info!("Polling loop stopped");
        Ok(())
    }

    async fn run_interrupts(&self, cancel: CancellationToken) -> Result<()> {
        let (sender, mut edges) = mpsc::channel(self.edge_queue_capacity);
        self.input
            .subscribe_edges(self.debounce, sender, cancel.child_token())?;
        self.run_cycle_logged().await;

        loop {
            let edge = tokio::select! {
                _ = cancel.cancelled() => break,
                edge = edges.recv() => edge,
            };

            let Some(edge) = edge else {
                warn!("Edge source closed, stopping interrupt loop");
                return Err(DoorsensorError::system("Edge source closed"));
            };

            let _ = self.event_bus.publish(DoorEvent::EdgeDetected {
                level: edge.level,
                timestamp: edge.timestamp,
            });

            // Let the switch settle, then fold queued edges into one cycle
            sleep(self.debounce).await;
            let mut folded = 0;
            while edges.try_recv().is_ok() {
                folded += 1;
            }
            if folded > 0 {
                debug!("Folded {} queued edge(s) into one cycle", folded);
            }

            self.run_cycle_logged().await;
        }

        info!("Interrupt loop stopped");
        Ok(())
    }

    /// Run a cycle, reporting failure instead of propagating it
    pub(super) async fn run_cycle_logged(&self) {
        if let Err(e) = self.cycle().await {
            let _ = self.event_bus.publish(DoorEvent::CycleFailed {
                error: e.to_string(),
                timestamp: SystemTime::now(),
            });
        }
    }

    /// Run until SIGINT or SIGTERM, then stop the loop and return an exit code
    pub async fn run_until_shutdown(self: Arc<Self>) -> Result<i32> {
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        setup_signal_handlers(shutdown_sender);

        let cancel = CancellationToken::new();
        let mut worker = tokio::spawn(Arc::clone(&self).run(cancel.clone()));

        let reason = tokio::select! {
            reason = shutdown_receiver => reason.unwrap_or_else(|_| {
                ShutdownReason::Error("Shutdown channel closed unexpectedly".to_string())
            }),
            finished = &mut worker => {
                let message = match finished {
                    Ok(Ok(())) => "Detection loop ended".to_string(),
                    Ok(Err(e)) => e.to_string(),
                    Err(e) => format!("Detection loop panicked: {}", e),
                };
                error!("{}", message);
                return Ok(1);
            }
        };

        let _ = self.event_bus.publish(DoorEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: format!("{:?}", reason),
        });
        cancel.cancel();

        let exit_code = match timeout(SHUTDOWN_GRACE, worker).await {
            Ok(Ok(Ok(()))) => match reason {
                ShutdownReason::Signal(_) => 0,
                ShutdownReason::Error(_) => 1,
            },
            Ok(Ok(Err(e))) => {
                error!("Detection loop failed during shutdown: {}", e);
                1
            }
            Ok(Err(e)) => {
                error!("Detection loop panicked: {}", e);
                1
            }
            Err(_) => {
                warn!("Detection loop did not stop within {:?}", SHUTDOWN_GRACE);
                1
            }
        };

        info!("Door sensor shutdown complete");
        Ok(exit_code)
    }
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown_sender: oneshot::Sender<ShutdownReason>) {
    let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

    // Handle SIGTERM (systemd stop) - Unix only
    #[cfg(unix)]
    {
        let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    error!("Failed to register SIGTERM handler: {}", e);
                    return;
                }
            };
            if sigterm.recv().await.is_some() {
                info!("Received SIGTERM signal");
                if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                }
            }
        });
    }

    // Handle SIGINT (Ctrl+C) - Cross-platform
    let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
    tokio::spawn(async move {
        if let Ok(()) = signal::ctrl_c().await {
            info!("Received SIGINT signal (Ctrl+C)");
            if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
            }
        }
    });
}
