mod orchestrator;
mod runtime;


pub use orchestrator::{CycleOutcome, DoorMonitor, DoorMonitorBuilder};
pub use runtime::ShutdownReason;
