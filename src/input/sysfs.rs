//! Door switch on a Linux sysfs GPIO line.
//!
//! The pin is exported through `<root>/export` if needed and configured as an
//! input with interrupts on both edges. Edge delivery blocks in `poll(2)` on
//! the `value` file (`POLLPRI`) on a dedicated thread, so the async side only
//! ever sees debounced `EdgeEvent`s on its queue.
//!
//! Pins use the kernel's GPIO numbering. Pull resistors cannot be set from
//! sysfs and must come from the device tree or external wiring.

use super::{Debouncer, DoorInput, EdgeEvent, PinLevel};
use crate::error::InputError;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";

/// Timeout of a single poll so cancellation is noticed promptly
const POLL_TIMEOUT_MS: libc::c_int = 500;

/// Time allowed for udev to make a freshly exported pin writable
const EXPORT_SETTLE: Duration = Duration::from_millis(50);
const EXPORT_ATTEMPTS: u32 = 20;

pub struct SysfsGpio {
    pin: u32,
    pin_dir: PathBuf,
}

impl SysfsGpio {
    /// Open a pin under the standard sysfs root
    pub fn open(pin: u32) -> Result<Self, InputError> {
        Self::open_at(DEFAULT_SYSFS_ROOT, pin)
    }

    /// Open a pin under an arbitrary sysfs GPIO root
    pub fn open_at<P: AsRef<Path>>(root: P, pin: u32) -> Result<Self, InputError> {
        let root = root.as_ref();
        let pin_dir = root.join(format!("gpio{}", pin));

        if !pin_dir.exists() {
            info!("Exporting GPIO {} via {}", pin, root.display());
            fs::write(root.join("export"), pin.to_string()).map_err(|e| InputError::Export {
                pin,
                details: e.to_string(),
            })?;
        }

        let gpio = Self { pin, pin_dir };
        gpio.write_attribute("direction", "in")?;

        info!("GPIO {} configured as input", pin);
        Ok(gpio)
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    fn value_path(&self) -> PathBuf {
        self.pin_dir.join("value")
    }

    /// Write a pin attribute, retrying while a fresh export is still being set up
    fn write_attribute(&self, name: &str, value: &str) -> Result<(), InputError> {
        let path = self.pin_dir.join(name);
        let mut attempt = 0;

        loop {
            match fs::write(&path, value) {
                Ok(()) => return Ok(()),
                Err(e)
                    if attempt < EXPORT_ATTEMPTS
                        && matches!(
                            e.kind(),
                            io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound
                        ) =>
                {
                    attempt += 1;
                    std::thread::sleep(EXPORT_SETTLE);
                }
                Err(e) => {
                    return Err(InputError::Configure {
                        pin: self.pin,
                        details: format!("{}={}: {}", path.display(), value, e),
                    })
                }
            }
        }
    }
}

impl DoorInput for SysfsGpio {
    fn read_level(&self) -> Result<PinLevel, InputError> {
        let raw = fs::read_to_string(self.value_path()).map_err(|e| InputError::Read {
            pin: self.pin,
            details: e.to_string(),
        })?;
        PinLevel::parse(&raw)
    }

    fn subscribe_edges(
        &self,
        debounce: Duration,
        sender: mpsc::Sender<EdgeEvent>,
        cancel: CancellationToken,
    ) -> Result<(), InputError> {
        self.write_attribute("edge", "both")?;

        let file = File::open(self.value_path()).map_err(|e| InputError::Read {
            pin: self.pin,
            details: e.to_string(),
        })?;

        let pin = self.pin;
        std::thread::Builder::new()
            .name(format!("gpio{}-edges", pin))
            .spawn(move || watch_edges(pin, file, Debouncer::new(debounce), sender, cancel))
            .map_err(|e| InputError::Configure {
                pin,
                details: format!("failed to start edge watcher: {}", e),
            })?;

        debug!("Edge watcher started for GPIO {} (debounce {:?})", pin, debounce);
        Ok(())
    }
}

fn read_value(file: &mut File) -> io::Result<String> {
    let mut buf = [0u8; 8];
    file.seek(SeekFrom::Start(0))?;
    let n = file.read(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

fn watch_edges(
    pin: u32,
    mut file: File,
    mut debouncer: Debouncer,
    sender: mpsc::Sender<EdgeEvent>,
    cancel: CancellationToken,
) {
    // Consume the initial pending state so the first poll waits for a real edge
    if let Err(e) = read_value(&mut file) {
        warn!("Initial read of GPIO {} failed: {}", pin, e);
    }

    while !cancel.is_cancelled() {
        let mut fds = libc::pollfd {
            fd: file.as_raw_fd(),
            events: libc::POLLPRI | libc::POLLERR,
            revents: 0,
        };

        // SAFETY: `fds` is a single valid pollfd that outlives the call.
        let rc = unsafe { libc::poll(&mut fds, 1, POLL_TIMEOUT_MS) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            error!("poll on GPIO {} failed: {}", pin, err);
            break;
        }
        if rc == 0 {
            continue;
        }

        let level = match read_value(&mut file).map_err(|e| e.to_string()).and_then(|raw| {
            PinLevel::parse(&raw).map_err(|e| e.to_string())
        }) {
            Ok(level) => level,
            Err(e) => {
                warn!("Failed to read GPIO {} after edge: {}", pin, e);
                continue;
            }
        };

        if !debouncer.accept(Instant::now()) {
            trace!("GPIO {} edge suppressed by debounce", pin);
            continue;
        }

        debug!("GPIO {} edge, level now {:?}", pin, level);
        let event = EdgeEvent {
            level,
            timestamp: SystemTime::now(),
        };
        if sender.blocking_send(event).is_err() {
            debug!("Edge receiver for GPIO {} dropped", pin);
            break;
        }
    }

    info!("Edge watcher for GPIO {} stopped", pin);
}
