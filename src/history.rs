use crate::error::{DoorsensorError, Result};
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info};

/// Comment block written once at the top of a new log
pub const LOG_HEADER: &str = "# Log file for door sensor\n\
# Lines are appended on every change of door state\n\
# Format: new state, seconds since epoch, human-readable new state, human readable time, time spent in previous state\n";

/// Bytes read per step when scanning backwards for the last record
const TAIL_CHUNK: u64 = 4096;

/// Append-only door history on disk
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

enum TailScan {
    Found(String),
    NeedMore,
    Exhausted,
}

impl HistoryStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the last record line, or `None` for a missing, empty or header-only log
    pub async fn read_last(&self) -> Result<Option<String>> {
        let mut file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("History log {} does not exist yet", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(self.error(e)),
        };

        let len = file.metadata().await.map_err(|e| self.error(e))?.len();
        let mut end = len;
        let mut tail: Vec<u8> = Vec::new();

        while end > 0 {
            let start = end.saturating_sub(TAIL_CHUNK);
            let mut chunk = vec![0u8; (end - start) as usize];
            file.seek(SeekFrom::Start(start))
                .await
                .map_err(|e| self.error(e))?;
            file.read_exact(&mut chunk)
                .await
                .map_err(|e| self.error(e))?;

            chunk.extend_from_slice(&tail);
            tail = chunk;

            match scan_tail(&tail, start == 0) {
                TailScan::Found(line) => return Ok(Some(line)),
                TailScan::Exhausted => return Ok(None),
                TailScan::NeedMore => end = start,
            }
        }

        Ok(None)
    }

    /// Append one encoded line, writing the header first if the log is empty.
    ///
    /// Header and line go out in a single write so a failure cannot leave a
    /// header without its record or half a record.
    pub async fn append(&self, line: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.error(e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.error(e))?;

        let is_new = file.metadata().await.map_err(|e| self.error(e))?.len() == 0;

        let mut buffer = String::with_capacity(LOG_HEADER.len() + line.len() + 1);
        if is_new {
            info!("Initializing history log {}", self.path.display());
            buffer.push_str(LOG_HEADER);
        }
        buffer.push_str(line);
        if !line.ends_with('\n') {
            buffer.push('\n');
        }

        file.write_all(buffer.as_bytes())
            .await
            .map_err(|e| self.error(e))?;
        file.flush().await.map_err(|e| self.error(e))?;
        file.sync_data().await.map_err(|e| self.error(e))?;

        debug!("Appended {} bytes to {}", buffer.len(), self.path.display());
        Ok(())
    }

    fn error(&self, source: std::io::Error) -> DoorsensorError {
        DoorsensorError::history(&self.path, source)
    }
}

/// Look for the last record line in `tail`, which ends at end of file.
/// `complete` is set once `tail` also starts at the beginning of the file.
fn scan_tail(tail: &[u8], complete: bool) -> TailScan {
    let segments: Vec<&[u8]> = tail.split(|&b| b == b'\n').collect();

    for (index, segment) in segments.iter().enumerate().rev() {
        // The first segment may be cut mid-line unless we reached the file start
        if index == 0 && !complete {
            return TailScan::NeedMore;
        }

        let text = String::from_utf8_lossy(segment);
        let text = text.trim_end_matches('\r');
        if text.trim().is_empty() || text.starts_with('#') {
            continue;
        }
        return TailScan::Found(text.to_string());
    }

    TailScan::Exhausted
}
