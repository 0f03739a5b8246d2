use crate::error::CollectorError;
use log::{debug, info, warn};
use std::fs::{self, File, Metadata};
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How often the "waiting for file" notice is repeated
const WAIT_NOTICE_INTERVAL: Duration = Duration::from_secs(2);

/// Longest line kept; longer lines are dropped whole
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Follows a live access log by name, like `tail -F -n 0`
///
/// The first attach starts at end-of-file so old entries are never replayed.
/// When the file is truncated the reader rewinds to the start; when it is
/// rotated (replaced by a new file under the same name) the tailer reopens
/// it and reads the new file from the beginning. A missing file is waited
/// for, not treated as an error.
///
/// Iterating blocks until a complete line is available and ends once the
/// shared running flag is cleared.
pub struct LogTailer {
    /// Path followed by name
    path: PathBuf,
    /// Sleep between polls when no data is available
    poll_interval: Duration,
    /// Cleared by the signal handler to stop iteration
    running: Arc<AtomicBool>,
    /// Open handle, `None` until the file exists
    reader: Option<BufReader<File>>,
    /// Identity of the open handle, for rotation detection
    identity: Option<FileIdentity>,
    /// Byte offset of the reader in the open file
    position: u64,
    /// Bytes of a line whose newline has not arrived yet
    pending: Vec<u8>,
    /// Lines longer than this many bytes are discarded
    max_line_length: usize,
    /// Inside an overlong line, dropping bytes up to its newline
    skipping_long_line: bool,
    /// Whether the file was attached at least once
    attached_once: bool,
    last_wait_notice: Option<Instant>,
}

/// Device and inode pair identifying a file independent of its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(meta: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(_meta: &Metadata) -> Option<Self> {
        None
    }
}

impl LogTailer {
    /// Create a tailer for `path`
    ///
    /// Nothing is opened until the first poll.
    ///
    /// # Arguments
    ///
    /// * `path` - Access log to follow
    /// * `poll_interval` - Delay between checks when no new data is available
    /// * `running` - Shared flag; iteration stops once it is `false`
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration, running: Arc<AtomicBool>) -> Self {
        Self {
            path: path.into(),
            poll_interval,
            running,
            reader: None,
            identity: None,
            position: 0,
            pending: Vec::new(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            skipping_long_line: false,
            attached_once: false,
            last_wait_notice: None,
        }
    }

    /// Limit the length of a single line
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length.max(1);
        self
    }

    /// Path being followed
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the tailer is still allowed to pull lines
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the tailer to stop at the next poll
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Make one non-blocking attempt to read a complete line
    ///
    /// Returns `Ok(None)` when no complete line is available yet, including
    /// while the file does not exist. Rotation and truncation are handled
    /// here when the reader reaches end-of-file.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::IoError` for failures other than the file
    /// being absent.
    pub fn poll_line(&mut self) -> Result<Option<String>, CollectorError> {
        if self.reader.is_none() && !self.attach()? {
            return Ok(None);
        }

        // Never buffer more than one byte past the line limit
        let limit = (self.max_line_length + 1).saturating_sub(self.pending.len()) as u64;
        let read = match self.reader.as_mut() {
            Some(reader) => reader.take(limit).read_until(b'\n', &mut self.pending)?,
            None => return Ok(None),
        };
        self.position += read as u64;

        if self.pending.last() == Some(&b'\n') {
            let raw = std::mem::take(&mut self.pending);
            if self.skipping_long_line {
                self.skipping_long_line = false;
                return Ok(None);
            }
            let line = String::from_utf8_lossy(&raw);
            return Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()));
        }

        if self.pending.len() > self.max_line_length {
            if !self.skipping_long_line {
                warn!(
                    "Discarding line longer than {} bytes in {}",
                    self.max_line_length,
                    self.path.display()
                );
            }
            self.pending.clear();
            self.skipping_long_line = true;
            return Ok(None);
        }

        if read == 0 {
            self.check_replaced()?;
        }

        Ok(None)
    }

    /// Open the file if it exists
    ///
    /// The first attach seeks to the end; later attaches (after rotation)
    /// read from the start.
    fn attach(&mut self) -> Result<bool, CollectorError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.notice_waiting();
                return Ok(false);
            }
            Err(e) => return Err(CollectorError::IoError(e)),
        };

        let meta = file.metadata()?;
        let mut reader = BufReader::new(file);
        self.position = if self.attached_once {
            0
        } else {
            reader.seek(SeekFrom::End(0))?
        };

        if !self.attached_once {
            info!("Log file found, now monitoring new entries in {}", self.path.display());
        } else {
            info!("Reattached to {} after rotation", self.path.display());
        }

        self.identity = FileIdentity::of(&meta);
        self.reader = Some(reader);
        self.pending.clear();
        self.attached_once = true;
        self.last_wait_notice = None;
        Ok(true)
    }

    /// Detect truncation or rotation once the open handle is drained
    fn check_replaced(&mut self) -> Result<(), CollectorError> {
        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            // Renamed away; keep the old handle until a new file shows up
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(CollectorError::IoError(e)),
        };

        let identity = FileIdentity::of(&meta);
        if identity != self.identity {
            info!("Detected rotation of {}", self.path.display());
            self.discard_pending();
            self.reader = None;
            self.identity = None;
            self.attach()?;
            return Ok(());
        }

        if meta.len() < self.position {
            warn!(
                "{} was truncated ({} < {} bytes), rewinding",
                self.path.display(),
                meta.len(),
                self.position
            );
            self.discard_pending();
            if let Some(reader) = self.reader.as_mut() {
                reader.seek(SeekFrom::Start(0))?;
            }
            self.position = 0;
        }

        Ok(())
    }

    fn discard_pending(&mut self) {
        self.skipping_long_line = false;
        if !self.pending.is_empty() {
            debug!(
                "Discarding {} bytes of unterminated line from replaced file",
                self.pending.len()
            );
            self.pending.clear();
        }
    }

    fn notice_waiting(&mut self) {
        let due = self
            .last_wait_notice
            .map_or(true, |at| at.elapsed() >= WAIT_NOTICE_INTERVAL);
        if due {
            info!("Waiting for {}...", self.path.display());
            self.last_wait_notice = Some(Instant::now());
        }
    }
}

impl Iterator for LogTailer {
    type Item = Result<String, CollectorError>;

    /// Block until the next complete line, `None` once stopped
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if !self.is_running() {
                debug!("Stopping log tailer due to shutdown signal");
                return None;
            }

            match self.poll_line() {
                Ok(Some(line)) => return Some(Ok(line)),
                Ok(None) => thread::sleep(self.poll_interval),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
