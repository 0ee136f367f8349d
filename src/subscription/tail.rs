//! Asynchronous JSONL tail subscription with file rotation detection

use super::{trim_line, Subscription, SubscriptionError};
use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::time::sleep;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

/// Follows a newline-delimited file, one payload per line
///
/// Partial trailing lines are held back until their newline arrives. A
/// replaced file (inode change) or a truncated file is reopened and read from
/// its beginning.
pub struct JsonlTailSubscription {
    path: PathBuf,
    file: Option<BufReader<File>>,
    inode: Option<u64>,
    position: u64,
    pending: Vec<u8>,
    from_beginning: bool,
    poll_interval: Duration,
}

impl JsonlTailSubscription {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            inode: None,
            position: 0,
            pending: Vec::new(),
            from_beginning: false,
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Replay lines already in the file instead of only following new ones
    pub fn from_beginning(mut self) -> Self {
        self.from_beginning = true;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Open the file (seeks to end unless reading from the beginning)
    pub async fn start(&mut self) -> std::io::Result<()> {
        let from_beginning = self.from_beginning;
        self.open(from_beginning).await
    }

    async fn open(&mut self, from_beginning: bool) -> std::io::Result<()> {
        let file = File::open(&self.path).await?;
        let metadata = file.metadata().await?;

        #[cfg(unix)]
        {
            self.inode = Some(metadata.ino());
        }

        let mut reader = BufReader::new(file);
        self.position = if from_beginning {
            0
        } else {
            reader.seek(SeekFrom::End(0)).await?
        };
        self.pending.clear();
        self.file = Some(reader);

        log::info!("📖 Started tailing: {} (offset {})", self.path.display(), self.position);
        Ok(())
    }

    /// Detect if the file has been replaced (inode changed) or truncated
    async fn detect_rotation(&self) -> std::io::Result<bool> {
        let metadata = tokio::fs::metadata(&self.path).await?;

        if metadata.len() < self.position {
            return Ok(true);
        }

        #[cfg(unix)]
        {
            let current_inode = metadata.ino();
            Ok(self.inode.map_or(false, |old| old != current_inode))
        }

        #[cfg(not(unix))]
        {
            Ok(false)
        }
    }
}

#[async_trait]
impl Subscription for JsonlTailSubscription {
    async fn next(&mut self) -> Result<Option<Vec<u8>>, SubscriptionError> {
        if self.file.is_none() {
            self.start().await?;
        }

        loop {
            if let Some(ref mut reader) = self.file {
                let n = reader.read_until(b'\n', &mut self.pending).await?;
                self.position += n as u64;

                if self.pending.ends_with(b"\n") {
                    let line = trim_line(&self.pending).to_vec();
                    self.pending.clear();
                    if !line.is_empty() {
                        return Ok(Some(line));
                    }
                    continue;
                }

                if n > 0 {
                    // Partial line; wait for the rest
                    continue;
                }
            }

            // At EOF: check for rotation before polling again
            if self.detect_rotation().await? {
                log::info!("🔄 File rotation detected, reopening: {}", self.path.display());
                self.open(true).await?;
                continue;
            }

            sleep(self.poll_interval).await;
        }
    }

    async fn reconnect(&mut self) -> Result<(), SubscriptionError> {
        // Resume from the start of whatever file is now at the path
        self.open(true).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl-tail"
    }
}
