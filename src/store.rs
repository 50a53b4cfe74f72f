//! Durable record of relayed article links.
//!
//! The store is a plain text file with one link per line. It is only ever
//! appended to; duplicates are harmless because readers only check membership.
//! The whole file is re-read at the start of every cycle so that edits made
//! while the process is running are honored.

use crate::error::StoreError;
use crate::models::SentSet;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct SentStore {
    path: PathBuf,
}

impl SentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Load every recorded link. A missing file is an empty set.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<SentSet, StoreError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Sent-articles store absent; starting empty");
                return Ok(SentSet::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let sent: SentSet = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        debug!(count = sent.len(), "Loaded sent-articles store");
        Ok(sent)
    }

    /// Record one link, creating the file if needed.
    #[instrument(level = "debug", skip(self))]
    pub async fn append(&self, link: &str) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(write_err)?;
        file.write_all(format!("{}\n", link.trim()).as_bytes())
            .await
            .map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        Ok(())
    }
}
