//! Append-only JSONL persistence of wire traffic, and replay.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

use super::envelope::{WireEnvelope, WireRegistry};
use super::message::WireMessage;
use super::{WireSoulSide, WireUISide};
use crate::config::TurnwireConfig;
use crate::error::{Result, TurnwireError};

/// One line of a wire log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireRecord {
    /// Unix time in seconds.
    pub timestamp: f64,
    pub message: WireEnvelope,
}

impl WireRecord {
    pub fn now(msg: &WireMessage) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            timestamp: now.timestamp_micros() as f64 / 1_000_000.0,
            message: WireEnvelope::from_message(msg)?,
        })
    }
}

/// Appends wire messages to a JSONL file.
pub struct WireRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl WireRecorder {
    /// Open `path` for appending, creating it and its parent directory.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        tracing::debug!(path = %path.display(), "wire recorder opened");
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Recorder at `config.record_path`, if one is configured.
    pub async fn from_config(config: &TurnwireConfig) -> Result<Option<Self>> {
        match &config.record_path {
            Some(path) => Ok(Some(Self::open(path).await?)),
            None => Ok(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one message and flush it to disk.
    pub async fn append(&mut self, msg: &WireMessage) -> Result<()> {
        let mut line = serde_json::to_string(&WireRecord::now(msg)?)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Drain `ui` until the wire shuts down, recording every message.
    ///
    /// Returns how many messages were written.
    pub async fn record_from(mut self, mut ui: WireUISide) -> Result<usize> {
        let mut written = 0;
        loop {
            match ui.receive().await {
                Ok(msg) => {
                    self.append(&msg).await?;
                    written += 1;
                }
                Err(TurnwireError::WireShutdown) => break,
                Err(err) => return Err(err),
            }
        }
        tracing::debug!(path = %self.path.display(), written, "wire recording finished");
        Ok(written)
    }
}

impl std::fmt::Debug for WireRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireRecorder")
            .field("path", &self.path)
            .finish()
    }
}

/// Read a wire log and decode every record.
///
/// Blank lines are skipped. A line that is not a record at all is an error;
/// a record whose message fails to decode (an unknown tag from a newer
/// writer, say) is skipped with a warning.
pub async fn read_records(
    path: impl AsRef<Path>,
    registry: &WireRegistry,
) -> Result<Vec<WireMessage>> {
    let file = File::open(path.as_ref()).await?;
    let mut lines = BufReader::new(file).lines();
    let mut messages = Vec::new();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let record: WireRecord = serde_json::from_str(&line)?;
        match registry.decode(record.message) {
            Ok(msg) => messages.push(msg),
            Err(err) => {
                tracing::warn!(line = line_no, error = %err, "skipping undecodable wire record")
            }
        }
    }
    Ok(messages)
}

/// Feed recorded messages back onto a wire. Returns how many were sent.
pub async fn replay(
    messages: impl IntoIterator<Item = WireMessage>,
    soul: &WireSoulSide,
) -> Result<usize> {
    let mut sent = 0;
    for msg in messages {
        soul.send(msg)?;
        sent += 1;
        tokio::task::yield_now().await;
    }
    Ok(sent)
}
