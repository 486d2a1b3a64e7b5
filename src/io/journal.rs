//! Transition journal - appends transition events to a file
//!
//! Events are written in JSONL format (one JSON object per line) to the file
//! specified in config.

use crate::domain::types::{TransitionEvent, TransitionKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

#[derive(Debug, Serialize)]
struct JournalRecord<'a> {
    zone_id: &'a str,
    kind: TransitionKind,
    /// Fix timestamp (epoch ms)
    at: u64,
    /// Fix timestamp as RFC 3339
    #[serde(skip_serializing_if = "Option::is_none")]
    at_utc: Option<String>,
    /// When the record was written
    recorded_at: String,
}

impl<'a> JournalRecord<'a> {
    fn new(event: &'a TransitionEvent) -> Self {
        Self {
            zone_id: &event.zone_id,
            kind: event.kind,
            at: event.at,
            at_utc: i64::try_from(event.at)
                .ok()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .map(|t| t.to_rfc3339()),
            recorded_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Append-only writer for transition events
pub struct TransitionJournal {
    file_path: String,
}

impl TransitionJournal {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "journal_initialized");
        Self { file_path: file_path.to_string() }
    }

    /// Write one event
    /// Returns true if successful, false otherwise
    pub fn write_event(&self, event: &TransitionEvent) -> bool {
        let line = match serde_json::to_string(&JournalRecord::new(event)) {
            Ok(line) => line,
            Err(e) => {
                error!(zone_id = %event.zone_id, error = %e, "journal_serialize_failed");
                return false;
            }
        };

        match self.append_line(&line) {
            Ok(()) => {
                debug!(zone_id = %event.zone_id, kind = %event.kind.as_str(), "journal_written");
                true
            }
            Err(e) => {
                error!(zone_id = %event.zone_id, error = %e, "journal_write_failed");
                false
            }
        }
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Consume transition events until every sender is dropped
    ///
    /// Events still buffered when the monitor goes away are written before
    /// the loop ends.
    pub async fn run(self, mut events: broadcast::Receiver<TransitionEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.write_event(&event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped = %skipped, "journal_lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        info!(file_path = %self.file_path, "journal_stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn event(kind: TransitionKind, at: u64) -> TransitionEvent {
        TransitionEvent { zone_id: "z1".to_string(), kind, at }
    }

    #[test]
    fn test_write_event() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("nested").join("transitions.jsonl");
        let journal = TransitionJournal::new(file_path.to_str().unwrap());

        assert!(journal.write_event(&event(TransitionKind::Entry, 1_767_617_600_000)));
        assert!(journal.write_event(&event(TransitionKind::Exit, 1_767_617_660_000)));

        let content = fs::read_to_string(&file_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["zone_id"], "z1");
        assert_eq!(first["kind"], "entry");
        assert_eq!(first["at"], 1_767_617_600_000u64);
        assert!(first["at_utc"].as_str().unwrap().starts_with("2026-01-05"));

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["kind"], "exit");
    }

    #[tokio::test]
    async fn test_run_drains_channel() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("transitions.jsonl");
        let journal = TransitionJournal::new(file_path.to_str().unwrap());

        let (tx, rx) = broadcast::channel(8);
        let task = tokio::spawn(journal.run(rx));

        tx.send(event(TransitionKind::Entry, 1)).unwrap();
        drop(tx);
        task.await.unwrap();

        let content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_buffered_events_written_after_close() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("transitions.jsonl");
        let journal = TransitionJournal::new(file_path.to_str().unwrap());

        // Queue everything and close the channel before the journal runs
        let (tx, rx) = broadcast::channel(16);
        for at in 1..=10 {
            let kind = if at % 2 == 1 { TransitionKind::Entry } else { TransitionKind::Exit };
            tx.send(event(kind, at)).unwrap();
        }
        drop(tx);

        journal.run(rx).await;

        let content = fs::read_to_string(&file_path).unwrap();
        let last: serde_json::Value = serde_json::from_str(content.lines().last().unwrap()).unwrap();
        assert_eq!(content.lines().count(), 10);
        assert_eq!(last["at"], 10);
        assert_eq!(last["kind"], "exit");
    }
}
