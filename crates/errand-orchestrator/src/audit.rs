//! Audit archive boundary.
//!
//! The transcript of every request is offered to an [`AuditSink`] after
//! aggregation. Archiving is best-effort: a sink failure is logged and
//! never fails the request.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use errand_core::{RequestId, Transcript};

/// Errors from archiving a transcript.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audit encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One archived request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub request_id: RequestId,
    pub user_id: String,
    pub completed_at: DateTime<Utc>,
    pub transcript: Transcript,
}

/// Where finished transcripts go.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Discards transcripts. Useful in tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn append(&self, _record: &AuditRecord) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Appends one JSON line per request to a per-user file under a directory.
#[derive(Debug, Clone)]
pub struct FsAuditSink {
    dir: PathBuf,
}

impl FsAuditSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn user_file(&self, user_id: &str) -> PathBuf {
        let sanitized: String = user_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{sanitized}.jsonl"))
    }
}

#[async_trait]
impl AuditSink for FsAuditSink {
    async fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.user_file(&record.user_id))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use errand_core::Actor;

    fn record(user_id: &str) -> AuditRecord {
        let mut transcript = Transcript::new();
        transcript.record(Actor::Router, "planned 1 node");
        AuditRecord {
            request_id: RequestId::generate(),
            user_id: user_id.to_string(),
            completed_at: Utc::now(),
            transcript,
        }
    }

    #[tokio::test]
    async fn test_appends_one_line_per_request() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsAuditSink::new(dir.path());

        sink.append(&record("alice@example.com")).await.unwrap();
        sink.append(&record("alice@example.com")).await.unwrap();

        let contents =
            std::fs::read_to_string(dir.path().join("alice@example.com.jsonl")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: AuditRecord = serde_json::from_str(line).unwrap();
            assert_eq!(parsed.user_id, "alice@example.com");
            assert_eq!(parsed.transcript.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_user_id_is_sanitized_for_the_filename() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsAuditSink::new(dir.path());
        sink.append(&record("../evil/user")).await.unwrap();
        assert!(dir.path().join(".._evil_user.jsonl").exists());
    }
}
