use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::audit::AuditEntry;
use crate::domain::ports::AuditSink;
use crate::infrastructure::config::AuditConfig;

/// Logs each audit entry on the `envsync::audit` target.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<()> {
        let details = serde_json::to_string(&entry.details)
            .context("failed to serialize audit details")?;
        info!(
            target: "envsync::audit",
            action = entry.action,
            actor = %entry.actor_id,
            project = %entry.project_id,
            recorded_at = %entry.recorded_at.to_rfc3339(),
            %details,
            "audit"
        );
        Ok(())
    }
}

/// Appends one JSON object per line to a file. Parent directories are
/// created on first write.
pub struct JsonLinesAuditSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl AuditSink for JsonLinesAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry).context("failed to serialize audit entry")?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open audit log {}", self.path.display()))?;
        file.write_all(&line)
            .await
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }
}

/// Pick the sink for this configuration.
pub fn sink_for(cfg: &AuditConfig) -> Box<dyn AuditSink> {
    match &cfg.path {
        Some(path) => Box::new(JsonLinesAuditSink::new(path)),
        None => Box::new(TracingAuditSink),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::{ACTION_CONFLICT_RESOLVE, ACTION_CONFLICT_SCAN};
    use crate::domain::value_objects::ProjectId;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn json_lines_appends_one_object_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.jsonl");
        let sink = JsonLinesAuditSink::new(&path);
        let project = ProjectId("p1".into());

        sink.record(&AuditEntry::new(
            ACTION_CONFLICT_SCAN,
            "u1",
            &project,
            json!({ "conflict_count": 2 }),
        ))
        .await
        .unwrap();
        sink.record(&AuditEntry::new(
            ACTION_CONFLICT_RESOLVE,
            "u1",
            &project,
            json!({ "key_name": "API_KEY" }),
        ))
        .await
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["action"], "config_entry.conflict_scan");
        assert_eq!(lines[0]["details"]["conflict_count"], 2);
        assert_eq!(lines[1]["project_id"], "p1");
    }

    #[tokio::test]
    async fn tracing_sink_accepts_entries() {
        let entry = AuditEntry::new(ACTION_CONFLICT_SCAN, "u", &ProjectId("p".into()), json!({}));
        assert!(TracingAuditSink.record(&entry).await.is_ok());
    }
}
