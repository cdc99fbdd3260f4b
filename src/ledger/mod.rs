//! Per-user append-only hash-chained ledger
//!
//! One JSONL file per user under the ledger directory. Each line is a
//! finalized event plus `previous_hash` (absent for the first entry) and
//! `hash` — SHA-256 over the entry's canonical serialization excluding the
//! `hash` field itself; `previous_hash` is part of the hashed payload, which
//! is what makes the chain cryptographically dependent.
//!
//! Canonical serialization is `serde_json::Value::to_string`: object keys
//! are sorted (serde_json's map is a BTreeMap), absent fields are omitted,
//! timestamps are RFC 3339 strings. Exactly one writer per user file,
//! serialized by a per-user lock; readers proceed concurrently and tolerate
//! a partial trailing line. `append` truncates a partial trailing line left
//! by a crash before writing.

use crate::error::{Error, Result};
use crate::event::Event;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// A single on-disk ledger record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(flatten)]
    pub event: Event,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    pub hash: String,
}

/// One structured problem found by [`Ledger::verify`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyIssue {
    /// 1-based line number in the user's ledger file
    pub line: usize,
    pub message: String,
}

/// Result of walking a user's full chain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub valid: bool,
    pub entries: usize,
    pub errors: Vec<VerifyIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_hash: Option<String>,
}

/// Per-user append-only log with hash chaining
pub struct Ledger {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Ledger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Ledger file path for a user id.
    pub fn path_for(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("ledger_{}.jsonl", sanitize(user_id)))
    }

    /// Append a finalized event to its owner's ledger. Returns the entry's
    /// hash. The per-user lock is held across {read last hash, write entry}.
    pub async fn append(&self, event: &Event) -> Result<String> {
        let owner = event.ledger_owner().to_string();
        let lock = self.user_lock(&owner).await;
        let _guard = lock.lock().await;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::LedgerWrite(format!("creating ledger dir: {}", e)))?;

        let path = self.path_for(&owner);
        let content = read_or_empty(&path)
            .await
            .map_err(|e| Error::LedgerWrite(format!("reading {}: {}", path.display(), e)))?;

        // Crash recovery: drop a partial trailing line before writing
        let content = match content.strip_suffix('\n') {
            Some(_) => content,
            None if content.is_empty() => content,
            None => {
                let keep = content.rfind('\n').map(|i| i + 1).unwrap_or(0);
                tracing::warn!(
                    "Truncating partial trailing line in {}",
                    path.display()
                );
                let truncated = content[..keep].to_string();
                tokio::fs::write(&path, &truncated)
                    .await
                    .map_err(|e| Error::LedgerWrite(format!("truncating: {}", e)))?;
                truncated
            }
        };

        let previous_hash = content
            .lines()
            .last()
            .and_then(|line| serde_json::from_str::<serde_json::Value>(line).ok())
            .and_then(|v| v.get("hash").and_then(|h| h.as_str()).map(String::from));

        let mut value = serde_json::to_value(event)?;
        if !value.is_object() {
            return Err(Error::LedgerWrite(
                "event did not serialize to an object".into(),
            ));
        }
        if let (Some(map), Some(prev)) = (value.as_object_mut(), &previous_hash) {
            map.insert(
                "previous_hash".to_string(),
                serde_json::Value::String(prev.clone()),
            );
        }
        let digest = canonical_digest(&value);
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "hash".to_string(),
                serde_json::Value::String(digest.clone()),
            );
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| Error::LedgerWrite(format!("opening {}: {}", path.display(), e)))?;
        file.write_all(format!("{}\n", value).as_bytes())
            .await
            .map_err(|e| Error::LedgerWrite(format!("appending: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| Error::LedgerWrite(format!("flushing: {}", e)))?;

        Ok(digest)
    }

    /// Stream entries newest-first, optionally truncated. A partial trailing
    /// line is skipped.
    pub async fn read(&self, user_id: &str, limit: Option<usize>) -> Result<Vec<LedgerEntry>> {
        let path = self.path_for(user_id);
        let content = read_or_empty(&path).await?;

        let mut entries = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            match serde_json::from_str::<LedgerEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(
                        "Skipping unreadable ledger line {} in {}: {}",
                        idx + 1,
                        path.display(),
                        e
                    );
                }
            }
        }
        entries.reverse();
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    /// Walk the user's file line by line, recomputing each entry's hash and
    /// confirming each `previous_hash` matches the running digest.
    pub async fn verify(&self, user_id: &str) -> Result<VerifyReport> {
        let path = self.path_for(user_id);
        let content = read_or_empty(&path).await?;

        let mut errors = Vec::new();
        let mut entries = 0usize;
        let mut last_hash: Option<String> = None;
        // Recomputed digest of the previous entry: the running chain state
        let mut running: Option<String> = None;
        // Stored hash of the previous entry, to tell cascade errors apart
        let mut prev_stored: Option<String> = None;

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let value: serde_json::Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    errors.push(VerifyIssue {
                        line: line_no,
                        message: format!("unreadable entry (chain break): {}", e),
                    });
                    running = None;
                    prev_stored = None;
                    continue;
                }
            };
            entries += 1;

            let stored_hash = value
                .get("hash")
                .and_then(|h| h.as_str())
                .map(String::from);
            let stored_prev = value
                .get("previous_hash")
                .and_then(|h| h.as_str())
                .map(String::from);
            let recomputed = canonical_digest_without_hash(&value);

            match &stored_hash {
                Some(stored) if *stored == recomputed => {}
                Some(_) => errors.push(VerifyIssue {
                    line: line_no,
                    message: "entry hash does not match its canonical serialization".to_string(),
                }),
                None => errors.push(VerifyIssue {
                    line: line_no,
                    message: "entry is missing its hash".to_string(),
                }),
            }

            if idx == 0 {
                if stored_prev.is_some() {
                    errors.push(VerifyIssue {
                        line: line_no,
                        message: "first entry carries a previous_hash".to_string(),
                    });
                }
            } else if stored_prev != running {
                let message = if stored_prev == prev_stored && prev_stored.is_some() {
                    "previous_hash matches a tampered predecessor (cascade)".to_string()
                } else {
                    "previous_hash does not match the running chain digest".to_string()
                };
                errors.push(VerifyIssue {
                    line: line_no,
                    message,
                });
            }

            running = Some(recomputed);
            prev_stored = stored_hash.clone();
            last_hash = stored_hash;
        }

        Ok(VerifyReport {
            valid: errors.is_empty(),
            entries,
            errors,
            last_hash,
        })
    }

    /// Digest over the canonical concatenation of one UTC day's entries,
    /// or `None` when the day has no entries.
    pub async fn daily_root(&self, user_id: &str, date: NaiveDate) -> Result<Option<String>> {
        let path = self.path_for(user_id);
        let content = read_or_empty(&path).await?;

        let day_lines: Vec<&str> = content
            .lines()
            .filter(|line| {
                serde_json::from_str::<serde_json::Value>(line)
                    .ok()
                    .and_then(|v| {
                        v.get("timestamp")
                            .and_then(|t| t.as_str())
                            .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
                    })
                    .map(|ts| ts.date_naive() == date)
                    .unwrap_or(false)
            })
            .collect();

        if day_lines.is_empty() {
            return Ok(None);
        }
        let digest = Sha256::digest(day_lines.join("\n").as_bytes());
        Ok(Some(hex(&digest)))
    }

    async fn user_lock(&self, owner: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(owner.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// SHA-256 hex digest over a value's canonical serialization, with the
/// `hash` field removed first.
fn canonical_digest_without_hash(value: &serde_json::Value) -> String {
    let mut stripped = value.clone();
    if let Some(map) = stripped.as_object_mut() {
        map.remove("hash");
    }
    canonical_digest(&stripped)
}

fn canonical_digest(value: &serde_json::Value) -> String {
    hex(&Sha256::digest(value.to_string().as_bytes()))
}

fn hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// File names embed the user id; anything outside `[A-Za-z0-9._-]` becomes
/// an underscore.
fn sanitize(user_id: &str) -> String {
    user_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

async fn read_or_empty(path: &Path) -> std::io::Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DataClass, Scope};
    use serde_json::json;
    use tempfile::TempDir;

    fn make_event(user: &str, description: &str) -> Event {
        Event::new(
            "api_call",
            Scope::App,
            DataClass::Telemetry,
            description,
            json!({"method": "GET", "path": "/home"}),
            "nav",
            Some(user.to_string()),
            None,
            "adapter",
            None,
        )
    }

    #[tokio::test]
    async fn test_first_entry_has_no_previous_hash() {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::new(dir.path());

        let hash = ledger.append(&make_event("U1", "first")).await.unwrap();
        assert_eq!(hash.len(), 64);

        let entries = ledger.read("U1", None).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].previous_hash.is_none());
        assert_eq!(entries[0].hash, hash);
    }

    #[tokio::test]
    async fn test_chain_links_consecutive_entries() {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::new(dir.path());

        let h1 = ledger.append(&make_event("U1", "one")).await.unwrap();
        let h2 = ledger.append(&make_event("U1", "two")).await.unwrap();
        assert_ne!(h1, h2);

        // read() is newest-first
        let entries = ledger.read("U1", None).await.unwrap();
        assert_eq!(entries[0].event.description, "two");
        assert_eq!(entries[0].previous_hash.as_deref(), Some(h1.as_str()));
        assert_eq!(entries[1].event.description, "one");
    }

    #[tokio::test]
    async fn test_read_limit() {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::new(dir.path());
        for i in 0..5 {
            ledger
                .append(&make_event("U1", &format!("e{}", i)))
                .await
                .unwrap();
        }
        let entries = ledger.read("U1", Some(2)).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event.description, "e4");
    }

    #[tokio::test]
    async fn test_verify_valid_chain() {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::new(dir.path());
        ledger.append(&make_event("U1", "one")).await.unwrap();
        let h2 = ledger.append(&make_event("U1", "two")).await.unwrap();

        let report = ledger.verify("U1").await.unwrap();
        assert!(report.valid);
        assert_eq!(report.entries, 2);
        assert!(report.errors.is_empty());
        assert_eq!(report.last_hash.as_deref(), Some(h2.as_str()));
    }

    #[tokio::test]
    async fn test_verify_empty_ledger() {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::new(dir.path());
        let report = ledger.verify("nobody").await.unwrap();
        assert!(report.valid);
        assert_eq!(report.entries, 0);
        assert!(report.last_hash.is_none());
    }

    #[tokio::test]
    async fn test_verify_detects_tampering_and_cascade() {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::new(dir.path());
        ledger.append(&make_event("U1", "alpha")).await.unwrap();
        ledger.append(&make_event("U1", "beta")).await.unwrap();

        // Flip a character in the first entry's description on disk
        let path = ledger.path_for("U1");
        let content = std::fs::read_to_string(&path).unwrap();
        let tampered = content.replacen("alpha", "alphb", 1);
        assert_ne!(content, tampered);
        std::fs::write(&path, tampered).unwrap();

        let report = ledger.verify("U1").await.unwrap();
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.line == 1));
        assert!(report.errors.iter().any(|e| e.line == 2));
    }

    #[tokio::test]
    async fn test_append_truncates_partial_trailing_line() {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::new(dir.path());
        let h1 = ledger.append(&make_event("U1", "whole")).await.unwrap();

        // Simulate a crash mid-write: partial line, no trailing newline
        let path = ledger.path_for("U1");
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"event_id\":\"evt-partial");
        std::fs::write(&path, content).unwrap();

        let h2 = ledger.append(&make_event("U1", "after")).await.unwrap();
        let entries = ledger.read("U1", None).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].previous_hash.as_deref(), Some(h1.as_str()));
        assert_eq!(entries[0].hash, h2);

        let report = ledger.verify("U1").await.unwrap();
        assert!(report.valid);
    }

    #[tokio::test]
    async fn test_readers_skip_partial_trailing_line() {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::new(dir.path());
        ledger.append(&make_event("U1", "whole")).await.unwrap();

        let path = ledger.path_for("U1");
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"truncated");
        std::fs::write(&path, content).unwrap();

        let entries = ledger.read("U1", None).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event.description, "whole");
    }

    #[tokio::test]
    async fn test_ledgers_are_isolated_per_user() {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::new(dir.path());
        ledger.append(&make_event("U1", "one")).await.unwrap();
        ledger.append(&make_event("U2", "two")).await.unwrap();

        assert_eq!(ledger.read("U1", None).await.unwrap().len(), 1);
        assert_eq!(ledger.read("U2", None).await.unwrap().len(), 1);
        // Each user's chain starts fresh
        let u2 = ledger.read("U2", None).await.unwrap();
        assert!(u2[0].previous_hash.is_none());
    }

    #[tokio::test]
    async fn test_anonymous_events_share_a_file() {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::new(dir.path());
        let mut event = make_event("ignored", "anon");
        event.user_id = None;
        ledger.append(&event).await.unwrap();

        let entries = ledger.read("anonymous", None).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_daily_root() {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::new(dir.path());
        ledger.append(&make_event("U1", "today")).await.unwrap();

        let today = chrono::Utc::now().date_naive();
        let root = ledger.daily_root("U1", today).await.unwrap();
        assert!(root.is_some());
        assert_eq!(root.unwrap().len(), 64);

        let yesterday = today.pred_opt().unwrap();
        assert!(ledger.daily_root("U1", yesterday).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_chain_valid() {
        let dir = TempDir::new().unwrap();
        let ledger = Arc::new(Ledger::new(dir.path()));

        let mut handles = Vec::new();
        for i in 0..10 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .append(&make_event("U1", &format!("c{}", i)))
                    .await
                    .unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let report = ledger.verify("U1").await.unwrap();
        assert!(report.valid);
        assert_eq!(report.entries, 10);
    }

    #[test]
    fn test_sanitize_user_id() {
        assert_eq!(sanitize("U1"), "U1");
        assert_eq!(sanitize("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize("user.name-7_x"), "user.name-7_x");
    }
}
