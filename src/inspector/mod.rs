//! Inspector: read-only analytics over the ledger
//!
//! Classifies a user's recent events, flags anomalies, and composes the
//! daily trust report artifact. Never writes to the ledger itself.

use crate::error::Result;
use crate::event::{GuardianAction, RiskLevel, Scope};
use crate::ledger::{Ledger, LedgerEntry, VerifyReport};
use crate::trust::Severity;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Share of HIGH/CRITICAL events that trips the high-risk anomaly
const HIGH_RISK_SHARE: f64 = 0.2;

/// Number of BLOCK outcomes that trips the blocked-actions anomaly
const BLOCKED_ACTIONS_LIMIT: u64 = 5;

/// Share of EXTERNAL-scope events that trips the external-api anomaly
const EXTERNAL_SHARE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    HighRiskSpike,
    BlockedActionsSpike,
    ExternalApiSpike,
    SensitiveDataAccess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub message: String,
    pub count: u64,
    pub detected_at: DateTime<Utc>,
}

/// Classified view of one user's activity over a time window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub user_id: String,
    pub window_hours: i64,
    pub total_events: u64,
    pub by_event_type: BTreeMap<String, u64>,
    pub by_risk_level: BTreeMap<String, u64>,
    pub by_action: BTreeMap<String, u64>,
    pub by_scope: BTreeMap<String, u64>,
    pub by_data_class: BTreeMap<String, u64>,
    pub anomalies: Vec<Anomaly>,
    /// Percentage of events that were low-or-medium risk and not blocked.
    /// 100.0 for an empty window.
    pub confidence: f64,
    pub generated_at: DateTime<Utc>,
}

/// Daily report artifact combining activity views with chain integrity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustReport {
    pub user_id: String,
    pub generated_at: DateTime<Utc>,
    pub daily: ActivitySummary,
    pub weekly: ActivitySummary,
    pub ledger: VerifyReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_root: Option<String>,
}

pub struct Inspector {
    ledger: Arc<Ledger>,
    reports_dir: PathBuf,
}

impl Inspector {
    pub fn new(ledger: Arc<Ledger>, reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            ledger,
            reports_dir: reports_dir.into(),
        }
    }

    /// Classify a user's events over the trailing `window_hours`.
    pub async fn analyze(&self, user_id: &str, window_hours: i64) -> Result<ActivitySummary> {
        let now = Utc::now();
        let cutoff = now - Duration::hours(window_hours);
        let entries: Vec<LedgerEntry> = self
            .ledger
            .read(user_id, None)
            .await?
            .into_iter()
            .filter(|e| e.event.timestamp >= cutoff)
            .collect();

        let mut summary = ActivitySummary {
            user_id: user_id.to_string(),
            window_hours,
            total_events: entries.len() as u64,
            by_event_type: BTreeMap::new(),
            by_risk_level: BTreeMap::new(),
            by_action: BTreeMap::new(),
            by_scope: BTreeMap::new(),
            by_data_class: BTreeMap::new(),
            anomalies: Vec::new(),
            confidence: 100.0,
            generated_at: now,
        };

        let mut high_risk = 0u64;
        let mut blocked = 0u64;
        let mut external = 0u64;
        let mut sensitive = 0u64;
        let mut safe = 0u64;

        for entry in &entries {
            let ev = &entry.event;
            bump(&mut summary.by_event_type, ev.event_type.clone());
            bump(&mut summary.by_risk_level, ev.risk_level.to_string());
            bump(&mut summary.by_action, ev.guardian_action.to_string());
            bump(&mut summary.by_scope, ev.scope.to_string());
            bump(&mut summary.by_data_class, ev.data_class.to_string());

            if ev.risk_level >= RiskLevel::High {
                high_risk += 1;
            }
            if ev.guardian_action == GuardianAction::Block {
                blocked += 1;
            }
            if ev.scope == Scope::External {
                external += 1;
            }
            if ev.data_class.is_sensitive() {
                sensitive += 1;
            }
            if ev.risk_level <= RiskLevel::Medium && ev.guardian_action != GuardianAction::Block {
                safe += 1;
            }
        }

        let total = summary.total_events;
        if total > 0 {
            summary.confidence = 100.0 * safe as f64 / total as f64;

            if high_risk as f64 / total as f64 > HIGH_RISK_SHARE {
                summary.anomalies.push(Anomaly {
                    kind: AnomalyKind::HighRiskSpike,
                    severity: Severity::Warning,
                    message: format!(
                        "{} of {} events were high or critical risk",
                        high_risk, total
                    ),
                    count: high_risk,
                    detected_at: now,
                });
            }
            if blocked > BLOCKED_ACTIONS_LIMIT {
                summary.anomalies.push(Anomaly {
                    kind: AnomalyKind::BlockedActionsSpike,
                    severity: Severity::Critical,
                    message: format!("{} events were blocked in the window", blocked),
                    count: blocked,
                    detected_at: now,
                });
            }
            if external as f64 / total as f64 > EXTERNAL_SHARE {
                summary.anomalies.push(Anomaly {
                    kind: AnomalyKind::ExternalApiSpike,
                    severity: Severity::Warning,
                    message: format!(
                        "{} of {} events reached external services",
                        external, total
                    ),
                    count: external,
                    detected_at: now,
                });
            }
            if sensitive > 0 {
                summary.anomalies.push(Anomaly {
                    kind: AnomalyKind::SensitiveDataAccess,
                    severity: Severity::Info,
                    message: format!("{} events touched sensitive data classes", sensitive),
                    count: sensitive,
                    detected_at: now,
                });
            }
        }

        Ok(summary)
    }

    /// Compose the daily trust report and write its artifact under the
    /// reports directory.
    pub async fn trust_report(&self, user_id: &str) -> Result<TrustReport> {
        let daily = self.analyze(user_id, 24).await?;
        let weekly = self.analyze(user_id, 24 * 7).await?;
        let ledger = self.ledger.verify(user_id).await?;
        let today = Utc::now().date_naive();
        let daily_root = self.ledger.daily_root(user_id, today).await?;

        let report = TrustReport {
            user_id: user_id.to_string(),
            generated_at: Utc::now(),
            daily,
            weekly,
            ledger,
            daily_root,
        };

        let dir = self.reports_dir.join(sanitize(user_id));
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("trust_report_{}.json", today.format("%Y-%m-%d")));
        let json = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(&path, json).await?;
        tracing::info!("Wrote trust report for {} to {}", user_id, path.display());

        Ok(report)
    }
}

fn bump(map: &mut BTreeMap<String, u64>, key: String) {
    *map.entry(key).or_insert(0) += 1;
}

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
