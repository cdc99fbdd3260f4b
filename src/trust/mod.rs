//! Trust Fabric: per-user adaptive privacy model
//!
//! Records user decisions against assessed events and slowly shifts
//! per-data-class risk weights. The learned weights feed back into the
//! policy engine as overrides blended with `max(global, override)`, so
//! learning can only tighten the guardian's stance.

use crate::error::{Error, Result};
use crate::event::{DataClass, Event, RiskLevel, UserDecision};
use crate::policy::PolicyDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Capacity of the per-user response ring
const RESPONSE_CAP: usize = 1000;

/// Responses required before a trust level is suggested
const MIN_RESPONSES_FOR_SUGGESTION: usize = 20;

/// One remembered reaction to an assessed event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustResponse {
    pub timestamp: DateTime<Utc>,
    pub data_class: DataClass,
    pub risk_level: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_decision: Option<UserDecision>,
}

/// Per-data-class comfort statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComfortZone {
    pub allowed: u64,
    pub denied: u64,
    pub total: u64,
    pub mean_risk: f64,
}

/// The whole learned model for one user; exportable as an opaque document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustModel {
    pub user_id: String,
    pub trust_responses: VecDeque<TrustResponse>,
    /// Learned per-class weight overrides
    pub risk_weights: HashMap<DataClass, f64>,
    pub comfort_zones: HashMap<DataClass, ComfortZone>,
    pub total_events_assessed: u64,
    pub avg_risk_score: f64,
    pub privacy_mode_toggles: u64,
    pub disabled_signals: u64,
}

impl TrustModel {
    fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            trust_responses: VecDeque::new(),
            risk_weights: HashMap::new(),
            comfort_zones: HashMap::new(),
            total_events_assessed: 0,
            avg_risk_score: 0.0,
            privacy_mode_toggles: 0,
            disabled_signals: 0,
        }
    }

    /// Share of explicit decisions that were denials.
    fn deny_rate(&self) -> Option<f64> {
        let decided: Vec<_> = self
            .trust_responses
            .iter()
            .filter_map(|r| r.user_decision)
            .collect();
        if decided.is_empty() {
            return None;
        }
        let denied = decided
            .iter()
            .filter(|d| **d == UserDecision::Deny)
            .count();
        Some(denied as f64 / decided.len() as f64)
    }
}

/// Severity tag on a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// What a recommendation asks the UI to surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    RaiseTrustLevel,
    AutoBlockClass,
    ReviewSignals,
    ReviewActivity,
}

/// A typed, severity-tagged suggestion consumable by a UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_class: Option<DataClass>,
}

/// Suggested overall stance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Strict,
    Balanced,
    Permissive,
}

/// Per-user adaptive models with lazy JSON-file persistence
pub struct TrustFabric {
    dir: PathBuf,
    models: RwLock<HashMap<String, TrustModel>>,
}

impl TrustFabric {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            models: RwLock::new(HashMap::new()),
        }
    }

    /// Update the model from a finalized event and an optional explicit
    /// decision (the event's own hint is used when no explicit one is given).
    pub async fn learn(&self, event: &Event, decision: Option<UserDecision>) -> Result<()> {
        let owner = event.ledger_owner().to_string();
        let decision = decision.or(event.user_decision);

        self.ensure_loaded(&owner).await;
        let mut models = self.models.write().await;
        let model = models
            .entry(owner.clone())
            .or_insert_with(|| TrustModel::new(&owner));

        model.trust_responses.push_back(TrustResponse {
            timestamp: event.timestamp,
            data_class: event.data_class,
            risk_level: event.risk_level,
            user_decision: decision,
        });
        while model.trust_responses.len() > RESPONSE_CAP {
            model.trust_responses.pop_front();
        }

        model.total_events_assessed += 1;
        let n = model.total_events_assessed as f64;
        model.avg_risk_score += (event.risk_score - model.avg_risk_score) / n;

        let zone = model.comfort_zones.entry(event.data_class).or_default();
        zone.total += 1;
        zone.mean_risk += (event.risk_score - zone.mean_risk) / zone.total as f64;
        match decision {
            Some(UserDecision::Allow) => zone.allowed += 1,
            Some(UserDecision::Deny) => zone.denied += 1,
            _ => {}
        }

        match decision {
            Some(UserDecision::Deny) if event.risk_score > 0.5 => {
                let weight = model
                    .risk_weights
                    .entry(event.data_class)
                    .or_insert_with(|| base_weight(event.data_class));
                *weight = (*weight + 0.01).min(1.0);
            }
            Some(UserDecision::Allow) if event.risk_score < 0.3 => {
                let weight = model
                    .risk_weights
                    .entry(event.data_class)
                    .or_insert_with(|| base_weight(event.data_class));
                *weight = (*weight - 0.01).max(0.0);
            }
            _ => {}
        }

        self.persist(model.clone());
        Ok(())
    }

    /// Learned weight override for a user's data class, if any. Cached
    /// models are read without touching the write lock.
    pub async fn class_weight_override(&self, user_id: &str, class: DataClass) -> Option<f64> {
        if let Some(model) = self.models.read().await.get(user_id) {
            return model.risk_weights.get(&class).copied();
        }
        self.ensure_loaded(user_id).await;
        self.models
            .read()
            .await
            .get(user_id)
            .and_then(|model| model.risk_weights.get(&class).copied())
    }

    /// Record a privacy-mode toggle attributed to a user.
    pub async fn note_mode_toggle(&self, user_id: &str) {
        self.ensure_loaded(user_id).await;
        let mut models = self.models.write().await;
        let model = models
            .entry(user_id.to_string())
            .or_insert_with(|| TrustModel::new(user_id));
        model.privacy_mode_toggles += 1;
        self.persist(model.clone());
    }

    /// Record that the user disabled a risk signal. Returns the running
    /// count so callers can echo it back.
    pub async fn note_signal_disabled(&self, user_id: &str) -> u64 {
        self.ensure_loaded(user_id).await;
        let mut models = self.models.write().await;
        let model = models
            .entry(user_id.to_string())
            .or_insert_with(|| TrustModel::new(user_id));
        model.disabled_signals += 1;
        let total = model.disabled_signals;
        self.persist(model.clone());
        total
    }

    /// Typed, severity-tagged suggestions for the UI.
    pub async fn recommendations(&self, user_id: &str) -> Vec<Recommendation> {
        self.ensure_loaded(user_id).await;
        let models = self.models.read().await;
        let Some(model) = models.get(user_id) else {
            return Vec::new();
        };
        let mut out = Vec::new();

        if model.privacy_mode_toggles > 5 {
            out.push(Recommendation {
                kind: RecommendationKind::RaiseTrustLevel,
                severity: Severity::Info,
                message: "Private mode is toggled often; consider the strict trust level"
                    .to_string(),
                data_class: None,
            });
        }

        let mut classes: Vec<_> = model.comfort_zones.iter().collect();
        classes.sort_by_key(|(class, _)| class.to_string());
        for (class, zone) in classes {
            let decided = zone.allowed + zone.denied;
            if decided >= 5 && zone.denied as f64 / decided as f64 > 0.7 {
                out.push(Recommendation {
                    kind: RecommendationKind::AutoBlockClass,
                    severity: Severity::Warning,
                    message: format!(
                        "{} access is denied {} of {} times; consider auto-blocking it",
                        class, zone.denied, decided
                    ),
                    data_class: Some(*class),
                });
            }
        }

        if model.disabled_signals > 3 {
            out.push(Recommendation {
                kind: RecommendationKind::ReviewSignals,
                severity: Severity::Warning,
                message: "Several risk signals are disabled; review which ones still run"
                    .to_string(),
                data_class: None,
            });
        }

        if model.total_events_assessed >= 10 && model.avg_risk_score > 0.6 {
            out.push(Recommendation {
                kind: RecommendationKind::ReviewActivity,
                severity: Severity::Critical,
                message: format!(
                    "Average risk across recent activity is {:.2}; review what is accessing data",
                    model.avg_risk_score
                ),
                data_class: None,
            });
        }

        out
    }

    /// Suggested stance, or `None` until 20 responses have accumulated.
    pub async fn suggest_trust_level(&self, user_id: &str) -> Option<TrustLevel> {
        self.ensure_loaded(user_id).await;
        let models = self.models.read().await;
        let model = models.get(user_id)?;
        if model.trust_responses.len() < MIN_RESPONSES_FOR_SUGGESTION {
            return None;
        }
        let deny_rate = model.deny_rate().unwrap_or(0.0);
        let avg = model.avg_risk_score;
        if deny_rate > 0.6 || avg > 0.6 {
            Some(TrustLevel::Strict)
        } else if deny_rate < 0.2 || avg < 0.3 {
            Some(TrustLevel::Permissive)
        } else {
            Some(TrustLevel::Balanced)
        }
    }

    /// Export a user's model as an opaque document.
    pub async fn export(&self, user_id: &str) -> Result<serde_json::Value> {
        self.ensure_loaded(user_id).await;
        let models = self.models.read().await;
        match models.get(user_id) {
            Some(model) => Ok(serde_json::to_value(model)?),
            None => Ok(serde_json::to_value(TrustModel::new(user_id))?),
        }
    }

    /// Import a previously exported document for a user.
    pub async fn import(&self, user_id: &str, doc: serde_json::Value) -> Result<()> {
        let mut model: TrustModel = serde_json::from_value(doc)
            .map_err(|e| Error::Learning(format!("malformed trust document: {}", e)))?;
        model.user_id = user_id.to_string();

        let mut models = self.models.write().await;
        self.persist(model.clone());
        models.insert(user_id.to_string(), model);
        Ok(())
    }

    /// Make sure the user's model is cached. The disk read runs before
    /// any lock on the map is taken, so one user's first touch cannot
    /// stall every other user behind file I/O.
    async fn ensure_loaded(&self, user_id: &str) {
        if self.models.read().await.contains_key(user_id) {
            return;
        }
        let loaded = self.load_from_disk(user_id).await;
        let mut models = self.models.write().await;
        models
            .entry(user_id.to_string())
            .or_insert_with(|| loaded.unwrap_or_else(|| TrustModel::new(user_id)));
    }

    async fn load_from_disk(&self, user_id: &str) -> Option<TrustModel> {
        let path = self.model_path(user_id);
        let content = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str(&content) {
            Ok(model) => Some(model),
            Err(e) => {
                tracing::warn!("Failed to parse trust model {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Persist a model snapshot to disk (fire-and-forget).
    fn persist(&self, model: TrustModel) {
        let dir = self.dir.clone();
        let path = self.model_path(&model.user_id);
        tokio::spawn(async move {
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                tracing::warn!("Failed to create trust dir {}: {}", dir.display(), e);
                return;
            }
            match serde_json::to_string(&model) {
                Ok(json) => {
                    if let Err(e) = tokio::fs::write(&path, json).await {
                        tracing::warn!(
                            "Failed to persist trust model {}: {}",
                            model.user_id,
                            e
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to serialize trust model {}: {}",
                        model.user_id,
                        e
                    );
                }
            }
        });
    }

    fn model_path(&self, user_id: &str) -> PathBuf {
        let safe: String = user_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

/// Starting point for a learned weight: the shipped data-class table.
fn base_weight(class: DataClass) -> f64 {
    PolicyDocument::default().data_class_weight(class)
}
