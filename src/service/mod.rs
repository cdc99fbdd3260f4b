//! Guardian service: the mediation pipeline
//!
//! Owns the policy store, ledger, trust fabric, and inspector, and runs
//! every event through one ordered pipeline: mode gates, payload
//! validation, risk assessment, enforcement, ledger append, then
//! learning. The ledger append is the only fatal step after assessment;
//! learning and event persistence are logged and never fail the event.

use crate::config::GuardianConfig;
use crate::enforcement;
use crate::error::{Error, Result};
use crate::event::{validate_payload, DataClass, Event, GuardianAction, RiskLevel, Scope, UserDecision};
use crate::inspector::Inspector;
use crate::ledger::Ledger;
use crate::policy::{assess, PolicyStore};
use crate::trust::TrustFabric;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

const LOCKDOWN_REASON: &str = "Guardian lockdown active";
const PRIVATE_MODE_REASON: &str = "Private mode active - telemetry masked";

/// Finalized events kept in memory for fast decision recording
const EVENT_CACHE_CAP: usize = 1024;

/// Insertion-ordered bounded cache; one file per event on disk is the
/// durable store.
#[derive(Default)]
struct EventCache {
    by_id: HashMap<String, Event>,
    order: VecDeque<String>,
}

pub struct GuardianService {
    policy: Arc<PolicyStore>,
    ledger: Arc<Ledger>,
    trust: Arc<TrustFabric>,
    inspector: Arc<Inspector>,
    events: RwLock<EventCache>,
    events_dir: PathBuf,
    private_mode: AtomicBool,
    lockdown: AtomicBool,
}

impl GuardianService {
    /// Build the service from configuration and load policies. Events
    /// persisted by earlier runs are read lazily, one file at a time.
    pub async fn new(config: &GuardianConfig) -> Result<Arc<Self>> {
        let policy = Arc::new(PolicyStore::load(&config.storage.policy_dir));
        let ledger = Arc::new(Ledger::new(&config.storage.ledger_dir));
        let trust = Arc::new(TrustFabric::new(config.storage.ledger_dir.join("trust")));
        let inspector = Arc::new(Inspector::new(ledger.clone(), &config.storage.reports_dir));
        let events_dir = config.storage.ledger_dir.join("events");

        Ok(Arc::new(Self {
            policy,
            ledger,
            trust,
            inspector,
            events: RwLock::new(EventCache::default()),
            events_dir,
            private_mode: AtomicBool::new(false),
            lockdown: AtomicBool::new(false),
        }))
    }

    pub fn policy(&self) -> &Arc<PolicyStore> {
        &self.policy
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn trust(&self) -> &Arc<TrustFabric> {
        &self.trust
    }

    pub fn inspector(&self) -> &Arc<Inspector> {
        &self.inspector
    }

    pub fn is_private_mode(&self) -> bool {
        self.private_mode.load(Ordering::SeqCst)
    }

    pub fn is_lockdown(&self) -> bool {
        self.lockdown.load(Ordering::SeqCst)
    }

    /// Toggle private mode. Returns whether the flag changed; repeat
    /// calls with the same value are no-ops.
    pub async fn set_private_mode(&self, enabled: bool, user_id: Option<&str>) -> bool {
        let previous = self.private_mode.swap(enabled, Ordering::SeqCst);
        let changed = previous != enabled;
        if changed {
            tracing::info!("Private mode {}", if enabled { "enabled" } else { "disabled" });
            if let Some(user) = user_id {
                self.trust.note_mode_toggle(user).await;
            }
        }
        changed
    }

    /// Toggle lockdown. Returns whether the flag changed.
    pub fn set_lockdown(&self, enabled: bool) -> bool {
        let previous = self.lockdown.swap(enabled, Ordering::SeqCst);
        let changed = previous != enabled;
        if changed {
            tracing::warn!("Lockdown {}", if enabled { "engaged" } else { "lifted" });
        }
        changed
    }

    /// Run one event through the full mediation pipeline and return the
    /// finalized event. The caller must honor `guardian_action` and use
    /// the returned `data_touched` in place of the original payload.
    pub async fn emit(&self, mut event: Event) -> Result<Event> {
        if self.is_lockdown() {
            event.risk_score = 1.0;
            event.risk_level = RiskLevel::Critical;
            event.risk_factors = vec![LOCKDOWN_REASON.to_string()];
            event.guardian_action = GuardianAction::Block;
            event.action_reason = LOCKDOWN_REASON.to_string();
            event.data_touched = serde_json::Value::Object(serde_json::Map::new());
            // Nothing reached the ledger because nothing was allowed to run.
            return Ok(event);
        }

        if event.event_type.is_empty() {
            return Err(Error::InvalidEvent("event_type must not be empty".to_string()));
        }
        if event.source.is_empty() {
            return Err(Error::InvalidEvent("source must not be empty".to_string()));
        }
        validate_payload(&event.data_touched)?;

        if self.is_private_mode() && event.data_class == DataClass::Telemetry {
            event.guardian_action = GuardianAction::Mask;
            event.action_reason = PRIVATE_MODE_REASON.to_string();
            event.data_touched = enforcement::apply(GuardianAction::Mask, &event.data_touched);
            self.ledger.append(&event).await?;
            self.remember(event.clone()).await;
            return Ok(event);
        }

        // MFA presence feeds the assessment as a mitigating factor, so it
        // is derived before scoring and only upgraded afterwards.
        event.mfa_required = event.scope == Scope::External || event.data_class.is_sensitive();

        let policy = self.policy.current();
        let learned = self
            .trust
            .class_weight_override(event.ledger_owner(), event.data_class)
            .await;
        assess(&mut event, &policy, learned);

        if event.risk_level >= RiskLevel::High {
            event.mfa_required = true;
        }

        event.data_touched = enforcement::apply(event.guardian_action, &event.data_touched);

        self.ledger.append(&event).await?;
        self.remember(event.clone()).await;

        if let Err(e) = self.trust.learn(&event, None).await {
            tracing::warn!("Trust update failed for {}: {}", event.event_id, e);
        }

        tracing::debug!(
            event_id = %event.event_id,
            action = %event.guardian_action,
            risk = event.risk_score,
            "Event mediated"
        );
        Ok(event)
    }

    /// Attach a user decision to a previously emitted event. The ledger
    /// entry is immutable; the decision lands on the stored event and
    /// feeds the trust fabric.
    pub async fn record_decision(
        &self,
        event_id: &str,
        decision: UserDecision,
    ) -> Result<Event> {
        let cached = {
            let mut cache = self.events.write().await;
            cache.by_id.get_mut(event_id).map(|event| {
                event.user_decision = Some(decision);
                event.clone()
            })
        };

        let snapshot = match cached {
            Some(event) => {
                self.persist_event(event.clone());
                event
            }
            None => {
                // Evicted from the cache or emitted by a previous run
                let mut event = self
                    .load_event(event_id)
                    .await
                    .ok_or_else(|| Error::InvalidEvent(format!("unknown event: {}", event_id)))?;
                event.user_decision = Some(decision);
                self.remember(event.clone()).await;
                event
            }
        };

        if let Err(e) = self.trust.learn(&snapshot, Some(decision)).await {
            tracing::warn!("Trust update failed for {}: {}", event_id, e);
        }
        Ok(snapshot)
    }

    pub async fn get_event(&self, event_id: &str) -> Option<Event> {
        if let Some(event) = self.events.read().await.by_id.get(event_id) {
            return Some(event.clone());
        }
        self.load_event(event_id).await
    }

    #[cfg(test)]
    async fn cached_event_count(&self) -> usize {
        self.events.read().await.by_id.len()
    }

    async fn remember(&self, event: Event) {
        {
            let mut cache = self.events.write().await;
            if cache
                .by_id
                .insert(event.event_id.clone(), event.clone())
                .is_none()
            {
                cache.order.push_back(event.event_id.clone());
            }
            while cache.by_id.len() > EVENT_CACHE_CAP {
                match cache.order.pop_front() {
                    Some(oldest) => {
                        cache.by_id.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
        self.persist_event(event);
    }

    /// Write one finalized event to its own file (fire-and-forget).
    fn persist_event(&self, event: Event) {
        let dir = self.events_dir.clone();
        let path = self.event_path(&event.event_id);
        tokio::spawn(async move {
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                tracing::warn!("Failed to create {}: {}", dir.display(), e);
                return;
            }
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if let Err(e) = tokio::fs::write(&path, json).await {
                        tracing::warn!("Failed to persist event {}: {}", event.event_id, e);
                    }
                }
                Err(e) => tracing::warn!("Failed to serialize event {}: {}", event.event_id, e),
            }
        });
    }

    async fn load_event(&self, event_id: &str) -> Option<Event> {
        let path = self.event_path(event_id);
        let content = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str(&content) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    fn event_path(&self, event_id: &str) -> PathBuf {
        let safe: String = event_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.events_dir.join(format!("{}.json", safe))
    }
}
