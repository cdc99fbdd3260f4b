//! Declarative policy documents
//!
//! Policy documents are YAML files naming any subset of `risk_weights`,
//! `data_class_weights`, `scope_weights`, `action_thresholds` and
//! `allowed_scopes`. Unknown keys are ignored. Documents are folded over the
//! built-in defaults in file-name order; a malformed document is logged and
//! skipped. Loaded documents are immutable; hot reload builds a new value
//! and swaps the shared reference atomically.

use crate::event::{DataClass, Scope};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Multipliers applied to the raw weight tables when scoring
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub scope: f64,
    pub data_class: f64,
    /// Flat addition for EXTERNAL scope
    pub external: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            scope: 0.15,
            data_class: 0.5,
            external: 0.3,
        }
    }
}

/// Score thresholds driving the risk-level banding.
///
/// Monotonically non-increasing in block, alert, mask, redact order. The
/// defaults reproduce the fixed bands: [0, 0.4) low, [0.4, 0.6) medium,
/// [0.6, 0.8) high, [0.8, 1.0] critical.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionThresholds {
    pub block: f64,
    pub alert: f64,
    pub mask: f64,
    pub redact: f64,
}

impl Default for ActionThresholds {
    fn default() -> Self {
        Self {
            block: 0.8,
            alert: 0.6,
            mask: 0.6,
            redact: 0.4,
        }
    }
}

/// Immutable, read-only policy state for the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub risk_weights: RiskWeights,
    pub data_class_weights: HashMap<DataClass, f64>,
    pub scope_weights: HashMap<Scope, f64>,
    pub action_thresholds: ActionThresholds,
    /// When present, events whose scope is not listed are blocked outright
    pub allowed_scopes: Option<Vec<Scope>>,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self {
            risk_weights: RiskWeights::default(),
            data_class_weights: default_data_class_weights(),
            scope_weights: default_scope_weights(),
            action_thresholds: ActionThresholds::default(),
            allowed_scopes: None,
        }
    }
}

impl PolicyDocument {
    /// Raw weight for a data class; unknown entries fall back to OTHER's.
    pub fn data_class_weight(&self, class: DataClass) -> f64 {
        self.data_class_weights
            .get(&class)
            .copied()
            .unwrap_or(0.3)
    }

    /// Raw weight for a scope.
    pub fn scope_weight(&self, scope: Scope) -> f64 {
        self.scope_weights.get(&scope).copied().unwrap_or(0.2)
    }

    /// Load and fold all policy documents in a directory over the defaults.
    /// Returns the folded document and how many files contributed.
    pub fn load_dir(dir: &Path) -> (Self, usize) {
        let mut document = Self::default();
        let mut loaded = 0;

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to read policy directory {}: {}", dir.display(), e);
                }
                tracing::warn!("No policy documents loaded; using built-in defaults");
                return (document, 0);
            }
        };

        let mut paths: Vec<_> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        paths.sort();

        for path in paths {
            match std::fs::read_to_string(&path) {
                Ok(content) => match serde_yaml::from_str::<PolicyPatch>(&content) {
                    Ok(patch) => {
                        document.apply(patch);
                        loaded += 1;
                    }
                    Err(e) => {
                        tracing::warn!("Skipping malformed policy {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read policy {}: {}", path.display(), e);
                }
            }
        }

        if loaded == 0 {
            tracing::warn!("No policy documents loaded; using built-in defaults");
        }
        (document, loaded)
    }

    fn apply(&mut self, patch: PolicyPatch) {
        if let Some(rw) = patch.risk_weights {
            self.risk_weights = rw;
        }
        if let Some(weights) = patch.data_class_weights {
            self.data_class_weights.extend(weights);
        }
        if let Some(weights) = patch.scope_weights {
            self.scope_weights.extend(weights);
        }
        if let Some(thresholds) = patch.action_thresholds {
            self.action_thresholds = thresholds;
        }
        if let Some(scopes) = patch.allowed_scopes {
            self.allowed_scopes = Some(scopes);
        }
    }
}

/// Partial policy document as authored on disk
#[derive(Debug, Default, Deserialize)]
struct PolicyPatch {
    risk_weights: Option<RiskWeights>,
    data_class_weights: Option<HashMap<DataClass, f64>>,
    scope_weights: Option<HashMap<Scope, f64>>,
    action_thresholds: Option<ActionThresholds>,
    allowed_scopes: Option<Vec<Scope>>,
}

/// Default data-class weight table
fn default_data_class_weights() -> HashMap<DataClass, f64> {
    HashMap::from([
        (DataClass::Credentials, 1.0),
        (DataClass::Payment, 0.9),
        (DataClass::Biometrics, 0.9),
        (DataClass::Health, 0.8),
        (DataClass::Contacts, 0.7),
        (DataClass::Messages, 0.7),
        (DataClass::Audio, 0.7),
        (DataClass::Video, 0.7),
        (DataClass::Location, 0.6),
        (DataClass::Files, 0.5),
        (DataClass::Browsing, 0.4),
        (DataClass::Calendar, 0.3),
        (DataClass::Other, 0.3),
        (DataClass::Telemetry, 0.2),
    ])
}

/// Default scope weight table
fn default_scope_weights() -> HashMap<Scope, f64> {
    HashMap::from([
        (Scope::External, 0.8),
        (Scope::Api, 0.5),
        (Scope::App, 0.2),
        (Scope::User, 0.1),
    ])
}

/// Shared holder for the active policy document.
///
/// Readers capture the `Arc` once per assessment; a reload builds a fresh
/// document and swaps the reference, so in-flight evaluations see either
/// the old or the new document, never a mix.
pub struct PolicyStore {
    active: RwLock<Arc<PolicyDocument>>,
    policy_dir: std::path::PathBuf,
}

impl PolicyStore {
    /// Load all documents under `policy_dir` and build the store.
    pub fn load(policy_dir: impl Into<std::path::PathBuf>) -> Self {
        let policy_dir = policy_dir.into();
        let (document, loaded) = PolicyDocument::load_dir(&policy_dir);
        tracing::info!(
            "Policy store initialized ({} document(s) from {})",
            loaded,
            policy_dir.display()
        );
        Self {
            active: RwLock::new(Arc::new(document)),
            policy_dir,
        }
    }

    /// Build a store from an explicit document (tests, embedded use).
    pub fn with_document(document: PolicyDocument) -> Self {
        Self {
            active: RwLock::new(Arc::new(document)),
            policy_dir: std::path::PathBuf::new(),
        }
    }

    /// Snapshot of the active document.
    pub fn current(&self) -> Arc<PolicyDocument> {
        self.active
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Re-scan the policy directory and swap in the rebuilt document.
    pub fn reload(&self) -> usize {
        let (document, loaded) = PolicyDocument::load_dir(&self.policy_dir);
        let mut active = self
            .active
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *active = Arc::new(document);
        tracing::info!("Policy store reloaded ({} document(s))", loaded);
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_weight_tables() {
        let policy = PolicyDocument::default();
        assert_eq!(policy.data_class_weight(DataClass::Credentials), 1.0);
        assert_eq!(policy.data_class_weight(DataClass::Telemetry), 0.2);
        assert_eq!(policy.data_class_weight(DataClass::Files), 0.5);
        assert_eq!(policy.scope_weight(Scope::External), 0.8);
        assert_eq!(policy.scope_weight(Scope::User), 0.1);
    }

    #[test]
    fn test_thresholds_non_increasing() {
        let t = ActionThresholds::default();
        assert!(t.block >= t.alert);
        assert!(t.alert >= t.mask);
        assert!(t.mask >= t.redact);
    }

    #[test]
    fn test_load_empty_dir_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let (policy, loaded) = PolicyDocument::load_dir(dir.path());
        assert_eq!(loaded, 0);
        assert_eq!(policy.data_class_weight(DataClass::Payment), 0.9);
    }

    #[test]
    fn test_load_missing_dir_falls_back_to_defaults() {
        let (policy, loaded) = PolicyDocument::load_dir(Path::new("/nonexistent/policies"));
        assert_eq!(loaded, 0);
        assert!(policy.allowed_scopes.is_none());
    }

    #[test]
    fn test_load_document_overrides() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("strict.yaml"),
            "risk_weights:\n  scope: 0.2\n  data_class: 0.6\n  external: 0.4\ndata_class_weights:\n  telemetry: 0.5\n",
        )
        .unwrap();

        let (policy, loaded) = PolicyDocument::load_dir(dir.path());
        assert_eq!(loaded, 1);
        assert_eq!(policy.risk_weights.data_class, 0.6);
        assert_eq!(policy.data_class_weight(DataClass::Telemetry), 0.5);
        // Untouched entries keep their defaults
        assert_eq!(policy.data_class_weight(DataClass::Credentials), 1.0);
    }

    #[test]
    fn test_malformed_document_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.yaml"), ": not valid yaml [").unwrap();
        std::fs::write(
            dir.path().join("good.yaml"),
            "allowed_scopes: [user, app, api]\n",
        )
        .unwrap();

        let (policy, loaded) = PolicyDocument::load_dir(dir.path());
        assert_eq!(loaded, 1);
        let allowed = policy.allowed_scopes.unwrap();
        assert!(allowed.contains(&Scope::App));
        assert!(!allowed.contains(&Scope::External));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("extra.yaml"),
            "future_setting: 42\nrisk_weights:\n  scope: 0.1\n  data_class: 0.4\n  external: 0.2\n",
        )
        .unwrap();

        let (policy, loaded) = PolicyDocument::load_dir(dir.path());
        assert_eq!(loaded, 1);
        assert_eq!(policy.risk_weights.scope, 0.1);
    }

    #[test]
    fn test_store_reload_swaps_document() {
        let dir = TempDir::new().unwrap();
        let store = PolicyStore::load(dir.path());
        assert!(store.current().allowed_scopes.is_none());

        std::fs::write(dir.path().join("lock.yaml"), "allowed_scopes: [user]\n").unwrap();
        assert_eq!(store.reload(), 1);
        assert_eq!(store.current().allowed_scopes.as_deref(), Some(&[Scope::User][..]));
    }
}
