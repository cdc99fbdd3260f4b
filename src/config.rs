//! Guardian configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main Guardian configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardianConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Storage directories
    pub storage: StorageConfig,

    /// Mediation adapter configuration
    pub mediation: MediationConfig,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            mediation: MediationConfig::default(),
        }
    }
}

impl GuardianConfig {
    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: GuardianConfig =
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `GUARDIAN_LEDGER_DIR`, `GUARDIAN_REPORTS_DIR` and
    /// `GUARDIAN_POLICY_DIR` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("GUARDIAN_LEDGER_DIR") {
            self.storage.ledger_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("GUARDIAN_REPORTS_DIR") {
            self.storage.reports_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("GUARDIAN_POLICY_DIR") {
            self.storage.policy_dir = PathBuf::from(dir);
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18900,
        }
    }
}

/// Storage directories for ledgers, reports and policy documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for per-user ledger files
    pub ledger_dir: PathBuf,

    /// Root directory for Inspector report artifacts
    pub reports_dir: PathBuf,

    /// Directory scanned for policy documents at startup
    pub policy_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("guardian");

        Self {
            ledger_dir: base.join("ledgers"),
            reports_dir: base.join("reports"),
            policy_dir: base.join("policies"),
        }
    }
}

/// Mediation adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediationConfig {
    /// Path prefixes the adapter never mediates (health, metrics and the
    /// Guardian's own inspection routes, to avoid recursion)
    pub skip_paths: Vec<String>,
}

impl Default for MediationConfig {
    fn default() -> Self {
        Self {
            skip_paths: vec![
                "/health".to_string(),
                "/metrics".to_string(),
                "/api/v1/guardian".to_string(),
            ],
        }
    }
}

// Helper module for default directories
mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }
}
