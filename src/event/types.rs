//! Core event types
//!
//! An [`Event`] describes one data-touching operation: where the data flows
//! ([`Scope`]), what kind of data it is ([`DataClass`]), the payload snapshot
//! that enforcement mutates, and the risk/action slots filled by the policy
//! engine. Enum wire forms are snake_case; ledger serialization keeps the
//! snake_case field names listed in the on-disk format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the data flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// User's own data access on-device
    User,
    /// Internal app operations
    App,
    /// First-party backend API calls
    Api,
    /// Third-party outbound
    External,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::App => write!(f, "app"),
            Self::Api => write!(f, "api"),
            Self::External => write!(f, "external"),
        }
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "app" => Ok(Self::App),
            "api" => Ok(Self::Api),
            "external" => Ok(Self::External),
            other => Err(format!("unknown scope: {}", other)),
        }
    }
}

/// Category of data touched; drives risk weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataClass {
    Telemetry,
    Location,
    Audio,
    Video,
    Biometrics,
    Contacts,
    Calendar,
    Messages,
    Files,
    Browsing,
    Credentials,
    Payment,
    Health,
    Other,
}

impl DataClass {
    /// Classes whose mere presence is flagged as sensitive by the Inspector
    /// and that force the MFA precondition.
    pub fn is_sensitive(self) -> bool {
        matches!(
            self,
            Self::Credentials | Self::Payment | Self::Biometrics | Self::Health
        )
    }
}

impl std::fmt::Display for DataClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Telemetry => "telemetry",
            Self::Location => "location",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Biometrics => "biometrics",
            Self::Contacts => "contacts",
            Self::Calendar => "calendar",
            Self::Messages => "messages",
            Self::Files => "files",
            Self::Browsing => "browsing",
            Self::Credentials => "credentials",
            Self::Payment => "payment",
            Self::Health => "health",
            Self::Other => "other",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for DataClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "telemetry" => Ok(Self::Telemetry),
            "location" => Ok(Self::Location),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "biometrics" => Ok(Self::Biometrics),
            "contacts" => Ok(Self::Contacts),
            "calendar" => Ok(Self::Calendar),
            "messages" => Ok(Self::Messages),
            "files" => Ok(Self::Files),
            "browsing" => Ok(Self::Browsing),
            "credentials" => Ok(Self::Credentials),
            "payment" => Ok(Self::Payment),
            "health" => Ok(Self::Health),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown data class: {}", other)),
        }
    }
}

/// Risk band the assessed score falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// The Guardian's chosen mediation for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardianAction {
    Allow,
    Redact,
    Mask,
    Alert,
    Block,
}

impl std::fmt::Display for GuardianAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Redact => write!(f, "redact"),
            Self::Mask => write!(f, "mask"),
            Self::Alert => write!(f, "alert"),
            Self::Block => write!(f, "block"),
        }
    }
}

/// Decision supplied later by the host UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserDecision {
    Allow,
    Deny,
    Pending,
}

impl std::str::FromStr for UserDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            "pending" => Ok(Self::Pending),
            other => Err(format!("unknown user decision: {}", other)),
        }
    }
}

/// One record of a data-touching operation.
///
/// Constructed with placeholder risk/action slots; the policy engine and
/// enforcement fill them before the event reaches the ledger. Once appended
/// to the ledger an event is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub event_type: String,
    pub scope: Scope,
    pub data_class: DataClass,
    pub description: String,
    pub purpose: String,
    /// Payload snapshot that enforcement mutates; always a JSON object
    pub data_touched: serde_json::Value,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub mfa_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_decision: Option<UserDecision>,

    // Filled by the policy engine
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<String>,

    // Filled by enforcement
    pub guardian_action: GuardianAction,
    pub action_reason: String,
}

impl Event {
    /// Construct a new event with a fresh id and the current UTC time.
    /// Risk and action slots hold placeholders until assessment runs.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_type: impl Into<String>,
        scope: Scope,
        data_class: DataClass,
        description: impl Into<String>,
        data_touched: serde_json::Value,
        purpose: impl Into<String>,
        user_id: Option<String>,
        session_id: Option<String>,
        source: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_id: format!("evt-{}", uuid::Uuid::new_v4()),
            timestamp: Utc::now(),
            user_id,
            session_id,
            event_type: event_type.into(),
            scope,
            data_class,
            description: description.into(),
            purpose: purpose.into(),
            data_touched,
            source: source.into(),
            metadata,
            mfa_required: false,
            user_decision: None,
            risk_score: 0.0,
            risk_level: RiskLevel::Low,
            risk_factors: Vec::new(),
            guardian_action: GuardianAction::Allow,
            action_reason: String::new(),
        }
    }

    /// Ledger file owner for this event ("anonymous" when no user is set).
    pub fn ledger_owner(&self) -> &str {
        self.user_id.as_deref().unwrap_or("anonymous")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event() -> Event {
        Event::new(
            "api_call",
            Scope::App,
            DataClass::Telemetry,
            "GET /home",
            json!({"method": "GET", "path": "/home"}),
            "nav",
            Some("U1".to_string()),
            None,
            "adapter",
            None,
        )
    }

    #[test]
    fn test_event_construction() {
        let event = sample_event();
        assert!(event.event_id.starts_with("evt-"));
        assert_eq!(event.scope, Scope::App);
        assert_eq!(event.data_class, DataClass::Telemetry);
        assert!(event.risk_factors.is_empty());
        assert!(!event.mfa_required);
        assert_eq!(event.ledger_owner(), "U1");
    }

    #[test]
    fn test_anonymous_owner() {
        let mut event = sample_event();
        event.user_id = None;
        assert_eq!(event.ledger_owner(), "anonymous");
    }

    #[test]
    fn test_event_serialization_omits_absent_fields() {
        let mut event = sample_event();
        event.session_id = None;
        event.metadata = None;
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_id\""));
        assert!(json.contains("\"scope\":\"app\""));
        assert!(json.contains("\"data_class\":\"telemetry\""));
        assert!(!json.contains("session_id"));
        assert!(!json.contains("metadata"));
        assert!(!json.contains("user_decision"));
    }

    #[test]
    fn test_event_round_trip() {
        let event = sample_event();
        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_id, event.event_id);
        assert_eq!(parsed.timestamp, event.timestamp);
        assert_eq!(parsed.data_touched, event.data_touched);
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!("external".parse::<Scope>().unwrap(), Scope::External);
        assert_eq!("api".parse::<Scope>().unwrap(), Scope::Api);
        assert!("internet".parse::<Scope>().is_err());
    }

    #[test]
    fn test_data_class_from_str() {
        assert_eq!(
            "credentials".parse::<DataClass>().unwrap(),
            DataClass::Credentials
        );
        assert!("unknown_class".parse::<DataClass>().is_err());
    }

    #[test]
    fn test_data_class_sensitivity() {
        assert!(DataClass::Credentials.is_sensitive());
        assert!(DataClass::Payment.is_sensitive());
        assert!(DataClass::Biometrics.is_sensitive());
        assert!(DataClass::Health.is_sensitive());
        assert!(!DataClass::Telemetry.is_sensitive());
        assert!(!DataClass::Files.is_sensitive());
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn test_action_display() {
        assert_eq!(GuardianAction::Block.to_string(), "block");
        assert_eq!(GuardianAction::Redact.to_string(), "redact");
    }
}
