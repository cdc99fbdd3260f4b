//! Wire types for the admin surface

use crate::event::UserDecision;
use serde::{Deserialize, Serialize};

/// API error envelope
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

/// API error detail
#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: "NOT_FOUND".to_string(),
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: "BAD_REQUEST".to_string(),
                message: message.into(),
            },
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: "INTERNAL_ERROR".to_string(),
                message: message.into(),
            },
        }
    }
}

/// Request body for mode toggles
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeRequest {
    pub enabled: bool,
    /// Attributes the toggle to a user's trust model when present
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Response from mode toggles
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeResponse {
    pub enabled: bool,
    pub changed: bool,
}

/// Query params for the trust summary endpoint
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub hours: Option<i64>,
}

/// Query params for ledger entry listing
#[derive(Debug, Deserialize)]
pub struct EntriesQuery {
    pub limit: Option<usize>,
}

/// Request body for recording a user decision
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub event_id: String,
    pub decision: UserDecision,
}
