//! HTTP handlers for the admin surface
//!
//! - PUT  /api/v1/guardian/mode/private             — toggle private mode
//! - PUT  /api/v1/guardian/mode/lockdown            — toggle lockdown
//! - GET  /api/v1/guardian/trust/:user_id/summary   — activity summary (?hours=24)
//! - GET  /api/v1/guardian/trust/:user_id/report    — daily trust report artifact
//! - GET  /api/v1/guardian/trust/:user_id/recommendations
//! - POST /api/v1/guardian/trust/:user_id/signals/disable
//! - GET  /api/v1/guardian/trust/:user_id/export    — trust model backup
//! - POST /api/v1/guardian/trust/:user_id/import    — trust model restore
//! - GET  /api/v1/guardian/ledger/:user_id/verify   — chain integrity check
//! - GET  /api/v1/guardian/ledger/:user_id/entries  — recent entries (?limit=50)
//! - POST /api/v1/guardian/decisions                — record a user decision
//! - POST /api/v1/guardian/policy/reload            — re-scan policy documents

use crate::admin::types::{
    ApiError, DecisionRequest, EntriesQuery, ModeRequest, ModeResponse, SummaryQuery,
};
use crate::error::Error;
use crate::service::GuardianService;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;

const DEFAULT_SUMMARY_HOURS: i64 = 24;
const DEFAULT_ENTRY_LIMIT: usize = 50;

/// Create the admin router
pub fn admin_router(service: Arc<GuardianService>) -> Router {
    Router::new()
        .route("/api/v1/guardian/mode/private", put(set_private_mode))
        .route("/api/v1/guardian/mode/lockdown", put(set_lockdown))
        .route("/api/v1/guardian/trust/:user_id/summary", get(trust_summary))
        .route("/api/v1/guardian/trust/:user_id/report", get(trust_report))
        .route(
            "/api/v1/guardian/trust/:user_id/recommendations",
            get(recommendations),
        )
        .route(
            "/api/v1/guardian/trust/:user_id/signals/disable",
            post(disable_signal),
        )
        .route("/api/v1/guardian/trust/:user_id/export", get(export_trust))
        .route("/api/v1/guardian/trust/:user_id/import", post(import_trust))
        .route("/api/v1/guardian/ledger/:user_id/verify", get(verify_ledger))
        .route(
            "/api/v1/guardian/ledger/:user_id/entries",
            get(ledger_entries),
        )
        .route("/api/v1/guardian/decisions", post(record_decision))
        .route("/api/v1/guardian/policy/reload", post(reload_policy))
        .with_state(service)
}

/// PUT /api/v1/guardian/mode/private
async fn set_private_mode(
    State(service): State<Arc<GuardianService>>,
    Json(request): Json<ModeRequest>,
) -> impl IntoResponse {
    let changed = service
        .set_private_mode(request.enabled, request.user_id.as_deref())
        .await;
    Json(ModeResponse {
        enabled: request.enabled,
        changed,
    })
}

/// PUT /api/v1/guardian/mode/lockdown
async fn set_lockdown(
    State(service): State<Arc<GuardianService>>,
    Json(request): Json<ModeRequest>,
) -> impl IntoResponse {
    let changed = service.set_lockdown(request.enabled);
    Json(ModeResponse {
        enabled: request.enabled,
        changed,
    })
}

/// GET /api/v1/guardian/trust/:user_id/summary?hours=24
async fn trust_summary(
    State(service): State<Arc<GuardianService>>,
    Path(user_id): Path<String>,
    Query(params): Query<SummaryQuery>,
) -> impl IntoResponse {
    let hours = params.hours.unwrap_or(DEFAULT_SUMMARY_HOURS);
    if hours <= 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(
                serde_json::to_value(ApiError::bad_request("hours must be positive"))
                    .unwrap_or_default(),
            ),
        );
    }
    match service.inspector().analyze(&user_id, hours).await {
        Ok(summary) => {
            let recent = match service.ledger().read(&user_id, Some(10)).await {
                Ok(entries) => entries,
                Err(_) => Vec::new(),
            };
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "summary": summary,
                    "recentEntries": recent,
                })),
            )
        }
        Err(e) => internal(e),
    }
}

/// GET /api/v1/guardian/trust/:user_id/report
async fn trust_report(
    State(service): State<Arc<GuardianService>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match service.inspector().trust_report(&user_id).await {
        Ok(report) => (
            StatusCode::OK,
            Json(serde_json::to_value(report).unwrap_or_default()),
        ),
        Err(e) => internal(e),
    }
}

/// GET /api/v1/guardian/trust/:user_id/recommendations
async fn recommendations(
    State(service): State<Arc<GuardianService>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let recommendations = service.trust().recommendations(&user_id).await;
    let suggested = service.trust().suggest_trust_level(&user_id).await;
    Json(serde_json::json!({
        "recommendations": recommendations,
        "suggestedTrustLevel": suggested,
    }))
}

/// POST /api/v1/guardian/trust/:user_id/signals/disable
async fn disable_signal(
    State(service): State<Arc<GuardianService>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let total = service.trust().note_signal_disabled(&user_id).await;
    Json(serde_json::json!({"disabledSignals": total}))
}

/// GET /api/v1/guardian/trust/:user_id/export
async fn export_trust(
    State(service): State<Arc<GuardianService>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match service.trust().export(&user_id).await {
        Ok(doc) => (StatusCode::OK, Json(doc)),
        Err(e) => internal(e),
    }
}

/// POST /api/v1/guardian/trust/:user_id/import
async fn import_trust(
    State(service): State<Arc<GuardianService>>,
    Path(user_id): Path<String>,
    Json(doc): Json<serde_json::Value>,
) -> impl IntoResponse {
    match service.trust().import(&user_id, doc).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"imported": true}))),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(
                serde_json::to_value(ApiError::bad_request(e.to_string())).unwrap_or_default(),
            ),
        ),
    }
}

/// GET /api/v1/guardian/ledger/:user_id/verify
async fn verify_ledger(
    State(service): State<Arc<GuardianService>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match service.ledger().verify(&user_id).await {
        Ok(report) => (
            StatusCode::OK,
            Json(serde_json::to_value(report).unwrap_or_default()),
        ),
        Err(e) => internal(e),
    }
}

/// GET /api/v1/guardian/ledger/:user_id/entries?limit=50
async fn ledger_entries(
    State(service): State<Arc<GuardianService>>,
    Path(user_id): Path<String>,
    Query(params): Query<EntriesQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(DEFAULT_ENTRY_LIMIT);
    match service.ledger().read(&user_id, Some(limit)).await {
        Ok(entries) => (
            StatusCode::OK,
            Json(serde_json::to_value(entries).unwrap_or_default()),
        ),
        Err(e) => internal(e),
    }
}

/// POST /api/v1/guardian/decisions
async fn record_decision(
    State(service): State<Arc<GuardianService>>,
    Json(request): Json<DecisionRequest>,
) -> impl IntoResponse {
    match service
        .record_decision(&request.event_id, request.decision)
        .await
    {
        Ok(event) => (
            StatusCode::OK,
            Json(serde_json::to_value(event).unwrap_or_default()),
        ),
        Err(Error::InvalidEvent(message)) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::to_value(ApiError::not_found(message)).unwrap_or_default()),
        ),
        Err(e) => internal(e),
    }
}

/// POST /api/v1/guardian/policy/reload
async fn reload_policy(State(service): State<Arc<GuardianService>>) -> impl IntoResponse {
    let loaded = service.policy().reload();
    Json(serde_json::json!({"documentsLoaded": loaded}))
}

fn internal(e: Error) -> (StatusCode, Json<serde_json::Value>) {
    tracing::error!("Admin request failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::to_value(ApiError::internal(e.to_string())).unwrap_or_default()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GuardianConfig, StorageConfig};
    use crate::event::{DataClass, Event, Scope};
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn make_service() -> (Arc<GuardianService>, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = GuardianConfig {
            storage: StorageConfig {
                ledger_dir: dir.path().join("ledger"),
                reports_dir: dir.path().join("reports"),
                policy_dir: dir.path().join("policies"),
            },
            ..Default::default()
        };
        let service = GuardianService::new(&config).await.unwrap();
        (service, dir)
    }

    async fn emit_one(service: &Arc<GuardianService>) -> Event {
        service
            .emit(Event::new(
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
            ))
            .await
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 256)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_private_mode_toggle() {
        let (service, _dir) = make_service().await;
        let app = admin_router(service.clone());

        let resp = app
            .oneshot(json_request(
                "PUT",
                "/api/v1/guardian/mode/private",
                json!({"enabled": true}),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["enabled"], true);
        assert_eq!(body["changed"], true);
        assert!(service.is_private_mode());
    }

    #[tokio::test]
    async fn test_repeat_toggle_reports_unchanged() {
        let (service, _dir) = make_service().await;
        service.set_lockdown(true);
        let app = admin_router(service);

        let resp = app
            .oneshot(json_request(
                "PUT",
                "/api/v1/guardian/mode/lockdown",
                json!({"enabled": true}),
            ))
            .await
            .unwrap();

        let body = body_json(resp).await;
        assert_eq!(body["changed"], false);
    }

    #[tokio::test]
    async fn test_trust_summary() {
        let (service, _dir) = make_service().await;
        emit_one(&service).await;
        let app = admin_router(service);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/guardian/trust/U1/summary?hours=24")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["summary"]["totalEvents"], 1);
        assert_eq!(body["recentEntries"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_trust_summary_rejects_bad_window() {
        let (service, _dir) = make_service().await;
        let app = admin_router(service);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/guardian/trust/U1/summary?hours=0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_verify_endpoint() {
        let (service, _dir) = make_service().await;
        emit_one(&service).await;
        let app = admin_router(service);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/guardian/ledger/U1/verify")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["valid"], true);
        assert_eq!(body["entries"], 1);
    }

    #[tokio::test]
    async fn test_ledger_entries_with_limit() {
        let (service, _dir) = make_service().await;
        for _ in 0..3 {
            emit_one(&service).await;
        }
        let app = admin_router(service);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/guardian/ledger/U1/entries?limit=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_json(resp).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_record_decision_roundtrip() {
        let (service, _dir) = make_service().await;
        let event = emit_one(&service).await;
        let app = admin_router(service);

        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/v1/guardian/decisions",
                json!({"eventId": event.event_id, "decision": "deny"}),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["user_decision"], "deny");
    }

    #[tokio::test]
    async fn test_record_decision_unknown_event_404() {
        let (service, _dir) = make_service().await;
        let app = admin_router(service);

        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/v1/guardian/decisions",
                json!({"eventId": "evt-missing", "decision": "allow"}),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_export_import_endpoints() {
        let (service, _dir) = make_service().await;
        emit_one(&service).await;
        let app = admin_router(service.clone());

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/guardian/trust/U1/export")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let exported = body_json(resp).await;
        assert_eq!(exported["user_id"], "U1");

        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/v1/guardian/trust/U1/import",
                exported,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_import_rejects_garbage() {
        let (service, _dir) = make_service().await;
        let app = admin_router(service);

        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/v1/guardian/trust/U1/import",
                json!({"not": "a model"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_disable_signal_feeds_recommendations() {
        let (service, _dir) = make_service().await;
        let app = admin_router(service);

        let mut last = serde_json::Value::Null;
        for _ in 0..4 {
            let resp = app
                .clone()
                .oneshot(json_request(
                    "POST",
                    "/api/v1/guardian/trust/U1/signals/disable",
                    json!({}),
                ))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            last = body_json(resp).await;
        }
        assert_eq!(last["disabledSignals"], 4);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/guardian/trust/U1/recommendations")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(resp).await;
        assert!(body["recommendations"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r["kind"] == "review_signals"));
    }

    #[tokio::test]
    async fn test_policy_reload() {
        let (service, dir) = make_service().await;
        let policy_dir = dir.path().join("policies");
        std::fs::create_dir_all(&policy_dir).unwrap();
        std::fs::write(
            policy_dir.join("custom.yaml"),
            "action_thresholds:\n  block: 0.9\n",
        )
        .unwrap();
        let app = admin_router(service.clone());

        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/v1/guardian/policy/reload",
                json!({}),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["documentsLoaded"], 1);
        assert_eq!(service.policy().current().action_thresholds.block, 0.9);
    }
}
