//! Mediation adapter: axum middleware at the host boundary
//!
//! Every incoming request becomes an `api_call` event before the handler
//! runs; the finalized action decides whether the request proceeds. A
//! best-effort `api_response` event is emitted on the way out without
//! delaying the client.

use crate::event::{DataClass, Event, GuardianAction, Scope};
use crate::service::GuardianService;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct MediationState {
    pub service: Arc<GuardianService>,
    /// Path prefixes exempt from mediation, to avoid recursion on the
    /// guardian's own surfaces.
    pub skip_paths: Vec<String>,
}

impl MediationState {
    pub fn new(service: Arc<GuardianService>, skip_paths: Vec<String>) -> Self {
        Self {
            service,
            skip_paths,
        }
    }

    fn skip(&self, path: &str) -> bool {
        self.skip_paths.iter().any(|p| path.starts_with(p.as_str()))
    }
}

/// Scope follows the first path segment.
fn scope_for(path: &str) -> Scope {
    match path.trim_start_matches('/').split('/').next() {
        Some("external") => Scope::External,
        Some("api") => Scope::Api,
        _ => Scope::App,
    }
}

pub async fn mediate(
    State(state): State<MediationState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if state.skip(&path) {
        return next.run(req).await;
    }

    let method = req.method().to_string();
    let user_id = req
        .headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    // Header names only; values never enter the event
    let header_names: Vec<String> = req.headers().keys().map(|k| k.to_string()).collect();

    let event = Event::new(
        "api_call",
        scope_for(&path),
        DataClass::Telemetry,
        format!("{} {}", method, path),
        json!({"method": method, "path": path, "headers": header_names}),
        "request_mediation",
        user_id.clone(),
        None,
        "adapter",
        None,
    );

    let mediated = match state.service.emit(event).await {
        Ok(event) => event,
        Err(e) => {
            tracing::error!("Mediation failed for {} {}: {}", method, path, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({
                    "error": {"code": "mediation_failed", "message": "request could not be audited"}
                })),
            )
                .into_response();
        }
    };

    if mediated.guardian_action == GuardianAction::Block {
        return (
            StatusCode::FORBIDDEN,
            axum::Json(json!({
                "error": {"code": "blocked_by_guardian", "message": mediated.action_reason}
            })),
        )
            .into_response();
    }

    let started = Instant::now();
    let response = next.run(req).await;
    let status = response.status().as_u16();

    // Best-effort; must never delay the client
    let service = state.service.clone();
    let scope = scope_for(&path);
    tokio::spawn(async move {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let event = Event::new(
            "api_response",
            scope,
            DataClass::Telemetry,
            format!("{} {} -> {}", method, path, status),
            json!({"method": method, "path": path, "status": status, "elapsed_ms": elapsed_ms}),
            "request_mediation",
            user_id,
            None,
            "adapter",
            None,
        );
        if let Err(e) = service.emit(event).await {
            tracing::warn!("Response event dropped for {}: {}", path, e);
        }
    });

    response
}
