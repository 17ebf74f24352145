//! Axum HTTP handlers for the Kennel server.
//!
//! Provides the JSON-RPC endpoint for the notification operations, the
//! server-sent-event stream for `notificationAdded`, and a health check.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use kennel_auth::AuthFailure;
use kennel_core::{RequestContext, Topic};
use tokio_stream::StreamExt;

use crate::rpc::{handle_request, rpc_codes, JsonRpcRequest, JsonRpcResponse};
use crate::Kennel;

/// Event name carried by every frame on the notification stream.
pub const NOTIFICATION_ADDED_EVENT: &str = "notificationAdded";

/// Build the Axum router with all endpoints.
pub fn build_router(kennel: Arc<Kennel>) -> Router {
    Router::new()
        .route("/rpc", post(handle_rpc))
        .route("/subscriptions/notification-added", get(handle_notification_added))
        .route("/health", get(handle_health))
        .with_state(kennel)
}

/// POST /rpc -- JSON-RPC dispatch for the notification operations
async fn handle_rpc(
    State(kennel): State<Arc<Kennel>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return Json(JsonRpcResponse::error(
                serde_json::Value::Null,
                rpc_codes::PARSE_ERROR,
                format!("parse error: {}", e),
            ));
        }
    };
    let ctx = RequestContext::from_bearer(extract_bearer_token(&headers).as_deref());
    Json(handle_request(&kennel, &ctx, &request).await)
}

/// GET /subscriptions/notification-added -- live event stream
///
/// Each created notification arrives as one `notificationAdded` event whose
/// data is `{"notification": {...}}`. The stream never replays history and
/// ends when the client disconnects.
async fn handle_notification_added(
    State(kennel): State<Arc<Kennel>>,
    headers: HeaderMap,
) -> Response {
    let subscription = if kennel.config.subscriptions.require_credential {
        let ctx = RequestContext::from_bearer(extract_bearer_token(&headers).as_deref());
        match kennel.service.notification_added_authorized(&ctx).await {
            Ok(subscription) => subscription,
            Err(failure) => {
                let status = match failure {
                    AuthFailure::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::UNAUTHORIZED,
                };
                return (
                    status,
                    Json(serde_json::json!({
                        "success": false,
                        "message": failure.to_string(),
                    })),
                )
                    .into_response();
            }
        }
    } else {
        kennel.service.notification_added()
    };

    let stream = subscription.map(|event| {
        let frame = Event::default().event(NOTIFICATION_ADDED_EVENT);
        Ok::<_, Infallible>(match frame.json_data(&event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode notification event");
                Event::default().comment("encoding error")
            }
        })
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// GET /health -- server info
async fn handle_health(State(kennel): State<Arc<Kennel>>) -> Json<serde_json::Value> {
    let snapshot = kennel.service.subscription_snapshot();
    let subscribers = kennel
        .service
        .broker()
        .subscriber_count(&Topic::notification_added());

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": kennel.backend(),
        "subscriptions": snapshot,
        "subscribers": subscribers,
    }))
}

/// Extract the bearer token from the Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}
