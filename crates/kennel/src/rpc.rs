//! JSON-RPC 2.0 dispatch for the notification operations.
//!
//! Protocol problems (bad envelope, unknown method, bad params) come back in
//! `error`. Every domain outcome, including authentication failures, is a
//! `{success, message, ...}` object in `result`.

use kennel_core::{NotificationId, NotificationInput, RequestContext};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::Kennel;

// ---------------------------------------------------------------------------
// Envelope types
// ---------------------------------------------------------------------------

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub id: serde_json::Value,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: serde_json::Value,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }
}

/// Standard JSON-RPC error codes.
pub mod rpc_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

// ---------------------------------------------------------------------------
// Method params
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AddNotificationParams {
    notification: NotificationInput,
}

#[derive(Debug, Deserialize)]
struct RemoveNotificationParams {
    id: NotificationId,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Route a request to the matching notification operation.
///
/// `ctx` carries the caller's bearer credential; the operations run the
/// authorization gate themselves.
pub async fn handle_request(
    kennel: &Kennel,
    ctx: &RequestContext,
    request: &JsonRpcRequest,
) -> JsonRpcResponse {
    if request.jsonrpc != "2.0" {
        return JsonRpcResponse::error(
            request.id.clone(),
            rpc_codes::INVALID_REQUEST,
            format!("unsupported JSON-RPC version: {}", request.jsonrpc),
        );
    }

    info!(method = %request.method, "handling request");

    match request.method.as_str() {
        "getNotifications" => {
            let response = kennel.service.get_notifications(ctx).await;
            to_result(request, &response)
        }
        "addNotification" => {
            let params: AddNotificationParams = match parse_params(request) {
                Ok(p) => p,
                Err(resp) => return resp,
            };
            let response = kennel
                .service
                .add_notification(ctx, params.notification)
                .await;
            to_result(request, &response)
        }
        "removeNotification" => {
            let params: RemoveNotificationParams = match parse_params(request) {
                Ok(p) => p,
                Err(resp) => return resp,
            };
            let response = kennel.service.remove_notification(ctx, params.id).await;
            to_result(request, &response)
        }
        _ => {
            warn!(method = %request.method, "unknown method");
            JsonRpcResponse::error(
                request.id.clone(),
                rpc_codes::METHOD_NOT_FOUND,
                format!("unknown method: {}", request.method),
            )
        }
    }
}

fn parse_params<T: DeserializeOwned>(request: &JsonRpcRequest) -> Result<T, JsonRpcResponse> {
    let params = request
        .params
        .clone()
        .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
    serde_json::from_value(params).map_err(|e| {
        JsonRpcResponse::error(
            request.id.clone(),
            rpc_codes::INVALID_PARAMS,
            format!("invalid params: {}", e),
        )
    })
}

fn to_result<T: Serialize>(request: &JsonRpcRequest, response: &T) -> JsonRpcResponse {
    match serde_json::to_value(response) {
        Ok(value) => JsonRpcResponse::success(request.id.clone(), value),
        Err(e) => JsonRpcResponse::error(
            request.id.clone(),
            rpc_codes::INTERNAL_ERROR,
            format!("failed to serialize result: {}", e),
        ),
    }
}
