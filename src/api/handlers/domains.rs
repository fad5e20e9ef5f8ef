//! Routing actions: add/remove entries and trigger a config sync through
//! the external gateway tool.

use axum::{
    http::StatusCode,
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{require_active_user, require_csrf, validation_error_response, ErrorBody};
use crate::api::PanelState;
use crate::gateway::{validate_proxy_entry, validate_service_entry, ToolOutcome};

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddKind {
    Proxy,
    Service,
}

#[derive(Deserialize)]
pub struct AddRequest {
    domain: String,
    kind: AddKind,
    #[serde(default)]
    port: Option<u32>,
    #[serde(default)]
    ip: Option<String>,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct RemoveRequest {
    domain: String,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct SyncRequest {
    csrf_token: String,
}

#[derive(Serialize)]
struct ActionResponse {
    status: &'static str,
    output: String,
}

fn tool_response(outcome: ToolOutcome) -> Response {
    if outcome.succeeded {
        Json(ActionResponse {
            status: "ok",
            output: outcome.output,
        })
        .into_response()
    } else {
        // The tool's own output is the most useful diagnostic; routing
        // state is left as the tool left it, no rollback.
        (StatusCode::BAD_GATEWAY, Json(ErrorBody::new(outcome.output))).into_response()
    }
}

pub async fn add(
    Extension(state): Extension<Arc<PanelState>>,
    headers: HeaderMap,
    Json(body): Json<AddRequest>,
) -> Response {
    let (session_id, _user) = match require_active_user(&state, &headers).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };
    if let Err(response) = require_csrf(&state, &session_id, &body.csrf_token).await {
        return response;
    }

    let outcome = match body.kind {
        AddKind::Proxy => {
            if let Err(e) = validate_proxy_entry(&body.domain) {
                return validation_error_response(&e);
            }
            state.gateway.invoke(&["add", &body.domain]).await
        }
        AddKind::Service => {
            let port = body.port.unwrap_or(0);
            if let Err(e) = validate_service_entry(&body.domain, port, body.ip.as_deref()) {
                return validation_error_response(&e);
            }
            let port = port.to_string();
            let mut args = vec!["service", body.domain.as_str(), port.as_str()];
            if let Some(ip) = body.ip.as_deref().filter(|ip| !ip.is_empty()) {
                args.push("--ip");
                args.push(ip);
            }
            state.gateway.invoke(&args).await
        }
    };
    tool_response(outcome)
}

pub async fn remove(
    Extension(state): Extension<Arc<PanelState>>,
    headers: HeaderMap,
    Json(body): Json<RemoveRequest>,
) -> Response {
    let (session_id, _user) = match require_active_user(&state, &headers).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };
    if let Err(response) = require_csrf(&state, &session_id, &body.csrf_token).await {
        return response;
    }
    if let Err(e) = validate_proxy_entry(&body.domain) {
        return validation_error_response(&e);
    }

    tool_response(state.gateway.invoke(&["remove", &body.domain]).await)
}

pub async fn sync(
    Extension(state): Extension<Arc<PanelState>>,
    headers: HeaderMap,
    Json(body): Json<SyncRequest>,
) -> Response {
    let (session_id, _user) = match require_active_user(&state, &headers).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };
    if let Err(response) = require_csrf(&state, &session_id, &body.csrf_token).await {
        return response;
    }

    tool_response(state.gateway.invoke(&["sync"]).await)
}
