//! Second-factor enrollment and disablement.

use axum::{
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth_error_response;
use crate::api::PanelState;

#[derive(Serialize)]
struct SetupResponse {
    secret: String,
    uri: String,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    code: String,
}

#[derive(Deserialize)]
pub struct DisableRequest {
    password: String,
    #[serde(default)]
    code: Option<String>,
    csrf_token: String,
}

/// Begin enrollment. Authenticated-only but CSRF-free: the pending
/// secret has no effect until confirmed.
pub async fn setup(
    Extension(state): Extension<Arc<PanelState>>,
    headers: HeaderMap,
) -> Response {
    let Some(session_id) = super::resolve_session(&state, &headers).await else {
        return auth_error_response(&crate::auth::AuthError::NotAuthenticated);
    };
    match state.auth.begin_enrollment(&session_id).await {
        Ok(start) => Json(SetupResponse {
            secret: start.secret,
            uri: start.uri,
        })
        .into_response(),
        Err(e) => auth_error_response(&e),
    }
}

/// Confirm enrollment with a code; promotes the pending secret.
pub async fn verify(
    Extension(state): Extension<Arc<PanelState>>,
    headers: HeaderMap,
    Json(body): Json<VerifyRequest>,
) -> Response {
    let Some(session_id) = super::resolve_session(&state, &headers).await else {
        return auth_error_response(&crate::auth::AuthError::NotAuthenticated);
    };
    match state.auth.confirm_enrollment(&session_id, &body.code).await {
        Ok(()) => Json(serde_json::json!({ "success": true })).into_response(),
        Err(e) => auth_error_response(&e),
    }
}

/// Disable the second factor: CSRF + password + current code.
pub async fn disable(
    Extension(state): Extension<Arc<PanelState>>,
    headers: HeaderMap,
    Json(body): Json<DisableRequest>,
) -> Response {
    let Some(session_id) = super::resolve_session(&state, &headers).await else {
        return auth_error_response(&crate::auth::AuthError::NotAuthenticated);
    };
    match state
        .auth
        .disable_second_factor(
            &session_id,
            &body.csrf_token,
            &body.password,
            body.code.as_deref(),
        )
        .await
    {
        Ok(()) => Json(serde_json::json!({ "status": "ok" })).into_response(),
        Err(e) => auth_error_response(&e),
    }
}
