//! Credential settings: username and password changes.

use axum::{
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth_error_response;
use crate::api::PanelState;

#[derive(Deserialize)]
pub struct UpdateRequest {
    username: String,
    #[serde(default)]
    password: Option<String>,
    csrf_token: String,
}

/// Change username and optionally password. CSRF verification happens
/// inside the flow so the check and the mutation share one gate.
pub async fn update(
    Extension(state): Extension<Arc<PanelState>>,
    headers: HeaderMap,
    Json(body): Json<UpdateRequest>,
) -> Response {
    let Some(session_id) = super::resolve_session(&state, &headers).await else {
        return auth_error_response(&crate::auth::AuthError::NotAuthenticated);
    };
    match state
        .auth
        .update_credentials(
            &session_id,
            &body.csrf_token,
            &body.username,
            body.password.as_deref(),
        )
        .await
    {
        Ok(()) => Json(serde_json::json!({ "status": "ok" })).into_response(),
        Err(e) => auth_error_response(&e),
    }
}
