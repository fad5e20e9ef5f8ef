//! Two-step login endpoints and logout.

use axum::{
    http::{header, HeaderMap},
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{auth_error_response, ensure_session, resolve_session, with_session_cookie};
use crate::api::PanelState;
use crate::auth::LoginStep;

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct SecondFactorRequest {
    code: String,
}

#[derive(Serialize)]
struct LoginResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    must_change_password: Option<bool>,
}

impl From<LoginStep> for LoginResponse {
    fn from(step: LoginStep) -> Self {
        match step {
            LoginStep::SecondFactorRequired => Self {
                status: "second_factor_required",
                must_change_password: None,
            },
            LoginStep::LoggedIn {
                must_change_password,
            } => Self {
                status: "ok",
                must_change_password: Some(must_change_password),
            },
        }
    }
}

/// Factor 1. Creates a session when the request carries no valid cookie.
pub async fn login(
    Extension(state): Extension<Arc<PanelState>>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Response {
    let (session_id, cookie) = match ensure_session(&state, &headers).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    let response = match state
        .auth
        .submit_credentials(&session_id, &body.username, &body.password)
        .await
    {
        Ok(step) => Json(LoginResponse::from(step)).into_response(),
        Err(e) => auth_error_response(&e),
    };
    // The cookie is set even on failure so retries reuse one session.
    with_session_cookie(response, cookie)
}

/// Factor 2, only meaningful while the session awaits it.
pub async fn second_factor(
    Extension(state): Extension<Arc<PanelState>>,
    headers: HeaderMap,
    Json(body): Json<SecondFactorRequest>,
) -> Response {
    let Some(session_id) = resolve_session(&state, &headers).await else {
        return auth_error_response(&crate::auth::AuthError::NotAuthenticated);
    };
    match state
        .auth
        .submit_second_factor(&session_id, &body.code)
        .await
    {
        Ok(step) => Json(LoginResponse::from(step)).into_response(),
        Err(e) => auth_error_response(&e),
    }
}

/// Destroys the session server-side and clears the cookie. Always
/// succeeds, including for anonymous callers.
pub async fn logout(
    Extension(state): Extension<Arc<PanelState>>,
    headers: HeaderMap,
) -> Response {
    if let Some(session_id) = resolve_session(&state, &headers).await {
        state.auth.logout(&session_id).await;
    }
    let mut response = Json(serde_json::json!({ "status": "ok" })).into_response();
    if let Ok(value) = state.sessions.clear_cookie_header().parse() {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}
