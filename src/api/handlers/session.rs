//! Current-session introspection: auth state, CSRF token, and whether a
//! second factor gates the login form.

use axum::{
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Serialize;
use std::sync::Arc;

use super::{auth_error_response, ensure_session, internal_error, with_session_cookie};
use crate::api::PanelState;
use crate::auth::SessionAuth;

#[derive(Serialize)]
struct SessionView {
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    csrf_token: Option<String>,
    second_factor_enabled: bool,
    must_change_password: bool,
}

/// Issues a cookie when none is presented, so the login form can carry a
/// session from its first render.
pub async fn session(
    Extension(state): Extension<Arc<PanelState>>,
    headers: HeaderMap,
) -> Response {
    let (session_id, cookie) = match ensure_session(&state, &headers).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    let credential = match state.auth.credential().await {
        Ok(credential) => credential,
        Err(e) => return auth_error_response(&e),
    };

    let view = match state.sessions.auth_state(&session_id).await {
        SessionAuth::Anonymous => SessionView {
            state: "anonymous",
            username: None,
            csrf_token: None,
            second_factor_enabled: credential.has_second_factor(),
            must_change_password: false,
        },
        SessionAuth::AwaitingSecondFactor { .. } => SessionView {
            state: "awaiting_second_factor",
            username: None,
            csrf_token: None,
            second_factor_enabled: true,
            must_change_password: false,
        },
        SessionAuth::Authenticated { username } => {
            let csrf_token = match state.sessions.csrf_token(&session_id).await {
                Ok(token) => token,
                Err(e) => return internal_error(e),
            };
            SessionView {
                state: "authenticated",
                username: Some(username),
                csrf_token,
                second_factor_enabled: credential.has_second_factor(),
                must_change_password: credential.password_change_required,
            }
        }
    };

    with_session_cookie(Json(view).into_response(), cookie)
}
