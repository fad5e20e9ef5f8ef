//! Request handlers and the shared authorization gate every mutating
//! endpoint passes through.

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::error;

use crate::api::PanelState;
use crate::auth::{AuthError, SESSION_COOKIE_NAME};
use crate::gateway::ValidationError;

pub(crate) mod dashboard;
pub(crate) mod domains;
pub(crate) mod health;
pub(crate) mod login;
pub(crate) mod session;
pub(crate) mod settings;
pub(crate) mod twofa;

#[derive(Serialize)]
pub(crate) struct ErrorBody {
    error: String,
}

impl ErrorBody {
    pub(crate) fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Extract the session cookie value from the `Cookie` header, if present.
pub(crate) fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE_NAME).then(|| value.to_string())
    })
}

/// Resolve the presented cookie to a live session identifier.
pub(crate) async fn resolve_session(state: &PanelState, headers: &HeaderMap) -> Option<String> {
    let cookie = session_cookie(headers)?;
    state.sessions.resolve(&cookie).await
}

/// Resolve the session or create a fresh anonymous one. The second
/// element is a `Set-Cookie` value when a new cookie must be issued.
pub(crate) async fn ensure_session(
    state: &PanelState,
    headers: &HeaderMap,
) -> Result<(String, Option<String>), Response> {
    if let Some(session_id) = resolve_session(state, headers).await {
        return Ok((session_id, None));
    }
    let session_id = state.sessions.create().await.map_err(internal_error)?;
    let cookie = state.sessions.cookie_header(&session_id);
    Ok((session_id, Some(cookie)))
}

/// Gate: a fully authenticated session, or 401.
pub(crate) async fn require_user(
    state: &PanelState,
    headers: &HeaderMap,
) -> Result<(String, String), Response> {
    let Some(session_id) = resolve_session(state, headers).await else {
        return Err(auth_error_response(&AuthError::NotAuthenticated));
    };
    let Some(username) = state.auth.authenticated_user(&session_id).await else {
        return Err(auth_error_response(&AuthError::NotAuthenticated));
    };
    Ok((session_id, username))
}

/// Gate: authenticated and past the forced-password-change flow. The
/// dashboard and the routing actions stay behind this until the
/// provisioned password has been replaced.
pub(crate) async fn require_active_user(
    state: &PanelState,
    headers: &HeaderMap,
) -> Result<(String, String), Response> {
    let (session_id, username) = require_user(state, headers).await?;
    let change_required = state
        .auth
        .password_change_required()
        .await
        .map_err(|e| auth_error_response(&e))?;
    if change_required {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorBody::new("password change required")),
        )
            .into_response());
    }
    Ok((session_id, username))
}

/// Gate: the presented CSRF token matches the session's, or 403.
pub(crate) async fn require_csrf(
    state: &PanelState,
    session_id: &str,
    presented: &str,
) -> Result<(), Response> {
    if state.sessions.verify_csrf(session_id, presented).await {
        Ok(())
    } else {
        Err(auth_error_response(&AuthError::CsrfMismatch))
    }
}

/// Map an auth failure to its HTTP status. Storage details stay in the
/// server log; the client only sees a generic body.
pub(crate) fn auth_error_response(err: &AuthError) -> Response {
    let status = match err {
        AuthError::InvalidCredentials
        | AuthError::InvalidSecondFactor
        | AuthError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        AuthError::CsrfMismatch => StatusCode::FORBIDDEN,
        AuthError::NoPendingEnrollment => StatusCode::UNPROCESSABLE_ENTITY,
        AuthError::Storage(e) => {
            error!("credential storage failure: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("internal error")),
            )
                .into_response();
        }
    };
    (status, Json(ErrorBody::new(err.to_string()))).into_response()
}

pub(crate) fn validation_error_response(err: &ValidationError) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorBody::new(err.to_string())),
    )
        .into_response()
}

pub(crate) fn internal_error(err: anyhow::Error) -> Response {
    error!("internal error: {err:#}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("internal error")),
    )
        .into_response()
}

/// Attach a `Set-Cookie` header when a fresh session cookie was issued.
pub(crate) fn with_session_cookie(mut response: Response, cookie: Option<String>) -> Response {
    if let Some(cookie) = cookie {
        if let Ok(value) = cookie.parse() {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_cookie_is_extracted_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; flowgate_session=abc.def; lang=en"),
        );
        assert_eq!(session_cookie(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn absent_or_foreign_cookies_yield_none() {
        assert!(session_cookie(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert!(session_cookie(&headers).is_none());
    }

    #[test]
    fn auth_errors_map_to_expected_statuses() {
        let cases = [
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidSecondFactor, StatusCode::UNAUTHORIZED),
            (AuthError::NotAuthenticated, StatusCode::UNAUTHORIZED),
            (AuthError::CsrfMismatch, StatusCode::FORBIDDEN),
            (
                AuthError::NoPendingEnrollment,
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(auth_error_response(&err).status(), status);
        }
    }
}
