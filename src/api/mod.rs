//! HTTP layer: router construction, middleware stack, and serving.

use anyhow::Result;
use axum::{
    Extension,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;

use crate::auth::{AuthFlow, SessionStore};
use crate::gateway::{GatewayInvoker, RoutingConfigLoader};

pub(crate) mod handlers;

/// Shared state injected into every handler.
pub struct PanelState {
    pub auth: AuthFlow,
    pub sessions: Arc<SessionStore>,
    pub routing: RoutingConfigLoader,
    pub gateway: Arc<dyn GatewayInvoker>,
}

/// Build the full application router with the middleware stack applied.
#[must_use]
pub fn router(state: Arc<PanelState>) -> Router {
    Router::new()
        .route("/", get(handlers::dashboard::dashboard))
        .route("/health", get(handlers::health::health))
        .route("/session", get(handlers::session::session))
        .route("/login", post(handlers::login::login))
        .route("/login/totp", post(handlers::login::second_factor))
        .route("/logout", post(handlers::login::logout))
        .route("/settings/update", post(handlers::settings::update))
        .route("/settings/2fa/setup", post(handlers::twofa::setup))
        .route("/settings/2fa/verify", post(handlers::twofa::verify))
        .route("/settings/2fa/disable", post(handlers::twofa::disable))
        .route("/action/add", post(handlers::domains::add))
        .route("/action/remove", post(handlers::domains::remove))
        .route("/action/sync", post(handlers::domains::sync))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn serve(port: u16, state: Arc<PanelState>) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
