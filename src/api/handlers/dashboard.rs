//! Dashboard view: the routing table split into proxies and services,
//! loaded fresh on every render.

use axum::{
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{internal_error, require_active_user};
use crate::api::PanelState;
use crate::gateway::{EntryKind, RoutingEntry};

#[derive(Serialize)]
struct DashboardView {
    user: String,
    csrf_token: String,
    proxies: BTreeMap<String, RoutingEntryView>,
    services: BTreeMap<String, RoutingEntryView>,
}

#[derive(Serialize)]
struct RoutingEntryView {
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip: Option<String>,
}

impl From<&RoutingEntry> for RoutingEntryView {
    fn from(entry: &RoutingEntry) -> Self {
        Self {
            port: entry.port,
            ip: entry.ip.clone(),
        }
    }
}

pub async fn dashboard(
    Extension(state): Extension<Arc<PanelState>>,
    headers: HeaderMap,
) -> Response {
    let (session_id, user) = match require_active_user(&state, &headers).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    let config = match state.routing.load() {
        Ok(config) => config,
        Err(e) => return internal_error(e.into()),
    };

    let csrf_token = match state.sessions.csrf_token(&session_id).await {
        Ok(Some(token)) => token,
        Ok(None) => {
            return super::auth_error_response(&crate::auth::AuthError::NotAuthenticated)
        }
        Err(e) => return internal_error(e),
    };

    let collect = |kind| {
        config
            .entries_of(kind)
            .into_iter()
            .map(|(domain, entry)| (domain.to_string(), RoutingEntryView::from(entry)))
            .collect()
    };

    Json(DashboardView {
        user,
        csrf_token,
        proxies: collect(EntryKind::Proxy),
        services: collect(EntryKind::Service),
    })
    .into_response()
}
