use crate::{
    api::Engine,
    error::Error,
    GIT_COMMIT_HASH,
};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    registry: String,
    sessions: Option<usize>,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Ticket registry is reachable", body = Health),
        (status = 503, description = "Ticket registry is failing", body = Health)
    ),
    tag = "health",
)]
/// Report build information and whether the ticket registry answers.
pub async fn health(method: Method, engine: Extension<Arc<Engine>>) -> impl IntoResponse {
    let registry = engine.cas().registry();
    let (sessions, healthy) = match registry.session_count() {
        Ok(count) => (Some(count), true),
        // a registry that cannot enumerate is still serving tickets
        Err(Error::Unsupported { .. }) => (None, true),
        Err(e) => {
            error!("Failed to count sessions: {}", e);
            (None, false)
        }
    };

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        registry: registry.name().to_string(),
        sessions,
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .map_err(|err| {
            debug!("Failed to parse X-App header: {}", err);
        })
        .unwrap_or_else(|()| HeaderMap::new());

    if healthy {
        (StatusCode::OK, headers, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}
