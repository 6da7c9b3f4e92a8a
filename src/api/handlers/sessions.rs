use super::{error_response, ApiError};
use crate::{api::Engine, logout::LogoutRequest, ticket::Ticket};
use axum::{
    extract::{Extension, Path},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

/// A live single sign-on session.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Session {
    id: String,
    principal: String,
    creation_time: DateTime<Utc>,
    last_time_used: DateTime<Utc>,
    count_of_uses: u32,
    /// Services the session granted tickets for.
    services: Vec<String>,
    proxied: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogoutNotice {
    id: String,
    service: String,
    ticket: String,
}

impl From<&LogoutRequest> for LogoutNotice {
    fn from(request: &LogoutRequest) -> Self {
        Self {
            id: request.id().to_string(),
            service: request.service().id().to_string(),
            ticket: request.ticket_id().to_string(),
        }
    }
}

#[utoipa::path(
    get,
    path= "/v1/sessions",
    responses (
        (status = 200, description = "Unexpired sessions", body = [Session]),
        (status = 501, description = "Registry cannot enumerate tickets", body = super::ErrorBody)
    ),
    tag = "passage",
)]
pub async fn sessions(engine: Extension<Arc<Engine>>) -> Result<Json<Vec<Session>>, ApiError> {
    let tickets = engine
        .cas()
        .registry()
        .get_tickets()
        .map_err(|e| error_response(&e))?;

    let sessions = tickets
        .iter()
        .filter(|ticket| !ticket.is_expired())
        .filter_map(Ticket::as_ticket_granting)
        .map(|tgt| Session {
            id: tgt.id().to_string(),
            principal: tgt.root_authentication().principal().id().to_string(),
            creation_time: tgt.creation_time(),
            last_time_used: tgt.last_time_used(),
            count_of_uses: tgt.count_of_uses(),
            services: tgt.services().values().map(|s| s.id().to_string()).collect(),
            proxied: !tgt.is_root(),
        })
        .collect();

    Ok(Json(sessions))
}

#[utoipa::path(
    delete,
    path= "/v1/sessions/{id}",
    params(("id" = String, Path, description = "Ticket-granting ticket id")),
    responses (
        (
            status = 200,
            description = "Session destroyed, logout notices owed to its services",
            body = [LogoutNotice]
        ),
        (status = 404, description = "Unknown session", body = super::ErrorBody)
    ),
    tag = "passage",
)]
#[instrument(skip(engine))]
pub async fn destroy_session(
    engine: Extension<Arc<Engine>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LogoutNotice>>, ApiError> {
    let requests = engine
        .cas()
        .destroy_ticket_granting_ticket(&id)
        .map_err(|e| error_response(&e))?;

    info!("session destroyed, {} logout notices", requests.len());

    Ok(Json(requests.iter().map(LogoutNotice::from).collect()))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::{
            handlers::test_support::{self, WIKI},
            router,
        },
        services::Service,
    };
    use axum::{body::Body, http::Request, http::StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn list_and_destroy() -> anyhow::Result<()> {
        let engine = test_support::engine()?;
        let response = router(engine.clone())
            .oneshot(test_support::post_json(
                "/v1/flow/authenticate",
                &json!({
                    "credential": {
                        "type": "username_password",
                        "username": "casuser",
                        "password": "Mellon"
                    }
                }),
            )?)
            .await?;
        let payload = test_support::json(response).await?;
        let tgt = payload["ticket_granting_ticket"].as_str().unwrap_or_default().to_string();
        engine
            .cas()
            .grant_service_ticket(&tgt, &Service::new(WIKI), None)?;

        let response = router(engine.clone())
            .oneshot(Request::builder().uri("/v1/sessions").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let payload = test_support::json(response).await?;
        assert_eq!(payload[0]["id"], tgt.as_str());
        assert_eq!(payload[0]["principal"], "casuser");
        assert_eq!(payload[0]["services"][0], WIKI);

        let response = router(engine.clone())
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/v1/sessions/{tgt}"))
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let payload = test_support::json(response).await?;
        assert_eq!(payload[0]["service"], WIKI);

        let response = router(engine)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/v1/sessions/{tgt}"))
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }
}
