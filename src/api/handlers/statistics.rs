use super::{error_response, ApiError};
use crate::{api::Engine, error::Error};
use axum::{extract::Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Statistics {
    registry: String,
    /// `None` when the registry cannot enumerate.
    sessions: Option<usize>,
    service_tickets: Option<usize>,
    registered_services: usize,
    pending_flows: usize,
}

#[utoipa::path(
    get,
    path= "/v1/statistics",
    responses (
        (status = 200, description = "Ticket and service counts", body = Statistics),
        (status = 500, description = "Registry failure", body = super::ErrorBody)
    ),
    tag = "passage",
)]
pub async fn statistics(engine: Extension<Arc<Engine>>) -> Result<Json<Statistics>, ApiError> {
    let registry = engine.cas().registry();
    let count = |result: crate::error::Result<usize>| match result {
        Ok(count) => Ok(Some(count)),
        Err(Error::Unsupported { .. }) => Ok(None),
        Err(e) => Err(error_response(&e)),
    };

    Ok(Json(Statistics {
        registry: registry.name().to_string(),
        sessions: count(registry.session_count())?,
        service_tickets: count(registry.service_ticket_count())?,
        registered_services: engine.cas().services().all_services().len(),
        pending_flows: engine.pending().len().unwrap_or_default(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::{handlers::test_support, router};
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn counts() -> anyhow::Result<()> {
        let engine = test_support::engine()?;
        let response = router(engine)
            .oneshot(Request::builder().uri("/v1/statistics").body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let payload = test_support::json(response).await?;
        assert_eq!(payload["registry"], "memory");
        assert_eq!(payload["sessions"], 0);
        assert_eq!(payload["service_tickets"], 0);
        assert_eq!(payload["registered_services"], 2);
        Ok(())
    }
}
