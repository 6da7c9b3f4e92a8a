//! HTTP bridge between the login flow orchestrator and the engine.

use crate::{cas::CentralAuthenticationService, webflow::LoginFlow};
use anyhow::Result;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    routing::{delete, get, post},
    Extension, Router,
};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;
mod pending;

pub use openapi::openapi;
pub use pending::PendingFlows;

/// How long a login waiting for its next factor is kept.
pub const DEFAULT_PENDING_FLOW_TTL: Duration = Duration::from_secs(300);

/// Everything the handlers need, shared through an `Extension`.
pub struct Engine {
    cas: Arc<CentralAuthenticationService>,
    flow: LoginFlow,
    pending: PendingFlows,
}

impl Engine {
    pub fn new(cas: Arc<CentralAuthenticationService>, flow: LoginFlow) -> Self {
        Self {
            cas,
            flow,
            pending: PendingFlows::new(DEFAULT_PENDING_FLOW_TTL),
        }
    }

    #[must_use]
    pub fn with_pending_flow_ttl(mut self, ttl: Duration) -> Self {
        self.pending = PendingFlows::new(ttl);
        self
    }

    #[must_use]
    pub fn cas(&self) -> &CentralAuthenticationService {
        &self.cas
    }

    #[must_use]
    pub fn flow(&self) -> &LoginFlow {
        &self.flow
    }

    #[must_use]
    pub fn pending(&self) -> &PendingFlows {
        &self.pending
    }
}

/// Build the application router.
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/v1/flow/authenticate", post(handlers::authenticate))
        .route("/v1/flow/service-ticket", post(handlers::service_ticket))
        .route("/v1/flow/validate", post(handlers::validate))
        .route("/v1/sessions", get(handlers::sessions))
        .route("/v1/sessions/:id", delete(handlers::destroy_session))
        .route("/v1/statistics", get(handlers::statistics))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span)),
        )
        .route("/health", get(handlers::health).options(handlers::health))
        .layer(Extension(engine))
}

/// Serve until `shutdown` resolves.
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails
pub async fn new<F>(port: u16, engine: Arc<Engine>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(engine);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}
