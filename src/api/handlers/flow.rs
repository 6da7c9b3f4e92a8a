use super::{bad_request, error_response, sessions::LogoutNotice, ApiError};
use crate::{
    api::Engine,
    authentication::Credential,
    services::Service,
    webflow::{Event, RequestContext},
};
use axum::{extract::Extension, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

/// One step of a login. Either start a flow (service, session and/or a
/// credential) or continue one with `flow_id` and the next credential.
#[derive(ToSchema, Deserialize, Default)]
pub struct AuthenticateRequest {
    flow_id: Option<String>,
    service: Option<String>,
    ticket_granting_ticket: Option<String>,
    credential: Option<CredentialRequest>,
    #[serde(default)]
    parameters: BTreeMap<String, String>,
}

#[derive(ToSchema, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialRequest {
    UsernamePassword {
        username: String,
        password: String,
        #[serde(default)]
        remember_me: bool,
    },
    OneTimePassword {
        id: String,
        token: String,
    },
}

impl From<CredentialRequest> for Credential {
    fn from(request: CredentialRequest) -> Self {
        match request {
            CredentialRequest::UsernamePassword {
                username,
                password,
                remember_me,
            } => {
                Credential::username_password(username, &password).with_remember_me(remember_me)
            }
            CredentialRequest::OneTimePassword { id, token } => {
                Credential::one_time_password(id, &token)
            }
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct FlowResponse {
    /// Transition the orchestrator takes next.
    event: String,
    provider: Option<String>,
    reason: Option<String>,
    /// Present when the flow waits for another factor.
    flow_id: Option<String>,
    ticket_granting_ticket: Option<String>,
    service_ticket: Option<String>,
    /// Owed to the services of a session this login replaced.
    #[serde(default)]
    logout_requests: Vec<LogoutNotice>,
}

impl FlowResponse {
    fn from_context(event: &Event, context: &RequestContext, flow_id: Option<String>) -> Self {
        Self {
            event: event.id().to_string(),
            provider: event.provider().map(str::to_string),
            reason: event.reason().map(str::to_string),
            flow_id,
            ticket_granting_ticket: context.ticket_granting_ticket_id().map(str::to_string),
            service_ticket: context.service_ticket_id().map(str::to_string),
            logout_requests: context.logout_requests().iter().map(LogoutNotice::from).collect(),
        }
    }
}

#[utoipa::path(
    post,
    path= "/v1/flow/authenticate",
    request_body = AuthenticateRequest,
    responses (
        (status = 200, description = "Resolved event", body = FlowResponse),
        (status = 400, description = "Unknown or expired flow", body = super::ErrorBody),
        (status = 401, description = "Authentication failed or access denied", body = FlowResponse)
    ),
    tag = "passage",
)]
#[instrument(skip_all)]
pub async fn authenticate(
    engine: Extension<Arc<Engine>>,
    Json(request): Json<AuthenticateRequest>,
) -> Result<(StatusCode, Json<FlowResponse>), ApiError> {
    let mut context = match request.flow_id.as_deref() {
        Some(flow_id) => engine
            .pending()
            .resume(flow_id)
            .map_err(|e| {
                error!("Failed to resume flow: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(super::ErrorBody::new("pending flows unavailable")),
                )
            })?
            .ok_or_else(|| bad_request("unknown or expired flow"))?,
        None => {
            let mut context = RequestContext::new();
            if let Some(service) = request.service {
                context = context.with_service(Service::new(service));
            }
            if let Some(tgt) = request.ticket_granting_ticket.as_deref() {
                context = context.with_ticket_granting_ticket_id(tgt);
            }
            context
        }
    };
    for (name, value) in &request.parameters {
        context = context.with_parameter(name, value);
    }
    context.put_credential(request.credential.map(Credential::from));

    let event = engine.flow().resolve(&mut context);
    debug!("flow resolved to {}", event);

    let flow_id = match &event {
        Event::Multifactor { .. } => Some(engine.pending().park(context.clone()).map_err(|e| {
            error!("Failed to park flow: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(super::ErrorBody::new("pending flows unavailable")),
            )
        })?),
        _ => None,
    };

    let status = context
        .response_status()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);

    Ok((status, Json(FlowResponse::from_context(&event, &context, flow_id))))
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ServiceTicketRequest {
    ticket_granting_ticket: String,
    service: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ServiceTicketResponse {
    service_ticket: String,
}

#[utoipa::path(
    post,
    path= "/v1/flow/service-ticket",
    request_body = ServiceTicketRequest,
    responses (
        (status = 200, description = "Service ticket granted", body = ServiceTicketResponse),
        (
            status = 401,
            description = "Session invalid or service not allowed",
            body = super::ErrorBody
        ),
        (status = 404, description = "Unknown session", body = super::ErrorBody)
    ),
    tag = "passage",
)]
#[instrument(skip_all, fields(service = %request.service))]
pub async fn service_ticket(
    engine: Extension<Arc<Engine>>,
    Json(request): Json<ServiceTicketRequest>,
) -> Result<Json<ServiceTicketResponse>, ApiError> {
    let service = Service::new(request.service);
    let ticket = engine
        .cas()
        .grant_service_ticket(&request.ticket_granting_ticket, &service, None)
        .map_err(|e| error_response(&e))?;

    Ok(Json(ServiceTicketResponse {
        service_ticket: ticket.id().to_string(),
    }))
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ValidateRequest {
    ticket: String,
    service: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ValidateResponse {
    #[schema(value_type = Object)]
    assertion: crate::cas::Assertion,
}

#[utoipa::path(
    post,
    path= "/v1/flow/validate",
    request_body = ValidateRequest,
    responses (
        (status = 200, description = "Ticket is valid for the service", body = ValidateResponse),
        (
            status = 401,
            description = "Ticket invalid, expired or issued for another service",
            body = super::ErrorBody
        ),
        (status = 404, description = "Unknown ticket", body = super::ErrorBody)
    ),
    tag = "passage",
)]
#[instrument(skip_all, fields(service = %request.service))]
pub async fn validate(
    engine: Extension<Arc<Engine>>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let service = Service::new(request.service);
    let assertion = engine
        .cas()
        .validate_service_ticket(&request.ticket, &service)
        .map_err(|e| error_response(&e))?;

    Ok(Json(ValidateResponse { assertion }))
}
