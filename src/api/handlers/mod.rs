pub mod flow;
pub use self::flow::{authenticate, service_ticket, validate};

pub mod health;
pub use self::health::health;

pub mod sessions;
pub use self::sessions::{destroy_session, sessions};

pub mod statistics;
pub use self::statistics::statistics;

// common functions for the handlers
use crate::error::{Error, InvalidTicketReason};
use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    #[must_use]
    pub fn error(&self) -> &str {
        &self.error
    }
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

/// Map an engine error to the status the orchestrator acts on.
pub(crate) fn error_response(error: &Error) -> ApiError {
    let status = match error {
        Error::InvalidTicket {
            reason: InvalidTicketReason::NotFound,
            ..
        } => StatusCode::NOT_FOUND,
        Error::Unsupported { .. } => StatusCode::NOT_IMPLEMENTED,
        e if e.is_authentication_failure() || e.is_access_denied() => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("engine error: {}", error);
    } else {
        warn!("request refused: {}", error);
    }

    (status, Json(ErrorBody::new(error.to_string())))
}

pub(crate) fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorBody::new(message)))
}
