use crate::{
    authentication::{AuthenticationError, CredentialFailure},
    ticket::TicketKind,
};
use std::fmt;
use thiserror::Error;

/// Why a ticket could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTicketReason {
    NotFound,
    UnexpectedKind {
        expected: TicketKind,
        actual: TicketKind,
    },
    Expired,
    ProxyGrantingTicketAlreadyGranted,
    ServiceMismatch,
}

impl fmt::Display for InvalidTicketReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::UnexpectedKind { expected, actual } => {
                write!(f, "expected a {expected} but found a {actual}")
            }
            Self::Expired => write!(f, "expired"),
            Self::ProxyGrantingTicketAlreadyGranted => {
                write!(f, "a proxy-granting ticket was already granted")
            }
            Self::ServiceMismatch => write!(f, "issued for a different service"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Credential(#[from] CredentialFailure),
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),
    #[error("invalid ticket {id}: {reason}")]
    InvalidTicket {
        id: String,
        reason: InvalidTicketReason,
    },
    #[error("service {service} is not authorized to use this server")]
    UnauthorizedService { service: String },
    #[error("service {service} is not allowed to participate in single sign-on")]
    UnauthorizedSsoService { service: String },
    #[error("service {service} is not allowed to proxy")]
    UnauthorizedProxying { service: String },
    #[error("principal {principal} is not authorized to access service {service}")]
    UnauthorizedPrincipal { principal: String, service: String },
    #[error("principal {actual} does not match the session principal {expected}")]
    MixedPrincipals { expected: String, actual: String },
    #[error("{operation} is not supported by the {backend} ticket registry")]
    Unsupported {
        operation: &'static str,
        backend: &'static str,
    },
    #[error("ticket {0} already exists")]
    DuplicateTicket(String),
    #[error("cipher failure: {0}")]
    Cipher(String),
    #[error("invalid ticket payload")]
    Serialization(#[from] serde_json::Error),
    #[error("ticket storage failure: {0}")]
    Storage(String),
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl Error {
    pub(crate) fn invalid_ticket(id: &str, reason: InvalidTicketReason) -> Self {
        Self::InvalidTicket {
            id: id.to_string(),
            reason,
        }
    }

    /// Failures a caller must answer with "authenticate again".
    #[must_use]
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::Credential(_)
                | Self::Authentication(_)
                | Self::InvalidTicket { .. }
                | Self::MixedPrincipals { .. }
        )
    }

    /// Failures raised by a service's access strategy.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            Self::UnauthorizedService { .. }
                | Self::UnauthorizedSsoService { .. }
                | Self::UnauthorizedProxying { .. }
                | Self::UnauthorizedPrincipal { .. }
        )
    }

    #[must_use]
    pub fn invalid_ticket_reason(&self) -> Option<InvalidTicketReason> {
        match self {
            Self::InvalidTicket { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
