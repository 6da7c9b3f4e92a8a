#![allow(clippy::needless_for_each)]

#[allow(unused_imports)]
use crate::api::handlers::{
    flow::{self, __path_authenticate, __path_service_ticket, __path_validate},
    health::{self, __path_health},
    sessions::{self, __path_destroy_session, __path_sessions},
    statistics::{self, __path_statistics},
};
use utoipa::{
    openapi::{Contact, License},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(health, authenticate, service_ticket, validate, sessions, destroy_session, statistics),
    components(
        schemas(
            health::Health,
            flow::AuthenticateRequest,
            flow::CredentialRequest,
            flow::FlowResponse,
            flow::ServiceTicketRequest,
            flow::ServiceTicketResponse,
            flow::ValidateRequest,
            flow::ValidateResponse,
            sessions::Session,
            sessions::LogoutNotice,
            statistics::Statistics,
            crate::api::handlers::ErrorBody,
        )
    ),
    tags(
        (name = "passage", description = "Authentication engine bridge"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
    doc.info.contact = cargo_contact();
    doc.info.license = cargo_license();
    doc
}

fn cargo_contact() -> Option<Contact> {
    // Cargo joins authors with `:`; each may be "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(':').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    Some(value.trim()).filter(|v| !v.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => {
            let name = name.trim();
            let email = email.trim_end_matches('>').trim();
            (
                Some(name).filter(|n| !n.is_empty()),
                Some(email).filter(|e| !e.is_empty()),
            )
        }
        None => (Some(author.trim()).filter(|n| !n.is_empty()), None),
    }
}
