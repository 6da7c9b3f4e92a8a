use super::Event;
use crate::{
    authentication::{
        Authentication, AuthenticationResult, AuthenticationResultBuilder, Credential,
    },
    logout::LogoutRequest,
    services::{RegisteredService, Service},
};
use std::{collections::BTreeMap, sync::Arc};

pub const RENEW_PARAMETER: &str = "renew";

/// State of one login request, handed from resolver to resolver.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    service: Option<Service>,
    credential: Option<Credential>,
    parameters: BTreeMap<String, String>,
    ticket_granting_ticket_id: Option<String>,
    service_ticket_id: Option<String>,
    registered_service: Option<Arc<RegisteredService>>,
    result_builder: Option<AuthenticationResultBuilder>,
    authentication: Option<Authentication>,
    result: Option<AuthenticationResult>,
    resolved_events: Vec<Event>,
    response_status: Option<u16>,
    error: Option<String>,
    logout_requests: Vec<LogoutRequest>,
}

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_service(mut self, service: Service) -> Self {
        self.service = Some(service);
        self
    }

    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters.insert(name.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_ticket_granting_ticket_id(mut self, id: &str) -> Self {
        self.ticket_granting_ticket_id = Some(id.to_string());
        self
    }

    #[must_use]
    pub fn service(&self) -> Option<&Service> {
        self.service.as_ref()
    }

    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Replace the credential, e.g. with the next factor of a multi-step
    /// login.
    pub fn put_credential(&mut self, credential: Option<Credential>) {
        self.credential = credential;
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn is_renew_requested(&self) -> bool {
        self.parameter(RENEW_PARAMETER)
            .is_some_and(|v| v.is_empty() || v.eq_ignore_ascii_case("true"))
    }

    #[must_use]
    pub fn ticket_granting_ticket_id(&self) -> Option<&str> {
        self.ticket_granting_ticket_id.as_deref()
    }

    pub fn put_ticket_granting_ticket_id(&mut self, id: Option<String>) {
        self.ticket_granting_ticket_id = id;
    }

    #[must_use]
    pub fn service_ticket_id(&self) -> Option<&str> {
        self.service_ticket_id.as_deref()
    }

    pub fn put_service_ticket_id(&mut self, id: &str) {
        self.service_ticket_id = Some(id.to_string());
    }

    #[must_use]
    pub fn registered_service(&self) -> Option<&RegisteredService> {
        self.registered_service.as_deref()
    }

    pub fn put_registered_service(&mut self, registered: Option<Arc<RegisteredService>>) {
        self.registered_service = registered;
    }

    #[must_use]
    pub fn authentication_result_builder(&self) -> Option<&AuthenticationResultBuilder> {
        self.result_builder.as_ref()
    }

    pub fn authentication_result_builder_mut(
        &mut self,
    ) -> Option<&mut AuthenticationResultBuilder> {
        self.result_builder.as_mut()
    }

    pub fn put_authentication_result_builder(&mut self, builder: AuthenticationResultBuilder) {
        self.result_builder = Some(builder);
    }

    pub fn take_authentication_result_builder(&mut self) -> Option<AuthenticationResultBuilder> {
        self.result_builder.take()
    }

    /// The authentication established so far in this request.
    #[must_use]
    pub fn authentication(&self) -> Option<&Authentication> {
        self.authentication.as_ref()
    }

    pub fn put_authentication(&mut self, authentication: Authentication) {
        self.authentication = Some(authentication);
    }

    #[must_use]
    pub fn authentication_result(&self) -> Option<&AuthenticationResult> {
        self.result.as_ref()
    }

    pub fn put_authentication_result(&mut self, result: AuthenticationResult) {
        self.result = Some(result);
    }

    /// Candidate events proposed before the final choice.
    #[must_use]
    pub fn resolved_events(&self) -> &[Event] {
        &self.resolved_events
    }

    pub fn put_resolved_events(&mut self, events: Vec<Event>) {
        self.resolved_events = events;
    }

    #[must_use]
    pub fn response_status(&self) -> Option<u16> {
        self.response_status
    }

    pub fn set_response_status(&mut self, status: u16) {
        self.response_status = Some(status);
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn put_error(&mut self, error: String) {
        self.error = Some(error);
    }

    /// Owed to the services of a session this request replaced.
    #[must_use]
    pub fn logout_requests(&self) -> &[LogoutRequest] {
        &self.logout_requests
    }

    pub fn put_logout_requests(&mut self, requests: Vec<LogoutRequest>) {
        self.logout_requests.extend(requests);
    }
}
