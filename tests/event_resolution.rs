use passage::{
    authentication::{
        handler::AcceptUsersAuthenticationHandler, policy::AnyAuthenticationPolicy, Attributes,
        AuthenticationSystemSupport, Credential, HandlerBinding, PolicyBasedAuthenticationManager,
    },
    cas::CentralAuthenticationService,
    config::TicketConfig,
    mfa::{ConfiguredMultifactorProvider, FailureMode, MultifactorProviderRegistry},
    services::{InMemoryServicesManager, MultifactorPolicy, RegisteredService, Service},
    ticket::{registry::DefaultTicketRegistry, TicketRegistry},
    webflow::{Event, LoginFlow, RequestContext},
};
use std::sync::Arc;

const APP: &str = "https://app.example.org/login";

struct Setup {
    flow: LoginFlow,
    registry: Arc<DefaultTicketRegistry>,
}

fn setup(provider_mode: FailureMode, service_mode: Option<FailureMode>, available: bool) -> Setup {
    let mut policy = MultifactorPolicy::new().with_provider("mfa-duo");
    if let Some(mode) = service_mode {
        policy = policy.with_failure_mode(mode);
    }
    let services = InMemoryServicesManager::new();
    services.save(
        RegisteredService::new(1, "app", r"^https://app\.example\.org/.*")
            .expect("pattern")
            .with_multifactor_policy(policy),
    );

    let mut providers = MultifactorProviderRegistry::new();
    providers
        .register(Arc::new(
            ConfiguredMultifactorProvider::new("mfa-duo")
                .with_failure_mode(provider_mode)
                .with_available(available),
        ))
        .expect("registered");

    let policy = Arc::new(AnyAuthenticationPolicy::default());
    let manager = PolicyBasedAuthenticationManager::new(policy)
        .with_handler(HandlerBinding::new(Arc::new(
            AcceptUsersAuthenticationHandler::new("accept")
                .with_user("casuser", "Mellon", Attributes::new()),
        )));

    let registry = Arc::new(DefaultTicketRegistry::new());
    let cas = Arc::new(CentralAuthenticationService::new(
        registry.clone(),
        Arc::new(services),
        TicketConfig::new(),
    ));
    let flow = LoginFlow::new(
        Arc::new(AuthenticationSystemSupport::new(Arc::new(manager))),
        cas,
        providers,
    );
    Setup { flow, registry }
}

fn login(setup: &Setup) -> (Event, RequestContext) {
    let mut context = RequestContext::new()
        .with_service(Service::new(APP))
        .with_credential(Credential::username_password("casuser", "Mellon"));
    let event = setup.flow.resolve(&mut context);
    (event, context)
}

#[test]
fn available_provider_is_required() {
    let setup = setup(FailureMode::Closed, None, true);
    let (event, context) = login(&setup);
    assert_eq!(
        event,
        Event::Multifactor {
            provider: "mfa-duo".to_string()
        }
    );
    assert!(context.ticket_granting_ticket_id().is_none());
    assert_eq!(setup.registry.session_count().expect("count"), 0);
}

#[test]
fn closed_unavailable_provider_never_falls_through() {
    let setup = setup(FailureMode::Closed, None, false);
    let (event, context) = login(&setup);
    assert!(event.is_denial());
    assert!(context.service_ticket_id().is_none());
    assert_eq!(setup.registry.session_count().expect("count"), 0);
}

#[test]
fn open_unavailable_provider_falls_through() {
    let setup = setup(FailureMode::Open, None, false);
    let (event, context) = login(&setup);
    assert_eq!(event, Event::GenerateServiceTicket);
    assert!(context.service_ticket_id().is_some());
    assert_eq!(setup.registry.session_count().expect("count"), 1);
}

#[test]
fn service_failure_mode_overrides_the_provider() {
    let closed = setup(FailureMode::Open, Some(FailureMode::Closed), false);
    let (event, _) = login(&closed);
    assert!(event.is_denial());

    let phantom = setup(FailureMode::Closed, Some(FailureMode::Phantom), false);
    let (event, context) = login(&phantom);
    assert_eq!(event, Event::GenerateServiceTicket);
    let authentication = context.authentication().expect("authenticated");
    assert!(authentication
        .attribute("authenticationContext")
        .is_some_and(|values| values.iter().any(|v| v == "mfa-duo")));
}
