use passage::{
    authentication::{
        handler::AcceptUsersAuthenticationHandler, policy::AnyAuthenticationPolicy, Attributes,
        AuthenticationSystemSupport, Credential, HandlerBinding, PolicyBasedAuthenticationManager,
    },
    cas::CentralAuthenticationService,
    config::TicketConfig,
    services::{InMemoryServicesManager, RegisteredService, Service},
    ticket::{
        registry::{
            DefaultTicketRegistry, InMemoryKeyValueStore, KeyValueTicketRegistry, TicketCodec,
        },
        TicketKind, TicketRegistry,
    },
};
use std::{collections::HashSet, sync::Arc, thread};

const GRANTS: usize = 32;

fn grant_concurrently(registry: Arc<dyn TicketRegistry>) {
    let services = InMemoryServicesManager::new();
    services.save(RegisteredService::new(1, "all", "^https://.*").expect("pattern"));
    let cas = Arc::new(CentralAuthenticationService::new(
        registry.clone(),
        Arc::new(services),
        TicketConfig::new().with_only_track_most_recent_session(false),
    ));

    let policy = Arc::new(AnyAuthenticationPolicy::default());
    let manager = PolicyBasedAuthenticationManager::new(policy)
        .with_handler(HandlerBinding::new(Arc::new(
            AcceptUsersAuthenticationHandler::new("accept")
                .with_user("casuser", "Mellon", Attributes::new()),
        )));
    let result = AuthenticationSystemSupport::new(Arc::new(manager))
        .handle_and_finalize_single_authentication_transaction(
            None,
            vec![Credential::username_password("casuser", "Mellon")],
        )
        .expect("login");
    let tgt = cas.create_ticket_granting_ticket(&result).expect("tgt");

    let handles: Vec<_> = (0..GRANTS)
        .map(|n| {
            let cas = cas.clone();
            let tgt_id = tgt.id().to_string();
            thread::spawn(move || {
                let service = Service::new(format!("https://app{n}.example.org/"));
                cas.grant_service_ticket(&tgt_id, &service, None)
                    .expect("grant")
                    .id()
                    .to_string()
            })
        })
        .collect();

    let ids: HashSet<String> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .collect();
    assert_eq!(ids.len(), GRANTS);

    let session = cas
        .get_ticket(tgt.id(), TicketKind::TicketGranting)
        .expect("session is alive");
    let granting = session.as_ticket_granting().expect("granting ticket");
    assert_eq!(granting.count_of_uses() as usize, GRANTS);
    assert_eq!(granting.services().len(), GRANTS);
    assert_eq!(registry.service_ticket_count().expect("count"), GRANTS);
}

#[test]
fn no_lost_updates_in_memory() {
    grant_concurrently(Arc::new(DefaultTicketRegistry::new()));
}

#[test]
fn no_lost_updates_in_key_value_store() {
    grant_concurrently(Arc::new(KeyValueTicketRegistry::new(
        InMemoryKeyValueStore::new().with_scan(true),
        TicketCodec::new(None),
    )
    // each conflict means another grant went through
    .with_max_update_attempts(GRANTS + 1)));
}
