use crate::{
    api::{self, Engine},
    authentication::{
        handler::AcceptUsersAuthenticationHandler, policy::AnyAuthenticationPolicy,
        AuthenticationSystemSupport, HandlerBinding, PolicyBasedAuthenticationManager,
    },
    cas::CentralAuthenticationService,
    cipher::{CipherExecutor, TicketCipherExecutor},
    cli::{actions::Action, globals::GlobalArgs},
    config::TicketConfig,
    logout::LogoutRequest,
    mfa::MultifactorProviderRegistry,
    services::{InMemoryServicesManager, RegisteredService},
    ticket::{
        registry::{
            DefaultTicketRegistry, InMemoryKeyValueStore, KeyValueTicketRegistry, RegistryCleaner,
            TicketCodec,
        },
        DefaultUniqueTicketIdGenerator, TicketRegistry,
    },
    webflow::{InitialAuthenticationAttemptResolver, LoginFlow},
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server {
            port,
            accept_users,
            service_patterns,
            cleaner_interval,
            mfa_principal_attributes,
            node_suffix,
        } => {
            let cipher = globals
                .ticket_encryption_key
                .as_ref()
                .map(TicketCipherExecutor::from_base64)
                .transpose()
                .context("Invalid ticket encryption key")?
                .map(|cipher| Arc::new(cipher) as Arc<dyn CipherExecutor>);

            let registry: Arc<dyn TicketRegistry> = if cipher.is_some() {
                Arc::new(KeyValueTicketRegistry::new(
                    InMemoryKeyValueStore::new().with_scan(true),
                    TicketCodec::new(cipher.clone()),
                ))
            } else {
                Arc::new(DefaultTicketRegistry::new())
            };
            info!("ticket registry: {}", registry.name());

            let config = TicketConfig::new()
                .with_cipher(cipher)
                .with_id_generator(Arc::new(
                    DefaultUniqueTicketIdGenerator::new().with_suffix(node_suffix),
                ))
                .with_cleaner_interval(cleaner_interval);

            let services = InMemoryServicesManager::new();
            for (index, pattern) in service_patterns.iter().enumerate() {
                let id = u64::try_from(index)? + 1;
                services.save(
                    RegisteredService::new(id, &format!("service-{id}"), pattern)
                        .with_context(|| format!("Invalid service pattern: {pattern}"))?
                        .with_evaluation_order(i32::try_from(index)?),
                );
            }

            let handler =
                AcceptUsersAuthenticationHandler::from_users("accept-users", &accept_users)
                    .context("Invalid accepted users")?;
            if handler.is_empty() {
                warn!("no accepted users configured, every login will fail");
            }
            let manager =
                PolicyBasedAuthenticationManager::new(Arc::new(AnyAuthenticationPolicy::default()))
                    .with_handler(HandlerBinding::new(Arc::new(handler)));

            let cas = Arc::new(CentralAuthenticationService::new(
                registry.clone(),
                Arc::new(services),
                config,
            ));
            let providers = MultifactorProviderRegistry::new();
            let initial = InitialAuthenticationAttemptResolver::new(
                Arc::new(AuthenticationSystemSupport::new(Arc::new(manager))),
                cas.clone(),
                providers.clone(),
            )
            .with_principal_attribute_names(mfa_principal_attributes);
            let flow = LoginFlow::with_initial(Arc::new(initial), cas.clone(), providers);

            let cleaner = cas.config().cleaner_interval().map(|interval| {
                let (tx, mut rx) = mpsc::unbounded_channel::<Vec<LogoutRequest>>();
                tokio::spawn(async move {
                    while let Some(requests) = rx.recv().await {
                        for request in &requests {
                            info!(
                                "logout owed to {} for ticket {}",
                                request.service().id(),
                                request.ticket_id()
                            );
                        }
                    }
                });
                RegistryCleaner::new(registry.clone(), cas.logout_manager().clone())
                    .with_logout_channel(tx)
                    .spawn(interval)
            });

            let engine = Arc::new(Engine::new(cas, flow));

            api::new(port, engine, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for shutdown signal: {}", e);
                }
            })
            .await?;

            if let Some(cleaner) = cleaner {
                cleaner.abort();
            }
        }
    }

    Ok(())
}
