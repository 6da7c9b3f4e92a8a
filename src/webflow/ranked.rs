use super::{CasWebflowEventResolver, Event, InitialAuthenticationAttemptResolver, RequestContext};
use crate::{
    authentication::AuthenticationResultBuilder,
    cas::CentralAuthenticationService,
    mfa::{AuthenticationContextValidator, ContextValidation},
};
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, instrument, warn};

/// Re-evaluates a request that arrives with a single sign-on session:
/// multifactor is only demanded when the session has not already satisfied
/// it.
pub struct RankedAuthenticationProviderResolver {
    initial: Arc<InitialAuthenticationAttemptResolver>,
    cas: Arc<CentralAuthenticationService>,
    validator: AuthenticationContextValidator,
}

impl RankedAuthenticationProviderResolver {
    pub fn new(
        initial: Arc<InitialAuthenticationAttemptResolver>,
        cas: Arc<CentralAuthenticationService>,
        validator: AuthenticationContextValidator,
    ) -> Self {
        Self {
            initial,
            cas,
            validator,
        }
    }
}

impl CasWebflowEventResolver for RankedAuthenticationProviderResolver {
    fn name(&self) -> &str {
        "ranked-authentication-provider"
    }

    #[instrument(skip_all, fields(ticket = context.ticket_granting_ticket_id()))]
    fn resolve(&self, context: &mut RequestContext) -> HashSet<Event> {
        let Some(ticket_granting_ticket_id) =
            context.ticket_granting_ticket_id().map(str::to_string)
        else {
            return self.initial.resolve(context);
        };

        let authentication = match self.cas.get_authentication(&ticket_granting_ticket_id) {
            Ok(authentication) => authentication,
            Err(error) => {
                debug!(%error, "session is no longer usable, starting over");
                context.put_ticket_granting_ticket_id(None);
                return self.initial.resolve(context);
            }
        };

        let mut builder = AuthenticationResultBuilder::new();
        builder.collect(authentication.clone());
        context.put_authentication_result_builder(builder);

        let Some(event) = self.initial.resolve_single(context) else {
            return HashSet::from([Event::Success]);
        };

        let event = match event {
            Event::Multifactor { provider } => {
                match self.validator.validate(&authentication, &provider) {
                    ContextValidation::Satisfied => {
                        debug!(provider = %provider, "session already satisfies provider");
                        let result = context
                            .authentication_result_builder()
                            .and_then(|builder| builder.build(context.service().cloned()).ok());
                        if let Some(result) = result {
                            context.put_authentication_result(result);
                        }
                        Event::Success
                    }
                    ContextValidation::Unsatisfied => Event::Multifactor { provider },
                    ContextValidation::Unrecognized => {
                        warn!(provider = %provider, "requested provider is not registered");
                        Event::Error {
                            reason: format!("unknown multifactor provider {provider}"),
                        }
                    }
                }
            }
            other => other,
        };
        HashSet::from([event])
    }
}
