use super::{
    builder::AuthenticationBuilder, credential::Credential, AUTHENTICATION_CONTEXT_ATTRIBUTE,
    REMEMBER_ME_ATTRIBUTE, SUCCESSFUL_HANDLERS_ATTRIBUTE,
};

/// Adds attributes to an authentication once its handlers have run.
pub trait AuthenticationMetaDataPopulator: Send + Sync {
    fn supports(&self, credential: &Credential) -> bool;

    fn populate(&self, builder: &mut AuthenticationBuilder, credential: &Credential);
}

/// Records the remember-me choice so expiration can honor it.
#[derive(Debug, Default, Clone, Copy)]
pub struct RememberMeAuthenticationMetaDataPopulator;

impl AuthenticationMetaDataPopulator for RememberMeAuthenticationMetaDataPopulator {
    fn supports(&self, credential: &Credential) -> bool {
        credential.is_remember_me()
    }

    fn populate(&self, builder: &mut AuthenticationBuilder, _credential: &Credential) {
        builder.add_attribute(REMEMBER_ME_ATTRIBUTE, vec!["true".to_string()]);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SuccessfulHandlerMetaDataPopulator;

impl AuthenticationMetaDataPopulator for SuccessfulHandlerMetaDataPopulator {
    fn supports(&self, _credential: &Credential) -> bool {
        true
    }

    fn populate(&self, builder: &mut AuthenticationBuilder, _credential: &Credential) {
        let names: Vec<String> = builder.successes().keys().cloned().collect();
        builder.add_attribute(SUCCESSFUL_HANDLERS_ATTRIBUTE, names);
    }
}

/// Marks an authentication as satisfying a multifactor provider when the
/// provider's handler succeeded.
#[derive(Debug, Clone)]
pub struct AuthenticationContextAttributeMetaDataPopulator {
    handler_name: String,
    provider_id: String,
}

impl AuthenticationContextAttributeMetaDataPopulator {
    pub fn new(handler_name: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            handler_name: handler_name.into(),
            provider_id: provider_id.into(),
        }
    }
}

impl AuthenticationMetaDataPopulator for AuthenticationContextAttributeMetaDataPopulator {
    fn supports(&self, _credential: &Credential) -> bool {
        true
    }

    fn populate(&self, builder: &mut AuthenticationBuilder, _credential: &Credential) {
        if builder.successes().contains_key(&self.handler_name) {
            builder.merge_attribute(AUTHENTICATION_CONTEXT_ATTRIBUTE, &self.provider_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::HandlerResult;

    #[test]
    fn successful_handlers_are_listed() {
        let credential = Credential::username_password("casuser", "Mellon");
        let mut builder = AuthenticationBuilder::new();
        builder.add_success("accept", HandlerResult::new("accept", credential.metadata(), None));

        SuccessfulHandlerMetaDataPopulator.populate(&mut builder, &credential);
        assert_eq!(
            builder.build().attribute(SUCCESSFUL_HANDLERS_ATTRIBUTE),
            Some(&["accept".to_string()][..])
        );
    }

    #[test]
    fn context_attribute_requires_the_provider_handler() {
        let credential = Credential::one_time_password("casuser", "123456");
        let populator = AuthenticationContextAttributeMetaDataPopulator::new("otp", "mfa-otp");

        let mut builder = AuthenticationBuilder::new();
        populator.populate(&mut builder, &credential);
        assert!(!builder.has_attribute(AUTHENTICATION_CONTEXT_ATTRIBUTE));

        builder.add_success("otp", HandlerResult::new("otp", credential.metadata(), None));
        populator.populate(&mut builder, &credential);
        assert_eq!(
            builder.build().attribute(AUTHENTICATION_CONTEXT_ATTRIBUTE),
            Some(&["mfa-otp".to_string()][..])
        );
    }
}
