use super::{
    credential::Credential,
    principal::{merge_attributes, Attributes, Principal},
};
use std::collections::HashMap;

/// Turns an authenticated credential into the principal recorded on the
/// authentication.
pub trait PrincipalResolver: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, _credential: &Credential) -> bool {
        true
    }

    /// `principal` is what the handler produced, if anything.
    fn resolve(&self, credential: &Credential, principal: Option<&Principal>) -> Option<Principal>;
}

/// Returns the handler principal, or one named after the credential id.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoingPrincipalResolver;

impl PrincipalResolver for EchoingPrincipalResolver {
    fn name(&self) -> &str {
        "echoing"
    }

    fn resolve(&self, credential: &Credential, principal: Option<&Principal>) -> Option<Principal> {
        Some(
            principal
                .cloned()
                .unwrap_or_else(|| Principal::new(credential.id())),
        )
    }
}

/// Looks attributes up in an attribute repository and merges them with
/// whatever the handler produced.
#[derive(Debug, Default, Clone)]
pub struct PersonDirectoryPrincipalResolver {
    repository: HashMap<String, Attributes>,
    use_existing_principal_id: bool,
    return_null_if_no_attributes: bool,
}

impl PersonDirectoryPrincipalResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_person(mut self, id: &str, attributes: Attributes) -> Self {
        self.repository.insert(id.to_string(), attributes);
        self
    }

    #[must_use]
    pub fn with_use_existing_principal_id(mut self, enabled: bool) -> Self {
        self.use_existing_principal_id = enabled;
        self
    }

    #[must_use]
    pub fn with_return_null_if_no_attributes(mut self, enabled: bool) -> Self {
        self.return_null_if_no_attributes = enabled;
        self
    }
}

impl PrincipalResolver for PersonDirectoryPrincipalResolver {
    fn name(&self) -> &str {
        "person-directory"
    }

    fn resolve(&self, credential: &Credential, principal: Option<&Principal>) -> Option<Principal> {
        let id = match principal {
            Some(existing) if self.use_existing_principal_id => existing.id(),
            _ => credential.id(),
        };

        let mut attributes = principal
            .map(|p| p.attributes().clone())
            .unwrap_or_default();
        if let Some(found) = self.repository.get(id) {
            merge_attributes(&mut attributes, found);
        }

        if attributes.is_empty() && self.return_null_if_no_attributes {
            return None;
        }
        Some(Principal::with_attributes(id, attributes))
    }
}
