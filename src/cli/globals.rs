use secrecy::SecretString;

#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Base64 key for ticket encryption at rest; `None` keeps tickets in clear.
    pub ticket_encryption_key: Option<SecretString>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ticket_encryption_key(&mut self, key: SecretString) {
        self.ticket_encryption_key = Some(key);
    }
}
