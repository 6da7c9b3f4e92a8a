use crate::{cipher::CipherExecutor, error::Result, ticket::Ticket};
use base64ct::{Base64UrlUnpadded, Encoding};
use sha2::{Digest, Sha512};
use std::sync::Arc;

/// Serializes tickets for byte-oriented backends, encrypting payloads and
/// hashing ids when an enabled cipher is configured.
#[derive(Debug, Clone, Default)]
pub struct TicketCodec {
    cipher: Option<Arc<dyn CipherExecutor>>,
}

impl TicketCodec {
    #[must_use]
    pub fn new(cipher: Option<Arc<dyn CipherExecutor>>) -> Self {
        Self { cipher }
    }

    fn active_cipher(&self) -> Option<&dyn CipherExecutor> {
        self.cipher.as_deref().filter(|cipher| cipher.is_enabled())
    }

    #[must_use]
    pub fn is_encrypting(&self) -> bool {
        self.active_cipher().is_some()
    }

    /// Storage key for a ticket id: a SHA-512 digest when encrypting, so
    /// stored keys do not reveal usable ids.
    #[must_use]
    pub fn encode_ticket_id(&self, id: &str) -> String {
        if self.is_encrypting() {
            Base64UrlUnpadded::encode_string(&Sha512::digest(id.as_bytes()))
        } else {
            id.to_string()
        }
    }

    /// # Errors
    /// Returns an error if serialization or encryption fails.
    pub fn encode(&self, ticket: &Ticket) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(ticket)?;
        match self.active_cipher() {
            Some(cipher) => cipher.encode(&json),
            None => Ok(json),
        }
    }

    /// # Errors
    /// Returns an error if decryption or deserialization fails.
    pub fn decode(&self, bytes: &[u8]) -> Result<Ticket> {
        let ticket = match self.active_cipher() {
            Some(cipher) => serde_json::from_slice(&cipher.decode(bytes)?)?,
            None => serde_json::from_slice(bytes)?,
        };
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        authentication::{AuthenticationBuilder, Credential, HandlerResult, Principal},
        cipher::{NoOpCipherExecutor, TicketCipherExecutor},
        services::Service,
        ticket::{ExpirationPolicy, TicketGrantingTicket},
    };

    fn ticket() -> Ticket {
        let credential = Credential::username_password("casuser", "Mellon");
        let mut builder = AuthenticationBuilder::new();
        builder
            .set_principal(Principal::new("casuser"))
            .add_credential(credential.metadata())
            .add_success("accept", HandlerResult::new("accept", credential.metadata(), None));
        let mut tgt = TicketGrantingTicket::new(
            "TGT-1".to_string(),
            builder.build(),
            ExpirationPolicy::remember_me_delegating(
                ExpirationPolicy::ticket_granting_ticket(28_800, 7_200),
                ExpirationPolicy::timeout(3600),
            ),
        );
        tgt.grant_service_ticket(
            "ST-1".to_string(),
            Service::new("https://app.example.org"),
            ExpirationPolicy::multi_time_use_or_timeout(1, 10_000),
            true,
            true,
        );
        tgt.into()
    }

    #[test]
    fn encrypted_round_trip() {
        let codec = TicketCodec::new(Some(Arc::new(TicketCipherExecutor::new([7u8; 32]))));
        let original = ticket();

        let bytes = codec.encode(&original).expect("encode");
        assert!(serde_json::from_slice::<serde_json::Value>(&bytes).is_err());
        assert_eq!(codec.decode(&bytes).expect("decode"), original);
    }

    #[test]
    fn ids_are_digested_only_when_encrypting() {
        let plain = TicketCodec::default();
        assert_eq!(plain.encode_ticket_id("TGT-1"), "TGT-1");

        let disabled = TicketCodec::new(Some(Arc::new(NoOpCipherExecutor)));
        assert!(!disabled.is_encrypting());
        assert_eq!(disabled.encode_ticket_id("TGT-1"), "TGT-1");

        let encrypting = TicketCodec::new(Some(Arc::new(TicketCipherExecutor::new([7u8; 32]))));
        let key = encrypting.encode_ticket_id("TGT-1");
        assert_ne!(key, "TGT-1");
        assert_eq!(key, encrypting.encode_ticket_id("TGT-1"));
        assert_eq!(key.len(), 86);
    }

    #[test]
    fn plain_payload_is_json() {
        let bytes = TicketCodec::default().encode(&ticket()).expect("encode");
        let value: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(value["type"], "granting");
    }
}
