//! Encryption of ticket payloads at rest.

use crate::error::{Error, Result};
use base64ct::{Base64, Encoding};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretBox, SecretString};
use std::fmt::Debug;

const NONCE_LENGTH: usize = 12;
const KEY_LENGTH: usize = 32;
const TICKET_AAD: &[u8] = b"passage-ticket:v1";

pub trait CipherExecutor: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// # Errors
    /// Returns [`Error::Cipher`] if encryption fails.
    fn encode(&self, value: &[u8]) -> Result<Vec<u8>>;

    /// # Errors
    /// Returns [`Error::Cipher`] if the value was not produced by `encode`
    /// with the same key.
    fn decode(&self, value: &[u8]) -> Result<Vec<u8>>;

    /// A disabled cipher passes payloads through and ids are stored as is.
    fn is_enabled(&self) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpCipherExecutor;

impl CipherExecutor for NoOpCipherExecutor {
    fn name(&self) -> &str {
        "noop"
    }

    fn encode(&self, value: &[u8]) -> Result<Vec<u8>> {
        Ok(value.to_vec())
    }

    fn decode(&self, value: &[u8]) -> Result<Vec<u8>> {
        Ok(value.to_vec())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// ChaCha20-Poly1305 with a random nonce per payload.
/// Output is `nonce (12 bytes) || ciphertext`.
#[derive(Debug)]
pub struct TicketCipherExecutor {
    key: SecretBox<[u8; KEY_LENGTH]>,
}

impl TicketCipherExecutor {
    #[must_use]
    pub fn new(key: [u8; KEY_LENGTH]) -> Self {
        Self {
            key: SecretBox::new(Box::new(key)),
        }
    }

    /// # Errors
    /// Returns an error if the key is not base64 or not 32 bytes long.
    pub fn from_base64(encoded: &SecretString) -> Result<Self> {
        let decoded = Base64::decode_vec(encoded.expose_secret().trim())
            .map_err(|_| Error::Configuration("ticket encryption key is not valid base64".into()))?;
        let key: [u8; KEY_LENGTH] = decoded.as_slice().try_into().map_err(|_| {
            Error::Configuration(format!(
                "ticket encryption key must be {KEY_LENGTH} bytes, got {}",
                decoded.len()
            ))
        })?;
        Ok(Self::new(key))
    }

    /// A fresh random key, encoded the way `from_base64` expects.
    #[must_use]
    pub fn generate_key() -> SecretString {
        let mut key = [0u8; KEY_LENGTH];
        OsRng.fill_bytes(&mut key);
        SecretString::from(Base64::encode_string(&key))
    }

    #[allow(deprecated)]
    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(self.key.expose_secret()))
    }
}

impl CipherExecutor for TicketCipherExecutor {
    fn name(&self) -> &str {
        "chacha20poly1305"
    }

    #[allow(deprecated)]
    fn encode(&self, value: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(
                nonce,
                Payload {
                    msg: value,
                    aad: TICKET_AAD,
                },
            )
            .map_err(|e| Error::Cipher(format!("encryption failure: {e}")))?;

        let mut result = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    #[allow(deprecated)]
    fn decode(&self, value: &[u8]) -> Result<Vec<u8>> {
        if value.len() < NONCE_LENGTH {
            return Err(Error::Cipher("invalid ciphertext length".into()));
        }
        let (nonce_bytes, ciphertext) = value.split_at(NONCE_LENGTH);

        self.cipher()
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: TICKET_AAD,
                },
            )
            .map_err(|e| Error::Cipher(format!("decryption failure: {e}")))
    }
}
