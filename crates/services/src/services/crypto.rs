//! AES-256-GCM encryption of inbox mail credentials at rest.
//!
//! Stored format: `base64(nonce (12 bytes) || ciphertext+tag)`.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use thiserror::Error;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key: expected {KEY_LEN} bytes of base64, got {0} bytes")]
    InvalidKeyLength(usize),
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(#[from] base64::DecodeError),
    #[error("ciphertext is malformed")]
    Malformed,
    #[error("decryption failed")]
    DecryptionFailed,
}

#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
        Ok(Self { cipher })
    }

    /// Builds a cipher from a base64 encoded 32-byte key.
    pub fn from_base64(key: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD.decode(key.trim())?;
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength(bytes.len()));
        }
        Self::new(&bytes)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| CryptoError::Malformed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let data = STANDARD.decode(encoded).map_err(|_| CryptoError::Malformed)?;
        if data.len() <= NONCE_LEN {
            return Err(CryptoError::Malformed);
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher(byte: u8) -> CredentialCipher {
        CredentialCipher::new(&[byte; KEY_LEN]).unwrap()
    }

    #[test]
    fn decrypts_what_it_encrypted() {
        let c = cipher(7);
        let sealed = c.encrypt("imap-password").unwrap();
        assert_ne!(sealed, "imap-password");
        assert_eq!(c.decrypt(&sealed).unwrap(), "imap-password");
    }

    #[test]
    fn nonces_differ_per_encryption() {
        let c = cipher(7);
        assert_ne!(c.encrypt("same").unwrap(), c.encrypt("same").unwrap());
    }

    #[test]
    fn wrong_key_or_tampering_fails() {
        let sealed = cipher(1).encrypt("secret").unwrap();
        assert!(matches!(
            cipher(2).decrypt(&sealed),
            Err(CryptoError::DecryptionFailed)
        ));

        let mut raw = STANDARD.decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        assert!(cipher(1).decrypt(&STANDARD.encode(raw)).is_err());
        assert!(matches!(cipher(1).decrypt("AAAA"), Err(CryptoError::Malformed)));
    }

    #[test]
    fn base64_keys_must_be_32_bytes() {
        assert!(CredentialCipher::from_base64(&STANDARD.encode([0u8; 32])).is_ok());
        assert!(matches!(
            CredentialCipher::from_base64(&STANDARD.encode([0u8; 16])),
            Err(CryptoError::InvalidKeyLength(16))
        ));
        assert!(CredentialCipher::from_base64("not base64!").is_err());
    }
}
