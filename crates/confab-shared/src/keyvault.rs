//! Per-session asymmetric identity keys.
//!
//! A [`KeyVault`] is generated fresh for every session; nothing here is
//! persisted, so trust is re-derived at each login. Key generation is
//! CPU-heavy (RSA-2048) and should run under `spawn_blocking` in async
//! contexts.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::constants::RSA_KEY_BITS;
use crate::error::CryptoError;

/// Holds the session key pair. The private key never leaves this struct
/// and is never serialized.
pub struct KeyVault {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl KeyVault {
    /// Generate a fresh RSA-2048 pair for this session.
    ///
    /// Fails with [`CryptoError::Unavailable`] when the platform cannot
    /// supply a key of the requested size; that failure is fatal to
    /// session start.
    pub fn generate() -> Result<Self, CryptoError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| CryptoError::Unavailable(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);
        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Serialize the public half to a transport-safe string
    /// (SPKI DER, base64). Deterministic for a given key.
    pub fn export_public(&self) -> Result<String, CryptoError> {
        let der = self
            .public_key
            .to_public_key_der()
            .map_err(|e| CryptoError::Unavailable(e.to_string()))?;
        Ok(BASE64.encode(der.as_bytes()))
    }

    /// Parse a peer's exported public key.
    ///
    /// Fails with [`CryptoError::MalformedKey`]; callers treat that as
    /// recoverable and fall back to an unencrypted send.
    pub fn import_public(exported: &str) -> Result<RsaPublicKey, CryptoError> {
        let der = BASE64
            .decode(exported)
            .map_err(|_| CryptoError::MalformedKey)?;
        RsaPublicKey::from_public_key_der(&der).map_err(|_| CryptoError::MalformedKey)
    }

    /// OAEP-SHA256 encrypt `text` for the holder of `public_key`.
    /// Returns base64 ciphertext.
    pub fn encrypt_with(public_key: &RsaPublicKey, text: &str) -> Result<String, CryptoError> {
        let ciphertext = public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), text.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;
        Ok(BASE64.encode(ciphertext))
    }

    /// Decrypt a base64 ciphertext sealed for this session's public key.
    ///
    /// Tampered, corrupt, or mismatched-key input all surface as
    /// [`CryptoError::DecryptionFailed`]; callers substitute a display
    /// marker rather than propagating.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let raw = BASE64
            .decode(ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        let plaintext = self
            .private_key
            .decrypt(Oaep::new::<Sha256>(), &raw)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let vault = KeyVault::generate().unwrap();
        let exported = vault.export_public().unwrap();
        let public = KeyVault::import_public(&exported).unwrap();

        let ciphertext = KeyVault::encrypt_with(&public, "meet me at noon").unwrap();
        assert_ne!(ciphertext, "meet me at noon");
        assert_eq!(vault.decrypt(&ciphertext).unwrap(), "meet me at noon");
    }

    #[test]
    fn test_export_deterministic() {
        let vault = KeyVault::generate().unwrap();
        assert_eq!(vault.export_public().unwrap(), vault.export_public().unwrap());
    }

    #[test]
    fn test_import_rejects_garbage() {
        assert!(matches!(
            KeyVault::import_public("not base64 at all!"),
            Err(CryptoError::MalformedKey)
        ));
        // Valid base64 but not an SPKI document.
        let bogus = BASE64.encode(b"hello world");
        assert!(matches!(
            KeyVault::import_public(&bogus),
            Err(CryptoError::MalformedKey)
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let alice = KeyVault::generate().unwrap();
        let bob = KeyVault::generate().unwrap();

        let for_alice = KeyVault::encrypt_with(
            &KeyVault::import_public(&alice.export_public().unwrap()).unwrap(),
            "secret",
        )
        .unwrap();
        assert!(matches!(
            bob.decrypt(&for_alice),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let vault = KeyVault::generate().unwrap();
        let public = KeyVault::import_public(&vault.export_public().unwrap()).unwrap();

        let ciphertext = KeyVault::encrypt_with(&public, "important").unwrap();
        let mut raw = BASE64.decode(&ciphertext).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let tampered = BASE64.encode(raw);

        assert!(matches!(
            vault.decrypt(&tampered),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_oaep_capacity_exceeded() {
        let vault = KeyVault::generate().unwrap();
        let public = KeyVault::import_public(&vault.export_public().unwrap()).unwrap();

        // RSA-2048 OAEP-SHA256 caps plaintext at 190 bytes.
        let long = "x".repeat(400);
        assert!(matches!(
            KeyVault::encrypt_with(&public, &long),
            Err(CryptoError::EncryptionFailed)
        ));
    }
}
