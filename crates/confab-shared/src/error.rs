use thiserror::Error;

/// Errors raised by the key vault.
///
/// Only [`CryptoError::Unavailable`] is fatal (it aborts session start).
/// The rest are recoverable by policy: a malformed key degrades a send to
/// plaintext, a failed decryption is replaced with a display marker.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The platform could not supply a secure key generator.
    #[error("Cryptographic key generation unavailable: {0}")]
    Unavailable(String),

    /// A peer's exported public key could not be decoded or parsed.
    #[error("Malformed public key")]
    MalformedKey,

    /// Encryption failed (e.g. plaintext exceeds the OAEP capacity).
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Ciphertext was tampered with, corrupt, or sealed for another key.
    #[error("Decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,
}
