use thiserror::Error;

use confab_net::TransportError;
use confab_shared::CryptoError;
use confab_store::StoreError;

/// Failures that can abort session start.
///
/// Once a session is running, the message pipeline absorbs its own
/// failures (plaintext fallback, decryption markers, local-only
/// persistence); nothing in steady state raises one of these.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
