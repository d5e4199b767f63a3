//! # confab-shared
//!
//! Domain types shared by every Confab crate: identity profiles, the
//! session key vault, the relay wire protocol, and the error taxonomy.
//!
//! Nothing in this crate performs network or disk I/O. The key vault holds
//! the only copy of the session's private key; it is never serialized.

pub mod constants;
pub mod error;
pub mod identity;
pub mod keyvault;
pub mod models;
pub mod protocol;
pub mod types;

pub use error::CryptoError;
pub use identity::{derive_identity_id, Identity, UserProfile};
pub use keyvault::KeyVault;
pub use models::{Group, Message};
pub use protocol::{Frame, RelayEvent};
pub use types::{GroupId, IdentityId, MessageId, PeerLinkId, PresenceStatus};
