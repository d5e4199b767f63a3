//! Identity profiles exchanged through the presence protocol.
//!
//! An [`Identity`] is the public face of a session: the durable profile
//! fields plus the per-session public key and peer-link address. The
//! private half of the key pair stays inside [`crate::keyvault::KeyVault`]
//! and is never part of this struct.

use serde::{Deserialize, Serialize};

use crate::types::{IdentityId, PeerLinkId, PresenceStatus};

/// The durable registration record: what a user types at sign-up.
/// Survives restarts; keys and peer-links do not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub display_name: String,
    pub email: String,
    /// Opaque reference to an avatar image (URL or blob handle).
    pub avatar_ref: String,
}

/// A reachable identity as announced over the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// Stable key derived from the display name at registration.
    pub id: IdentityId,
    pub display_name: String,
    pub email: String,
    pub avatar_ref: String,
    pub status: PresenceStatus,
    /// Base64 SPKI export of this session's RSA public key.
    /// Empty until the key vault has been generated.
    pub public_key: String,
    /// Session-scoped transport address. Refreshed on every connect.
    pub peer_link_id: PeerLinkId,
}

impl Identity {
    /// Build the session identity from a registration profile and this
    /// session's exported public key. The peer-link address is assigned
    /// later, when the transport connects.
    pub fn register(profile: &UserProfile, public_key: String) -> Self {
        let id = derive_identity_id(&profile.display_name);
        Self {
            id,
            display_name: profile.display_name.clone(),
            email: profile.email.clone(),
            avatar_ref: profile.avatar_ref.clone(),
            status: PresenceStatus::Online,
            public_key,
            peer_link_id: PeerLinkId(String::new()),
        }
    }
}

/// Derive the stable identity key from a display name: trim, lowercase,
/// and replace every whitespace character with an underscore.
pub fn derive_identity_id(display_name: &str) -> IdentityId {
    let normalized: String = display_name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    IdentityId(normalized)
}
