//! Peer directory built by the presence protocol.
//!
//! Keyed by identity id, not peer-link id: peer-links are session-scoped
//! and may legitimately repeat across reconnects. A duplicate
//! announcement for a known identity is a strict no-op, so a stale
//! peer-link left by a peer's previous session is *not* refreshed until
//! the entry is evicted or the process restarts.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use confab_shared::{Identity, IdentityId};

/// How far the presence handshake has progressed with a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    /// We learned of the peer from its announcement.
    Announced,
    /// Both sides have seen each other (announcement answered).
    Mutual,
}

/// A known remote identity plus the session-scoped address used to
/// target transport sends.
#[derive(Debug, Clone)]
pub struct PeerEntry {
    pub identity: Identity,
    pub presence: PresenceState,
    seen_at: Instant,
}

/// When directory entries are allowed to disappear.
///
/// Nothing in the core sweeps on a timer; eviction only happens when a
/// caller explicitly invokes [`PeerDirectory::sweep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Entries live for the whole session (the default).
    Never,
    /// `sweep` removes entries older than this age.
    MaxAge(Duration),
}

pub struct PeerDirectory {
    peers: HashMap<IdentityId, PeerEntry>,
    eviction: EvictionPolicy,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::with_eviction(EvictionPolicy::Never)
    }

    pub fn with_eviction(eviction: EvictionPolicy) -> Self {
        Self {
            peers: HashMap::new(),
            eviction,
        }
    }

    /// Record an inbound announcement. Returns `true` iff the identity
    /// was newly inserted; the caller owes the peer exactly one response
    /// in that case, and none otherwise.
    pub fn record_announcement(&mut self, identity: Identity) -> bool {
        if self.peers.contains_key(&identity.id) {
            debug!(peer = %identity.id, "duplicate announcement ignored");
            return false;
        }
        debug!(peer = %identity.id, link = %identity.peer_link_id, "peer announced");
        self.insert(identity, PresenceState::Announced);
        true
    }

    /// Record an inbound response. Inserts the identity if absent and
    /// marks the handshake mutual; never warrants a reply.
    pub fn record_response(&mut self, identity: Identity) -> bool {
        if let Some(entry) = self.peers.get_mut(&identity.id) {
            entry.presence = PresenceState::Mutual;
            return false;
        }
        debug!(peer = %identity.id, link = %identity.peer_link_id, "peer responded");
        self.insert(identity, PresenceState::Mutual);
        true
    }

    fn insert(&mut self, identity: Identity, presence: PresenceState) {
        self.peers.insert(
            identity.id.clone(),
            PeerEntry {
                identity,
                presence,
                seen_at: Instant::now(),
            },
        );
    }

    /// Look up the entry used to target and encrypt a send.
    pub fn resolve(&self, id: &IdentityId) -> Option<&PeerEntry> {
        self.peers.get(id)
    }

    /// Snapshot of every known identity, for the presentation layer.
    pub fn contacts(&self) -> Vec<Identity> {
        self.peers.values().map(|e| e.identity.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Apply the eviction policy as of `now`; returns how many entries
    /// were removed. A no-op under [`EvictionPolicy::Never`].
    pub fn sweep(&mut self, now: Instant) -> usize {
        let max_age = match self.eviction {
            EvictionPolicy::Never => return 0,
            EvictionPolicy::MaxAge(age) => age,
        };
        let before = self.peers.len();
        self.peers
            .retain(|_, entry| now.saturating_duration_since(entry.seen_at) <= max_age);
        let evicted = before - self.peers.len();
        if evicted > 0 {
            debug!(evicted, "swept stale directory entries");
        }
        evicted
    }
}

impl Default for PeerDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_shared::{PeerLinkId, PresenceStatus};

    fn identity(name: &str, link: &str) -> Identity {
        Identity {
            id: IdentityId(name.into()),
            display_name: name.into(),
            email: format!("{name}@example.com"),
            avatar_ref: String::new(),
            status: PresenceStatus::Online,
            public_key: format!("KEY-{name}"),
            peer_link_id: PeerLinkId(link.into()),
        }
    }

    #[test]
    fn test_announcement_inserts_once() {
        let mut dir = PeerDirectory::new();
        assert!(dir.record_announcement(identity("bob", "cfb-bob-1111")));
        assert!(!dir.record_announcement(identity("bob", "cfb-bob-1111")));
        assert_eq!(dir.len(), 1);
        assert_eq!(
            dir.resolve(&IdentityId("bob".into())).unwrap().presence,
            PresenceState::Announced
        );
    }

    #[test]
    fn test_duplicate_keeps_first_peer_link() {
        // Known limitation: a stale link from a previous session of the
        // same identity is not refreshed by a later announcement.
        let mut dir = PeerDirectory::new();
        dir.record_announcement(identity("bob", "cfb-bob-old1"));
        dir.record_announcement(identity("bob", "cfb-bob-new2"));

        let entry = dir.resolve(&IdentityId("bob".into())).unwrap();
        assert_eq!(entry.identity.peer_link_id.as_str(), "cfb-bob-old1");
    }

    #[test]
    fn test_response_upgrades_to_mutual() {
        let mut dir = PeerDirectory::new();
        dir.record_announcement(identity("bob", "cfb-bob-1111"));
        assert!(!dir.record_response(identity("bob", "cfb-bob-1111")));
        assert_eq!(
            dir.resolve(&IdentityId("bob".into())).unwrap().presence,
            PresenceState::Mutual
        );
    }

    #[test]
    fn test_response_inserts_when_absent() {
        let mut dir = PeerDirectory::new();
        assert!(dir.record_response(identity("carol", "cfb-carol-2222")));
        assert_eq!(
            dir.resolve(&IdentityId("carol".into())).unwrap().presence,
            PresenceState::Mutual
        );
    }

    #[test]
    fn test_announce_response_order_converges() {
        // Either arrival order leaves exactly one entry.
        let mut dir = PeerDirectory::new();
        dir.record_response(identity("bob", "cfb-bob-1111"));
        dir.record_announcement(identity("bob", "cfb-bob-1111"));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_never_policy_never_evicts() {
        let mut dir = PeerDirectory::new();
        dir.record_announcement(identity("bob", "cfb-bob-1111"));
        let far_future = Instant::now() + Duration::from_secs(3600);
        assert_eq!(dir.sweep(far_future), 0);
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_max_age_evicts_stale_entries() {
        let mut dir = PeerDirectory::with_eviction(EvictionPolicy::MaxAge(Duration::from_secs(5)));
        dir.record_announcement(identity("bob", "cfb-bob-1111"));

        assert_eq!(dir.sweep(Instant::now()), 0);
        assert_eq!(dir.sweep(Instant::now() + Duration::from_secs(10)), 1);
        assert!(dir.is_empty());
    }
}
