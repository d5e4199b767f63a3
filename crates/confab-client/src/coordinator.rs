//! Session orchestration.
//!
//! `SyncCoordinator::start` wires the pieces together in the order the
//! session needs them: fresh keys, relay connect, snapshot load, then the
//! dispatch task that turns relay events into directory/engine/store
//! mutations. The presentation layer talks only to this type.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::{debug, info};

use confab_net::{Relay, TransportBus};
use confab_shared::{
    CryptoError, Group, GroupId, Identity, IdentityId, KeyVault, Message, PeerLinkId, RelayEvent,
    UserProfile,
};
use confab_store::{default_data_dir, load_profile, save_profile, DocumentStore};

use crate::engine::MessageEngine;
use crate::error::SessionError;
use crate::state::SessionState;

const PROFILE_FILE: &str = "profile.json";

/// Where a session keeps its durable snapshots.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Explicit data directory; `None` uses the platform default.
    pub data_dir: Option<PathBuf>,
}

impl SessionConfig {
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
        }
    }

    fn resolve(&self) -> Result<PathBuf, SessionError> {
        let dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => default_data_dir()?,
        };
        std::fs::create_dir_all(&dir).map_err(confab_store::StoreError::from)?;
        Ok(dir)
    }
}

pub struct SyncCoordinator {
    identity: Identity,
    bus: TransportBus,
    engine: Arc<MessageEngine>,
    state: Arc<Mutex<SessionState>>,
}

impl SyncCoordinator {
    /// Register `profile` and bring a session online.
    ///
    /// Keys are regenerated here on every call; only the profile record
    /// persists across restarts. Fails fast on an unavailable key
    /// generator or an unreachable relay; neither is retried.
    pub async fn start(
        relay: &dyn Relay,
        profile: UserProfile,
        config: &SessionConfig,
    ) -> Result<Self, SessionError> {
        let dir = config.resolve()?;

        let vault = tokio::task::spawn_blocking(KeyVault::generate)
            .await
            .map_err(|e| CryptoError::Unavailable(e.to_string()))??;
        let public_key = vault.export_public()?;
        let mut identity = Identity::register(&profile, public_key);

        let (bus, events) = TransportBus::connect(relay, &identity).await?;
        identity.peer_link_id = bus.peer_link_id().clone();

        save_profile(&dir.join(PROFILE_FILE), &profile)?;
        let message_store = DocumentStore::open(dir.join("messages.json"))?;
        let group_store = DocumentStore::open(dir.join("groups.json"))?;
        let state = Arc::new(Mutex::new(SessionState::open(message_store, group_store)));

        let engine = Arc::new(MessageEngine::new(vault, bus.clone(), identity.id.clone()));

        info!(identity = %identity.id, link = %identity.peer_link_id, "session online");

        tokio::spawn(dispatch_loop(
            events,
            identity.clone(),
            bus.clone(),
            engine.clone(),
            state.clone(),
        ));

        Ok(Self {
            identity,
            bus,
            engine,
            state,
        })
    }

    /// Bring a previously registered session online from the saved
    /// profile. `Ok(None)` when no registration exists.
    pub async fn resume(
        relay: &dyn Relay,
        config: &SessionConfig,
    ) -> Result<Option<Self>, SessionError> {
        let dir = config.resolve()?;
        match load_profile(&dir.join(PROFILE_FILE))? {
            Some(profile) => Ok(Some(Self::start(relay, profile, config).await?)),
            None => Ok(None),
        }
    }

    // A panicked handler must not wedge the session; recover the state.
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Send a direct message; see [`MessageEngine::send_direct`].
    pub fn send_direct(&self, text: &str, recipient: &IdentityId) -> Message {
        let mut state = self.state();
        self.engine.send_direct(&mut state, text, recipient)
    }

    /// Send a group message; see [`MessageEngine::send_group`].
    pub fn send_group(&self, text: &str, group_id: &GroupId) -> Option<Message> {
        let mut state = self.state();
        self.engine.send_group(&mut state, text, group_id)
    }

    /// Create a group (membership: us plus `invitees`, fixed forever) and
    /// push the definition to every invitee with a resolvable peer-link.
    pub fn create_group(&self, name: &str, invitees: Vec<IdentityId>) -> Group {
        let group = Group::new(name.to_string(), self.identity.id.clone(), invitees);

        let mut state = self.state();
        state.accept_group(group.clone());

        for member in group.members.iter().filter(|m| **m != self.identity.id) {
            match state.directory.resolve(member) {
                Some(entry) if !entry.identity.peer_link_id.as_str().is_empty() => {
                    self.bus.emit(
                        RelayEvent::GroupSync(group.clone()),
                        Some(&entry.identity.peer_link_id),
                    );
                }
                _ => {
                    debug!(group = %group.id, member = %member, "member unreachable, group not synced");
                }
            }
        }

        group
    }

    /// Every identity the presence protocol has discovered so far.
    pub fn contacts(&self) -> Vec<Identity> {
        self.state().directory.contacts()
    }

    /// Snapshot of the message history, insertion order.
    pub fn messages(&self) -> Vec<Message> {
        self.state().messages().to_vec()
    }

    /// Snapshot of the known groups.
    pub fn groups(&self) -> Vec<Group> {
        self.state().groups().to_vec()
    }

    pub fn local_identity(&self) -> &Identity {
        &self.identity
    }

    pub fn peer_link_id(&self) -> &PeerLinkId {
        self.bus.peer_link_id()
    }

    pub fn is_connected(&self) -> bool {
        self.bus.is_connected()
    }

    /// Release the relay link. Idempotent. In-flight handler work
    /// completes normally; its results are simply no longer delivered.
    pub fn disconnect(&self) {
        self.bus.disconnect();
    }
}

/// The single event-dispatch flow. Handler registration is this static
/// match: one dispatcher, no string-keyed multicast, no ordering
/// assumptions between event kinds.
async fn dispatch_loop(
    mut events: mpsc::Receiver<RelayEvent>,
    local: Identity,
    bus: TransportBus,
    engine: Arc<MessageEngine>,
    state: Arc<Mutex<SessionState>>,
) {
    debug!(identity = %local.id, "event dispatch started");

    while let Some(event) = events.recv().await {
        let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match event {
            RelayEvent::UserConnected { peer_link_id } => {
                debug!(link = %peer_link_id, "peer-link reachable, announcing");
                bus.emit(
                    RelayEvent::PresenceAnnouncement(local.clone()),
                    Some(&peer_link_id),
                );
            }

            RelayEvent::PresenceAnnouncement(remote) => {
                let reply_to = remote.peer_link_id.clone();
                // First sight owes exactly one response; duplicates get
                // none. This converges the simultaneous-announce race.
                if state.directory.record_announcement(remote) {
                    bus.emit(RelayEvent::PresenceResponse(local.clone()), Some(&reply_to));
                }
            }

            RelayEvent::PresenceResponse(remote) => {
                state.directory.record_response(remote);
            }

            RelayEvent::MessageReceived(message) => {
                engine.receive(&mut state, message);
            }

            RelayEvent::GroupSync(group) => {
                state.accept_group(group);
            }
        }
    }

    debug!(identity = %local.id, "event dispatch ended");
}
