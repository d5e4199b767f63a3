//! The message pipeline: encrypt, route, decrypt, dedup, persist.
//!
//! Every failure mode in here degrades instead of propagating: a
//! malformed recipient key falls back to a plaintext send, an
//! undecryptable inbound body becomes a display marker, and a message
//! with no resolvable target is simply persisted locally. The
//! presentation layer only ever sees stored messages.

use tracing::{debug, warn};

use confab_net::TransportBus;
use confab_shared::constants::DECRYPTION_FAILED_MARKER;
use confab_shared::{GroupId, IdentityId, KeyVault, Message, RelayEvent};

use crate::state::SessionState;

pub struct MessageEngine {
    vault: KeyVault,
    bus: TransportBus,
    local_id: IdentityId,
}

impl MessageEngine {
    pub fn new(vault: KeyVault, bus: TransportBus, local_id: IdentityId) -> Self {
        Self {
            vault,
            bus,
            local_id,
        }
    }

    /// Send a direct (1:1) message.
    ///
    /// Encrypts when the recipient's public key is on file; a malformed
    /// key (or an oversize plaintext) degrades to an unencrypted send so
    /// delivery still happens. Without a resolvable peer-link the message
    /// is persisted locally only; there is no store-and-forward queue.
    pub fn send_direct(
        &self,
        state: &mut SessionState,
        text: &str,
        recipient: &IdentityId,
    ) -> Message {
        let (body, encrypted, target) = match state.directory.resolve(recipient) {
            Some(entry) => {
                let target = (!entry.identity.peer_link_id.as_str().is_empty())
                    .then(|| entry.identity.peer_link_id.clone());

                if entry.identity.public_key.is_empty() {
                    (text.to_string(), false, target)
                } else {
                    match KeyVault::import_public(&entry.identity.public_key)
                        .and_then(|key| KeyVault::encrypt_with(&key, text))
                    {
                        Ok(ciphertext) => (ciphertext, true, target),
                        Err(e) => {
                            warn!(
                                recipient = %recipient,
                                error = %e,
                                "cannot encrypt for recipient, sending plaintext"
                            );
                            (text.to_string(), false, target)
                        }
                    }
                }
            }
            None => (text.to_string(), false, None),
        };

        let mut message = Message::direct(self.local_id.clone(), recipient.clone(), body, encrypted);
        message.decrypted_text = Some(text.to_string());

        state.accept_message(message.clone());

        match target {
            Some(link) => {
                self.bus
                    .emit(RelayEvent::MessageReceived(message.wire_copy()), Some(&link));
            }
            None => {
                debug!(
                    recipient = %recipient,
                    message = %message.id,
                    "no resolvable peer-link, stored locally only"
                );
            }
        }

        message
    }

    /// Send a group message: one plaintext copy, individually addressed
    /// to every member with a resolvable peer-link. Partial delivery is
    /// silently possible. Returns `None` for an unknown group id.
    pub fn send_group(
        &self,
        state: &mut SessionState,
        text: &str,
        group_id: &GroupId,
    ) -> Option<Message> {
        let Some(group) = state.group(group_id) else {
            warn!(group = %group_id, "unknown group, nothing sent");
            return None;
        };

        let mut reachable = Vec::new();
        let mut skipped = 0usize;
        for member in group.members.iter().filter(|m| **m != self.local_id) {
            match state.directory.resolve(member) {
                Some(entry) if !entry.identity.peer_link_id.as_str().is_empty() => {
                    reachable.push(entry.identity.peer_link_id.clone());
                }
                _ => skipped += 1,
            }
        }

        let message = Message::group(self.local_id.clone(), *group_id, text.to_string());
        state.accept_message(message.clone());
        state.touch_group_summary(group_id, text);

        let wire = message.wire_copy();
        for link in &reachable {
            self.bus
                .emit(RelayEvent::MessageReceived(wire.clone()), Some(link));
        }
        debug!(
            group = %group_id,
            delivered = reachable.len(),
            unreachable = skipped,
            "group message fanned out"
        );

        Some(message)
    }

    /// Handle an inbound message envelope.
    ///
    /// Irrelevant envelopes (neither addressed to us nor to a known
    /// group) are dropped; encrypted bodies that fail to decrypt are
    /// kept with a marker; duplicates by id are discarded exactly-once.
    /// Returns `true` when the message was newly accepted.
    pub fn receive(&self, state: &mut SessionState, mut message: Message) -> bool {
        let for_me = message.receiver_id.as_ref() == Some(&self.local_id);
        let for_my_group = message
            .group_id
            .as_ref()
            .is_some_and(|g| state.group(g).is_some());
        if !for_me && !for_my_group {
            debug!(message = %message.id, "message not for this session, ignored");
            return false;
        }

        if for_me && message.encrypted {
            message.decrypted_text = Some(match self.vault.decrypt(&message.body) {
                Ok(text) => text,
                Err(e) => {
                    warn!(
                        message = %message.id,
                        error = %e,
                        "inbound message undecryptable, keeping envelope"
                    );
                    DECRYPTION_FAILED_MARKER.to_string()
                }
            });
        }

        let group_id = message.group_id;
        let summary = message.body.clone();
        if !state.accept_message(message) {
            return false;
        }
        if let Some(group_id) = group_id {
            // Group bodies are plaintext, so the body is the summary.
            state.touch_group_summary(&group_id, &summary);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_net::MemoryRelay;
    use confab_shared::{Group, Identity, PeerLinkId, PresenceStatus, UserProfile};
    use confab_store::DocumentStore;

    fn open_state(dir: &tempfile::TempDir) -> SessionState {
        SessionState::open(
            DocumentStore::open(dir.path().join("messages.json")).unwrap(),
            DocumentStore::open(dir.path().join("groups.json")).unwrap(),
        )
    }

    fn id(s: &str) -> IdentityId {
        IdentityId(s.into())
    }

    fn contact(name: &str, link: &str, public_key: &str) -> Identity {
        Identity {
            id: id(name),
            display_name: name.into(),
            email: format!("{name}@example.com"),
            avatar_ref: String::new(),
            status: PresenceStatus::Online,
            public_key: public_key.into(),
            peer_link_id: PeerLinkId(link.into()),
        }
    }

    async fn engine_for(name: &str) -> MessageEngine {
        let profile = UserProfile {
            display_name: name.into(),
            email: format!("{name}@example.com"),
            avatar_ref: String::new(),
        };
        let vault = KeyVault::generate().unwrap();
        let identity = Identity::register(&profile, vault.export_public().unwrap());
        let relay = MemoryRelay::new();
        let (bus, _events) = TransportBus::connect(&relay, &identity).await.unwrap();
        MessageEngine::new(vault, bus, identity.id)
    }

    #[tokio::test]
    async fn test_send_without_key_is_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open_state(&dir);
        let engine = engine_for("alice").await;

        // Bob is known but announced no public key.
        state
            .directory
            .record_announcement(contact("bob", "cfb-bob-1111", ""));

        let message = engine.send_direct(&mut state, "hi", &id("bob"));
        assert!(!message.encrypted);
        assert_eq!(message.body, "hi");
        assert_eq!(state.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_send_with_key_is_encrypted() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open_state(&dir);
        let engine = engine_for("alice").await;

        let bob_vault = KeyVault::generate().unwrap();
        state.directory.record_announcement(contact(
            "bob",
            "cfb-bob-1111",
            &bob_vault.export_public().unwrap(),
        ));

        let message = engine.send_direct(&mut state, "hi", &id("bob"));
        assert!(message.encrypted);
        assert_ne!(message.body, "hi");
        assert_eq!(bob_vault.decrypt(&message.body).unwrap(), "hi");
        // The sender still sees the original text.
        assert_eq!(message.display_text(), "hi");
    }

    #[tokio::test]
    async fn test_malformed_key_falls_back_to_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open_state(&dir);
        let engine = engine_for("alice").await;

        state
            .directory
            .record_announcement(contact("bob", "cfb-bob-1111", "!!not-a-key!!"));

        let message = engine.send_direct(&mut state, "hi", &id("bob"));
        assert!(!message.encrypted);
        assert_eq!(message.body, "hi");
    }

    #[tokio::test]
    async fn test_oversize_plaintext_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open_state(&dir);
        let engine = engine_for("alice").await;

        let bob_vault = KeyVault::generate().unwrap();
        state.directory.record_announcement(contact(
            "bob",
            "cfb-bob-1111",
            &bob_vault.export_public().unwrap(),
        ));

        let long = "x".repeat(400);
        let message = engine.send_direct(&mut state, &long, &id("bob"));
        assert!(!message.encrypted);
        assert_eq!(message.body, long);
    }

    #[tokio::test]
    async fn test_unknown_recipient_stored_locally() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open_state(&dir);
        let engine = engine_for("alice").await;

        let message = engine.send_direct(&mut state, "hello?", &id("ghost"));
        assert!(!message.encrypted);
        assert_eq!(state.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_receive_dedups_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open_state(&dir);
        let engine = engine_for("alice").await;

        let message = Message::direct(id("bob"), id("alice"), "once".into(), false);
        assert!(engine.receive(&mut state, message.clone()));
        assert!(!engine.receive(&mut state, message));
        assert_eq!(state.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_receive_tampered_ciphertext_keeps_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open_state(&dir);
        let engine = engine_for("alice").await;

        let message = Message::direct(id("bob"), id("alice"), "@@corrupt@@".into(), true);
        assert!(engine.receive(&mut state, message));

        let stored = &state.messages()[0];
        assert_eq!(stored.display_text(), DECRYPTION_FAILED_MARKER);
        assert_eq!(stored.body, "@@corrupt@@");
    }

    #[tokio::test]
    async fn test_receive_ignores_unrelated_messages() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open_state(&dir);
        let engine = engine_for("alice").await;

        let for_other = Message::direct(id("bob"), id("carol"), "psst".into(), false);
        assert!(!engine.receive(&mut state, for_other));

        let foreign_group = Message::group(id("bob"), GroupId::new(), "hey".into());
        assert!(!engine.receive(&mut state, foreign_group));

        assert!(state.messages().is_empty());
    }

    #[tokio::test]
    async fn test_send_group_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open_state(&dir);
        let engine = engine_for("alice").await;

        assert!(engine.send_group(&mut state, "anyone?", &GroupId::new()).is_none());
        assert!(state.messages().is_empty());
    }

    #[tokio::test]
    async fn test_send_group_tolerates_unreachable_members() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open_state(&dir);
        let engine = engine_for("alice").await;

        // Only bob is in the directory; carol has never announced.
        state
            .directory
            .record_announcement(contact("bob", "cfb-bob-1111", ""));
        let group = Group::new("tea".into(), id("alice"), vec![id("bob"), id("carol")]);
        let group_id = group.id;
        state.accept_group(group);

        let message = engine.send_group(&mut state, "five o'clock", &group_id).unwrap();
        assert!(!message.encrypted);
        assert_eq!(state.group(&group_id).unwrap().last_message, "five o'clock");
    }

    #[tokio::test]
    async fn test_receive_group_message_updates_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open_state(&dir);
        let engine = engine_for("alice").await;

        let group = Group::new("tea".into(), id("bob"), vec![id("alice")]);
        let group_id = group.id;
        state.accept_group(group);

        let message = Message::group(id("bob"), group_id, "scones ready".into());
        assert!(engine.receive(&mut state, message));
        assert_eq!(state.group(&group_id).unwrap().last_message, "scones ready");
    }
}
