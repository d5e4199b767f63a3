//! Message and group models.
//!
//! These structs are both the wire payloads and the persisted documents.
//! `Message::decrypted_text` is deliberately `#[serde(skip)]`: the
//! decrypted form of a direct message is session-local and must never
//! reach the relay or the disk snapshot.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::GROUP_CREATED_SUMMARY;
use crate::types::{GroupId, IdentityId, MessageId};

/// A single chat message. Exactly one of `receiver_id` / `group_id` is set.
///
/// `encrypted == true` only for direct messages whose recipient had a
/// usable public key at send time. Group messages are never individually
/// encrypted in this design; that is a documented limitation, not a bug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: IdentityId,
    pub receiver_id: Option<IdentityId>,
    pub group_id: Option<GroupId>,
    /// Base64 OAEP ciphertext when `encrypted`, plaintext otherwise.
    pub body: String,
    /// Unix epoch milliseconds, sender's clock.
    pub timestamp: i64,
    pub encrypted: bool,
    /// Session-local decrypted text (or the sender's original text).
    /// Never serialized.
    #[serde(skip)]
    pub decrypted_text: Option<String>,
}

impl Message {
    /// Construct a direct (1:1) message with a fresh id and timestamp.
    pub fn direct(
        sender_id: IdentityId,
        receiver_id: IdentityId,
        body: String,
        encrypted: bool,
    ) -> Self {
        Self {
            id: MessageId::new(),
            sender_id,
            receiver_id: Some(receiver_id),
            group_id: None,
            body,
            timestamp: Utc::now().timestamp_millis(),
            encrypted,
            decrypted_text: None,
        }
    }

    /// Construct a group message. Always plaintext.
    pub fn group(sender_id: IdentityId, group_id: GroupId, body: String) -> Self {
        Self {
            id: MessageId::new(),
            sender_id,
            receiver_id: None,
            group_id: Some(group_id),
            body,
            timestamp: Utc::now().timestamp_millis(),
            encrypted: false,
            decrypted_text: None,
        }
    }

    pub fn is_direct(&self) -> bool {
        self.receiver_id.is_some()
    }

    /// Text suitable for display: the session-local decrypted form when
    /// present, otherwise the body as stored.
    pub fn display_text(&self) -> &str {
        self.decrypted_text.as_deref().unwrap_or(&self.body)
    }

    /// Copy for the wire, with session-local fields stripped. The serde
    /// skip already keeps `decrypted_text` off real links; this guards
    /// in-process transports that never serialize.
    pub fn wire_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.decrypted_text = None;
        copy
    }
}

/// A named group conversation. Membership is fixed at creation (creator
/// plus invitees); there is no leave or add-member operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    /// Creator first, then invitees, duplicates removed.
    pub members: Vec<IdentityId>,
    /// Short summary of the latest activity, shown in conversation lists.
    pub last_message: String,
}

impl Group {
    pub fn new(name: String, creator: IdentityId, invitees: Vec<IdentityId>) -> Self {
        let mut members = vec![creator];
        for invitee in invitees {
            if !members.contains(&invitee) {
                members.push(invitee);
            }
        }
        Self {
            id: GroupId::new(),
            name,
            members,
            last_message: GROUP_CREATED_SUMMARY.to_string(),
        }
    }

    pub fn is_member(&self, id: &IdentityId) -> bool {
        self.members.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> IdentityId {
        IdentityId(s.into())
    }

    #[test]
    fn test_direct_message_shape() {
        let msg = Message::direct(id("alice"), id("bob"), "hi".into(), false);
        assert!(msg.is_direct());
        assert!(msg.group_id.is_none());
        assert!(!msg.encrypted);
        assert_eq!(msg.display_text(), "hi");
    }

    #[test]
    fn test_group_message_never_encrypted() {
        let msg = Message::group(id("alice"), GroupId::new(), "hello all".into());
        assert!(!msg.is_direct());
        assert!(!msg.encrypted);
    }

    #[test]
    fn test_decrypted_text_not_serialized() {
        let mut msg = Message::direct(id("alice"), id("bob"), "cipher".into(), true);
        msg.decrypted_text = Some("the secret".into());

        let bytes = bincode::serialize(&msg).unwrap();
        let restored: Message = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored.body, "cipher");
        assert!(restored.decrypted_text.is_none());
    }

    #[test]
    fn test_group_membership_dedups() {
        let group = Group::new(
            "tea party".into(),
            id("alice"),
            vec![id("bob"), id("alice"), id("bob"), id("hatter")],
        );
        assert_eq!(group.members, vec![id("alice"), id("bob"), id("hatter")]);
        assert!(group.is_member(&id("hatter")));
        assert!(!group.is_member(&id("queen")));
    }
}
