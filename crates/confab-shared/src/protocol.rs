use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::models::{Group, Message};
use crate::types::PeerLinkId;

/// Every event carried over the relay channel.
///
/// One typed enum with a single dispatcher replaces the string-keyed
/// multicast of ad-hoc event names; handler registration is the static
/// `match` in the sync coordinator. No ordering is guaranteed between
/// variants, or even between events of the same variant from different
/// senders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RelayEvent {
    /// A new peer-link became reachable. Carries no identity yet; the
    /// local session answers with a targeted announcement.
    UserConnected { peer_link_id: PeerLinkId },

    /// A remote session introduces itself (identity + public key +
    /// peer-link). First seen triggers a mandatory response.
    PresenceAnnouncement(Identity),

    /// The reply to an announcement. Never answered, which breaks the
    /// announce/response ping-pong.
    PresenceResponse(Identity),

    /// An inbound chat message for this session or one of its groups.
    MessageReceived(Message),

    /// A group definition pushed by its creator.
    GroupSync(Group),
}

impl RelayEvent {
    /// Short name for log fields.
    pub fn name(&self) -> &'static str {
        match self {
            RelayEvent::UserConnected { .. } => "user_connected",
            RelayEvent::PresenceAnnouncement(_) => "presence_announcement",
            RelayEvent::PresenceResponse(_) => "presence_response",
            RelayEvent::MessageReceived(_) => "message_received",
            RelayEvent::GroupSync(_) => "group_sync",
        }
    }
}

/// An addressed event as it travels over a relay link.
///
/// `target == None` means relay-default broadcast scope; `Some` addresses
/// a single peer-link. Delivery is fire-and-forget either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub target: Option<PeerLinkId>,
    pub event: RelayEvent,
}

impl Frame {
    /// Serialize to binary (bincode).
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;
    use crate::types::IdentityId;

    #[test]
    fn test_frame_roundtrip() {
        let msg = Message::direct(
            IdentityId("alice".into()),
            IdentityId("bob".into()),
            "ciphertext".into(),
            true,
        );
        let frame = Frame {
            target: Some(PeerLinkId("cfb-bob-a1b2".into())),
            event: RelayEvent::MessageReceived(msg.clone()),
        };

        let bytes = frame.to_bytes().unwrap();
        let restored = Frame::from_bytes(&bytes).unwrap();

        assert_eq!(restored.target, frame.target);
        match restored.event {
            RelayEvent::MessageReceived(m) => assert_eq!(m, msg),
            other => panic!("unexpected event: {}", other.name()),
        }
    }

    #[test]
    fn test_broadcast_frame_has_no_target() {
        let frame = Frame {
            target: None,
            event: RelayEvent::UserConnected {
                peer_link_id: PeerLinkId("cfb-carol-zz9q".into()),
            },
        };
        let restored = Frame::from_bytes(&frame.to_bytes().unwrap()).unwrap();
        assert!(restored.target.is_none());
        assert_eq!(restored.event.name(), "user_connected");
    }
}
