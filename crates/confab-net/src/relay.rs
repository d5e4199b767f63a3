//! The relay connector seam.
//!
//! A [`Relay`] hands out frame channels for a registered peer-link. The
//! relay *server* is out of scope; this crate ships an in-process hub
//! ([`crate::MemoryRelay`]) and a TCP link ([`crate::TcpRelay`]) behind
//! the same trait.

use async_trait::async_trait;
use tokio::sync::mpsc;

use confab_shared::{Frame, PeerLinkId};

use crate::error::TransportError;

/// An attached relay endpoint: frames written to `outbound` travel to the
/// relay, frames addressed to this peer-link arrive on `inbound`. No
/// ordering or delivery guarantee on either side.
pub struct RelaySession {
    pub outbound: mpsc::Sender<Frame>,
    pub inbound: mpsc::Receiver<Frame>,
}

#[async_trait]
pub trait Relay: Send + Sync {
    /// Register a peer-link with the relay and open its frame channels.
    ///
    /// Fails with [`TransportError::Unreachable`] when the relay cannot
    /// be reached or is no longer accepting sessions.
    async fn attach(&self, peer_link_id: PeerLinkId) -> Result<RelaySession, TransportError>;
}
