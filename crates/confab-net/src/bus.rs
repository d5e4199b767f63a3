//! The transport bus: a session's handle to the relay channel.
//!
//! `connect` registers a fresh peer-link and yields the typed inbound
//! event stream; `emit` is fire-and-forget with no acknowledgement.
//! Nothing here retries: an unreachable relay is fatal to session start,
//! and reconnection policy belongs to the caller.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use confab_shared::constants::FRAME_CHANNEL_CAPACITY;
use confab_shared::{Frame, Identity, PeerLinkId, RelayEvent};

use crate::error::TransportError;
use crate::relay::Relay;

#[derive(Clone)]
pub struct TransportBus {
    peer_link_id: PeerLinkId,
    outbound: Arc<Mutex<Option<mpsc::Sender<Frame>>>>,
}

impl TransportBus {
    /// Establish the relay session for `identity`, minting a fresh
    /// session-scoped peer-link address.
    ///
    /// Returns the bus handle and the inbound event stream. Events carry
    /// no ordering guarantee across kinds, or even within a kind across
    /// different senders.
    pub async fn connect(
        relay: &dyn Relay,
        identity: &Identity,
    ) -> Result<(Self, mpsc::Receiver<RelayEvent>), TransportError> {
        let peer_link_id = PeerLinkId::fresh(&identity.id);
        let session = relay.attach(peer_link_id.clone()).await?;

        let (event_tx, event_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);

        // Unwrap frames into the typed event stream until the link closes.
        let mut inbound = session.inbound;
        tokio::spawn(async move {
            while let Some(frame) = inbound.recv().await {
                debug!(event = frame.event.name(), "relay event");
                if event_tx.send(frame.event).await.is_err() {
                    break;
                }
            }
            debug!("relay inbound closed");
        });

        info!(link = %peer_link_id, "transport connected");

        Ok((
            Self {
                peer_link_id,
                outbound: Arc::new(Mutex::new(Some(session.outbound))),
            },
            event_rx,
        ))
    }

    /// The session-scoped address remote peers use to reach us.
    pub fn peer_link_id(&self) -> &PeerLinkId {
        &self.peer_link_id
    }

    /// Send an event, addressed to one peer-link or broadcast to the
    /// relay's default scope. Fire-and-forget: a closed or saturated
    /// link drops the frame with a log line, never an error.
    pub fn emit(&self, event: RelayEvent, target: Option<&PeerLinkId>) {
        let guard = match self.outbound.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        let Some(tx) = guard.as_ref() else {
            debug!(event = event.name(), "emit after disconnect, frame dropped");
            return;
        };

        let frame = Frame {
            target: target.cloned(),
            event,
        };
        if let Err(e) = tx.try_send(frame) {
            warn!(error = %e, "relay send failed, frame dropped");
        }
    }

    /// Release the relay link. Idempotent; in-flight operations complete
    /// normally and their results are simply discarded.
    pub fn disconnect(&self) {
        let mut guard = match self.outbound.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        if guard.take().is_some() {
            info!(link = %self.peer_link_id, "transport disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.outbound.lock().map(|g| g.is_some()).unwrap_or(false)
    }
}
