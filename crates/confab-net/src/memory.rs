//! In-process relay hub.
//!
//! Routes frames between peer-links attached in the same process and
//! announces every newcomer to the peers already attached. Used by the
//! loopback demo and the integration tests; it deliberately mirrors the
//! production relay's observable behaviour, including fire-and-forget
//! delivery and the absence of any ordering guarantee.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use confab_shared::constants::FRAME_CHANNEL_CAPACITY;
use confab_shared::{Frame, PeerLinkId, RelayEvent};

use crate::error::TransportError;
use crate::relay::{Relay, RelaySession};

#[derive(Clone, Default)]
pub struct MemoryRelay {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    links: Mutex<HashMap<PeerLinkId, mpsc::Sender<Frame>>>,
    closed: AtomicBool,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop accepting sessions. Already-attached peers keep their links;
    /// subsequent `attach` calls fail with `Unreachable`.
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    /// Number of currently attached peer-links.
    pub fn link_count(&self) -> usize {
        match self.inner.links.lock() {
            Ok(links) => links.len(),
            Err(_) => 0,
        }
    }
}

#[async_trait]
impl Relay for MemoryRelay {
    async fn attach(&self, peer_link_id: PeerLinkId) -> Result<RelaySession, TransportError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable("relay hub is shut down".into()));
        }

        let (in_tx, in_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (out_tx, mut out_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);

        let already_attached: Vec<(PeerLinkId, mpsc::Sender<Frame>)> = {
            let mut links = self
                .inner
                .links
                .lock()
                .map_err(|_| TransportError::Unreachable("relay registry poisoned".into()))?;
            let others = links
                .iter()
                .map(|(link, tx)| (link.clone(), tx.clone()))
                .collect();
            links.insert(peer_link_id.clone(), in_tx);
            others
        };

        debug!(link = %peer_link_id, "peer-link attached");

        // Tell everyone already here that a new peer-link is reachable.
        for (other, tx) in already_attached {
            let _ = tx.try_send(Frame {
                target: Some(other),
                event: RelayEvent::UserConnected {
                    peer_link_id: peer_link_id.clone(),
                },
            });
        }

        // Route this peer's outbound frames until it disconnects.
        let inner = self.inner.clone();
        let from = peer_link_id;
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                inner.route(&from, frame);
            }
            if let Ok(mut links) = inner.links.lock() {
                links.remove(&from);
            }
            debug!(link = %from, "peer-link detached");
        });

        Ok(RelaySession {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

impl Inner {
    fn route(&self, from: &PeerLinkId, frame: Frame) {
        let links = match self.links.lock() {
            Ok(links) => links,
            Err(_) => return,
        };

        match frame.target.clone() {
            Some(target) => match links.get(&target) {
                Some(tx) => {
                    if tx.try_send(frame).is_err() {
                        debug!(target = %target, "peer-link saturated, frame dropped");
                    }
                }
                None => {
                    debug!(target = %target, "unknown peer-link, frame dropped");
                }
            },
            None => {
                for (link, tx) in links.iter().filter(|(link, _)| *link != from) {
                    if tx.try_send(frame.clone()).is_err() {
                        debug!(target = %link, "peer-link saturated, frame dropped");
                    }
                }
            }
        }
    }
}
