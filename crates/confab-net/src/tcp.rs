//! TCP relay link.
//!
//! Connects to an external relay over TCP and exchanges length-prefixed
//! bincode frames: `u32` little-endian length, then the frame bytes. The
//! first frame on a fresh connection is a [`Hello`] registering the
//! peer-link; everything after is [`Frame`] traffic in both directions.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use confab_shared::constants::{FRAME_CHANNEL_CAPACITY, MAX_FRAME_BYTES};
use confab_shared::{Frame, PeerLinkId};

use crate::error::TransportError;
use crate::relay::{Relay, RelaySession};

/// Registration record sent once per connection, before any frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    pub peer_link_id: PeerLinkId,
}

/// Client side of a TCP relay connection.
pub struct TcpRelay {
    addr: String,
}

impl TcpRelay {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Relay for TcpRelay {
    async fn attach(&self, peer_link_id: PeerLinkId) -> Result<RelaySession, TransportError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| TransportError::Unreachable(format!("{}: {e}", self.addr)))?;
        let (mut read_half, mut write_half) = stream.into_split();

        write_frame(
            &mut write_half,
            &Hello {
                peer_link_id: peer_link_id.clone(),
            },
        )
        .await?;

        info!(relay = %self.addr, link = %peer_link_id, "attached to TCP relay");

        let (in_tx, in_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (out_tx, mut out_rx) = mpsc::channel::<Frame>(FRAME_CHANNEL_CAPACITY);

        // Writer: drain outbound frames onto the socket.
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if let Err(e) = write_frame(&mut write_half, &frame).await {
                    warn!(error = %e, "relay write failed, closing link");
                    break;
                }
            }
        });

        // Reader: deliver inbound frames until EOF or a wire error.
        tokio::spawn(async move {
            loop {
                match read_frame::<_, Frame>(&mut read_half).await {
                    Ok(Some(frame)) => {
                        if in_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("relay closed the connection");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "relay read failed, closing link");
                        break;
                    }
                }
            }
        });

        Ok(RelaySession {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

/// Write one length-prefixed bincode value.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = bincode::serialize(value)?;
    if bytes.len() > MAX_FRAME_BYTES {
        return Err(TransportError::FrameTooLarge(bytes.len()));
    }
    writer.write_u32_le(bytes.len() as u32).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed bincode value. `Ok(None)` on a clean EOF at a
/// frame boundary.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, TransportError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = match reader.read_u32_le().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_BYTES {
        return Err(TransportError::FrameTooLarge(len));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(bincode::deserialize(&buf)?))
}
