use thiserror::Error;

/// Errors produced by the transport layer.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The relay could not be reached. Fatal to session start; retry
    /// policy belongs to whoever drives reconnection, not this layer.
    #[error("Relay unreachable: {0}")]
    Unreachable(String),

    /// Wire (de)serialization error.
    #[error("Wire codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// An inbound frame declared an implausible length.
    #[error("Frame of {0} bytes exceeds the maximum")]
    FrameTooLarge(usize),

    /// I/O error on the relay link.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
