//! # confab-client
//!
//! The session core the presentation layer drives: peer directory,
//! message engine, and the sync coordinator that wires relay events to
//! both. Rendering, call media, and the relay server itself live
//! elsewhere; this crate exposes state snapshots and send operations.

pub mod coordinator;
pub mod directory;
pub mod engine;
pub mod state;

mod error;

pub use coordinator::{SessionConfig, SyncCoordinator};
pub use directory::{EvictionPolicy, PeerDirectory, PeerEntry, PresenceState};
pub use engine::MessageEngine;
pub use error::SessionError;
pub use state::SessionState;
