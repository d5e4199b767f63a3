// Relay transport layer: the client side of the presence/event channel.

pub mod bus;
pub mod memory;
pub mod relay;
pub mod tcp;

mod error;

pub use bus::TransportBus;
pub use error::TransportError;
pub use memory::MemoryRelay;
pub use relay::{Relay, RelaySession};
pub use tcp::TcpRelay;
