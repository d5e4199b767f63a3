/// Application name
pub const APP_NAME: &str = "Confab";

/// RSA modulus size for session identity keys
pub const RSA_KEY_BITS: usize = 2048;

/// Prefix for session-scoped peer-link addresses
pub const PEER_LINK_PREFIX: &str = "cfb";

/// Random base36 suffix length appended to peer-link addresses
pub const PEER_LINK_SUFFIX_LEN: usize = 4;

/// Display text substituted when an inbound ciphertext cannot be decrypted
pub const DECRYPTION_FAILED_MARKER: &str = "[decryption failed]";

/// Summary shown for a freshly created group before any message arrives
pub const GROUP_CREATED_SUMMARY: &str = "Group created";

/// Capacity of the frame/event channels between the relay link and the bus
pub const FRAME_CHANNEL_CAPACITY: usize = 256;

/// Maximum wire frame size in bytes (256 KiB)
pub const MAX_FRAME_BYTES: usize = 262_144;
