//! Wire-level constants shared by every reader, writer and transport.
//!
//! There is no config file or env-var surface here — these are the only
//! knobs the protocol defines, so they live as plain `pub const`s rather
//! than a configuration layer.

/// Fixed magic value identifying a valid frame header.
///
/// `echo -n tinyrpc | md5sum` truncated to 32 bits.
pub const MAGIC: u32 = 0xC2A9_C9A7;

/// Size in bytes of the `[magic: u32 LE][length: u32 LE]` frame header.
pub const HEADER_LEN: usize = 8;

/// Reply payload ceiling enforced by the client's read loop (2^12 bytes).
pub const MAX_LENGTH: usize = 4096;
