//! Error types for the wire codec.
//!
//! [`CodecError`] covers the sticky failures a [`Reader`](crate::reader::Reader)
//! or [`Writer`](crate::writer::Writer) can get stuck in: all variants are
//! cheap to clone, since a sticky error is handed back on every call after the
//! first failure. Transport-level failures (I/O, oversized frames) are not
//! modelled here — see [`crate::frame::FrameError`], which wraps this type.

use thiserror::Error;

/// Failure encoding or decoding a value on the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A value shape was asked for that the codec has no encoding for.
    #[error("unsupported value shape: {0}")]
    UnsupportedType(String),

    /// A frame's magic did not match [`crate::config::MAGIC`].
    #[error("unsupported message: bad magic 0x{0:08x}")]
    UnsupportedMessage(u32),

    /// A frame header declared a payload length that does not match the
    /// number of bytes actually delivered.
    #[error("frame length mismatch: header declared {declared} bytes, buffer has {actual}")]
    FrameLengthMismatch { declared: u32, actual: usize },

    /// A read was attempted past the end of the payload buffer.
    #[error("short read: need {needed} bytes, {available} available")]
    ShortRead { needed: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_type_display() {
        let err = CodecError::UnsupportedType("HashMap<Vec<u8>, ()>".into());
        assert_eq!(
            err.to_string(),
            "unsupported value shape: HashMap<Vec<u8>, ()>"
        );
    }

    #[test]
    fn unsupported_message_display_is_hex() {
        let err = CodecError::UnsupportedMessage(0xdead_beef);
        assert_eq!(err.to_string(), "unsupported message: bad magic 0xdeadbeef");
    }

    #[test]
    fn frame_length_mismatch_display() {
        let err = CodecError::FrameLengthMismatch {
            declared: 16,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "frame length mismatch: header declared 16 bytes, buffer has 12"
        );
    }

    #[test]
    fn short_read_display() {
        let err = CodecError::ShortRead {
            needed: 4,
            available: 1,
        };
        assert_eq!(err.to_string(), "short read: need 4 bytes, 1 available");
    }

    #[test]
    fn codec_error_is_clone_and_eq() {
        let a = CodecError::ShortRead {
            needed: 4,
            available: 0,
        };
        let b = a.clone();
        assert_eq!(a, b);
    }
}
