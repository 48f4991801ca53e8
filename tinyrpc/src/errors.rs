//! Transport-facing error type.
//!
//! Splits from [`tinyrpc_codec::CodecError`] the same way a layered error
//! stack splits a core error from session/file errors: the codec owns the
//! local, sticky, synchronous failures; this crate owns the ones that end a
//! connection.

use thiserror::Error;
use tinyrpc_codec::CodecError;

/// A failure that ends a server connection or a client call.
#[derive(Error, Debug)]
pub enum RpcError {
    /// The dispatcher has no handler registered under this name.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// The argument reader entered an error state while unpacking a request.
    #[error("failed to decode arguments: {0}")]
    DecodeFailed(#[from] CodecError),

    /// A handler's return value entered an error state while being encoded
    /// into the reply payload.
    #[error("failed to encode reply: {0}")]
    EncodeFailed(CodecError),

    /// A registered handler panicked while running.
    #[error("handler panicked: {0}")]
    HandlerFault(String),

    /// Framing or I/O failure at the transport layer.
    #[error("frame error: {0}")]
    Frame(#[from] tinyrpc_codec::FrameError),

    /// A low-level I/O error outside of frame reading/writing (connect, bind).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
