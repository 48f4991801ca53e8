//! Schema-less binary framing codec: the wire-level half of tinyrpc.
//!
//! This crate knows nothing about method names or dispatch — it only
//! defines how values are shaped into bytes ([`value`]), how those bytes
//! are framed on a stream ([`frame`]), and the sticky-error cursors used to
//! build and consume a single frame's payload ([`reader`], [`writer`]).

pub mod aggregate;
pub mod config;
pub mod errors;
pub mod frame;
pub mod reader;
pub mod value;
pub mod writer;

pub use aggregate::PlainAggregate;
pub use config::MAX_LENGTH;
pub use errors::CodecError;
pub use frame::{read_frame, write_frame, FrameError};
pub use reader::Reader;
pub use value::{Decode, Encode};
pub use writer::Writer;
