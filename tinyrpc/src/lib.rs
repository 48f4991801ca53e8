//! Named handler dispatch over a framed TCP transport.
//!
//! Built on [`tinyrpc_codec`]'s wire format: this crate adds the method-name
//! registry ([`dispatcher`]), the server and client transports that drive it
//! over a real socket ([`server`], [`client`]), and the error type that
//! covers everything that can go wrong once bytes leave the codec's hands
//! ([`errors`]).

pub mod client;
pub mod dispatcher;
pub mod errors;
pub mod server;

pub use client::Client;
pub use dispatcher::Dispatcher;
pub use errors::RpcError;
pub use server::Server;
