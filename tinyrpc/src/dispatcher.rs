//! Name-to-handler registry and per-call argument unpacking.
//!
//! Shaped like a `ConnectionTypeRegistry` (`HashMap<String, Factory>` plus a
//! small lookup/insert/remove surface), generalized from "name → boxed
//! constructor" to "name → boxed argument-decoding adapter". The arity-polymorphic
//! registration (`Fn() -> R`, `Fn(T1) -> R`, ... `Fn(T1,T2,T3,T4) -> R`) follows
//! the same shape as `axum`'s `Handler`/`FromRequest` trait family: one trait,
//! `IntoAdapter<Args>`, implemented once per arity, so callers never pick an
//! overload by hand.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tinyrpc_codec::{Decode, Encode, Reader, Writer};

use crate::errors::RpcError;

type Adapter = dyn Fn(&mut Reader) -> Result<Vec<u8>, RpcError> + Send + Sync;

/// Maps method names to the adapters that unpack arguments, invoke the
/// underlying handler, and re-encode its result.
///
/// Mutation (`register`/`unregister`) is only meaningful before the owning
/// [`crate::server::Server`] starts; dispatch itself only ever reads the
/// table through a shared `Arc`, so handing a running server's accept loop
/// a clone of that `Arc` is race-free by construction.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Arc<Adapter>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler under `name`, replacing any prior binding.
    pub fn register<F, Args>(&mut self, name: impl Into<String>, handler: F)
    where
        F: IntoAdapter<Args>,
    {
        self.handlers
            .insert(name.into(), Arc::from(handler.into_adapter()));
    }

    /// Removes the handler bound to `name`, if any.
    pub fn unregister(&mut self, name: &str) {
        self.handlers.remove(name);
    }

    /// Whether a handler is currently bound to `name`.
    pub fn has_method(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Looks up `name`, decodes its arguments from `reader`, runs the
    /// handler, and returns the encoded reply payload.
    ///
    /// A missing name surfaces as [`RpcError::UnknownMethod`]; a panic
    /// inside the handler is caught and surfaced as [`RpcError::HandlerFault`]
    /// rather than unwinding into the caller's worker thread.
    pub fn call(&self, name: &str, reader: &mut Reader) -> Result<Vec<u8>, RpcError> {
        let adapter = self
            .handlers
            .get(name)
            .ok_or_else(|| RpcError::UnknownMethod(name.to_string()))?
            .clone();
        adapter(reader)
    }
}

/// Converts a plain closure or bound-method closure into a boxed [`Adapter`].
///
/// `Args` is the tuple of decoded argument types; it exists purely to let
/// the same method name (`into_adapter`) be implemented once per arity
/// without the impls overlapping under coherence.
pub trait IntoAdapter<Args> {
    fn into_adapter(self) -> Box<Adapter>;
}

fn run_handler<R: Encode>(result: std::thread::Result<R>) -> Result<Vec<u8>, RpcError> {
    let value = result.map_err(|payload| RpcError::HandlerFault(panic_message(payload)))?;
    let mut writer = Writer::new();
    value.encode(&mut writer);
    writer.finalize().map_err(RpcError::EncodeFailed)
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked with a non-string payload".to_string()
    }
}

macro_rules! impl_into_adapter {
    ($($idx:tt : $arg:ident),*) => {
        impl<F, R, $($arg),*> IntoAdapter<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: Encode + 'static,
            $($arg: Decode + 'static,)*
        {
            #[allow(unused_variables)]
            fn into_adapter(self) -> Box<Adapter> {
                Box::new(move |reader: &mut Reader| {
                    $(let $arg = $arg::decode(reader).map_err(RpcError::DecodeFailed)?;)*
                    let result = catch_unwind(AssertUnwindSafe(|| self($($arg),*)));
                    run_handler(result)
                })
            }
        }
    };
}

impl_into_adapter!();
impl_into_adapter!(0: T1);
impl_into_adapter!(0: T1, 1: T2);
impl_into_adapter!(0: T1, 1: T2, 2: T3);
impl_into_adapter!(0: T1, 1: T2, 2: T3, 3: T4);
