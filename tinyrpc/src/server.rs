//! TCP server: accepts connections, reads requests, dispatches, writes replies.
//!
//! The accept loop follows a `run_tcp_listener`-style shape — a
//! `tokio::select!` between a cancellation token and `listener.accept()` —
//! generalized to hand each connection its own `tokio::spawn`ed task instead
//! of serving one client at a time, since nothing here prevents concurrent
//! connections from sharing one current-thread reactor.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tinyrpc_codec::{read_frame, write_frame, Decode, Reader};

use crate::dispatcher::{Dispatcher, IntoAdapter};
use crate::errors::RpcError;

/// A running RPC server bound to one TCP port.
///
/// Owns the background thread running the single-threaded reactor; dropping
/// or calling [`Server::stop`] joins that thread. `Server` is not `Clone` —
/// it is the sole owner of its I/O context by construction.
pub struct Server {
    port: u16,
    dispatcher: Dispatcher,
    handle: Option<ServerHandle>,
}

struct ServerHandle {
    shutdown: CancellationToken,
    thread: std::thread::JoinHandle<()>,
}

impl Server {
    /// Builds a server that will bind to `0.0.0.0:port` once started.
    pub fn new(port: u16) -> Self {
        Server {
            port,
            dispatcher: Dispatcher::new(),
            handle: None,
        }
    }

    /// Registers a handler under `name`. Must be called before [`Server::start`].
    pub fn register<F, Args>(&mut self, name: impl Into<String>, handler: F)
    where
        F: IntoAdapter<Args>,
    {
        self.dispatcher.register(name, handler);
    }

    /// Removes the handler bound to `name`, if any. Must be called before
    /// [`Server::start`].
    pub fn unregister(&mut self, name: &str) {
        self.dispatcher.unregister(name);
    }

    /// Builds a current-thread reactor on a dedicated background thread and
    /// starts accepting connections on it.
    pub fn start(&mut self) -> std::io::Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        let port = self.port;
        let dispatcher = Arc::new(std::mem::take(&mut self.dispatcher));
        let shutdown = CancellationToken::new();
        let thread_shutdown = shutdown.clone();

        let thread = std::thread::Builder::new()
            .name("tinyrpc-server".into())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build server reactor");
                runtime.block_on(run_accept_loop(port, dispatcher, thread_shutdown));
            })?;

        self.handle = Some(ServerHandle { shutdown, thread });
        Ok(())
    }

    /// Signals the accept loop to stop and joins the background thread.
    ///
    /// Safe to call more than once; a server that was never started is a
    /// no-op.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown.cancel();
            let _ = handle.thread.join();
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_accept_loop(port: u16, dispatcher: Arc<Dispatcher>, shutdown: CancellationToken) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!(target: "tinyrpc::server", error = %e, %addr, "failed to bind listener");
            return;
        }
    };
    info!(target: "tinyrpc::server", local_addr = ?listener.local_addr().ok(), "listening");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(target: "tinyrpc::server", "shutdown signal received, stopping accept loop");
                break;
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer)) => {
                        debug!(target: "tinyrpc::server", %peer, "accepted connection");
                        let dispatcher = dispatcher.clone();
                        let conn_shutdown = shutdown.child_token();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, &dispatcher, conn_shutdown).await {
                                warn!(target: "tinyrpc::server", %peer, error = %e, "connection closed with error");
                            } else {
                                debug!(target: "tinyrpc::server", %peer, "connection closed");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(target: "tinyrpc::server", error = %e, "accept failed");
                    }
                }
            }
        }
    }
}

/// Runs the request/reply loop for a single connection until the peer
/// closes it, a decode failure occurs, or `shutdown` fires.
///
/// Requests are served strictly one at a time on this connection: the next
/// frame is not read until the current reply has been written in full.
async fn handle_connection(
    mut stream: TcpStream,
    dispatcher: &Dispatcher,
    shutdown: CancellationToken,
) -> Result<(), RpcError> {
    loop {
        let payload = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            frame = read_frame(&mut stream, None) => frame?,
        };

        let Some(payload) = payload else {
            return Ok(());
        };

        let mut reader = Reader::new(&payload);
        let name = String::decode(&mut reader).map_err(RpcError::DecodeFailed)?;
        let reply = dispatcher.call(&name, &mut reader)?;

        write_frame(&mut stream, &reply).await?;
    }
}
