//! TCP client: connects once, then serializes calls on a background thread.
//!
//! Like [`crate::server::Server`], the client owns one current-thread
//! reactor on a dedicated background thread, applied symmetrically to both
//! ends. Calls are dispatched onto that thread over an mpsc channel and
//! replies are delivered back to the caller's callback on the same thread,
//! preserving strict per-client FIFO.

use std::net::SocketAddr;
use std::sync::{Arc, Condvar, Mutex as StdMutex};

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tinyrpc_codec::{read_frame, write_frame, Decode, Encode, Reader, Writer, MAX_LENGTH};

use crate::errors::RpcError;

/// A pending call: its encoded request payload and the callback to invoke
/// with the decoded reply bytes once they arrive.
struct PendingCall {
    payload: Vec<u8>,
    on_result: Box<dyn FnOnce(Result<Vec<u8>, RpcError>) + Send>,
}

/// A client bound to one server address.
///
/// Not `Clone`: the background thread and its connection are owned
/// exclusively by this value, dropped/joined in [`Client::stop`].
pub struct Client {
    addr: SocketAddr,
    handle: Option<ClientHandle>,
}

struct ClientHandle {
    shutdown: CancellationToken,
    calls: mpsc::UnboundedSender<PendingCall>,
    thread: std::thread::JoinHandle<()>,
    // Enforces at most one in-flight call: acquired (blocking) in `call`,
    // released once the reply has been decoded and the callback has
    // returned, on the worker thread.
    inflight: Arc<InflightGate>,
}

/// A binary gate blocking the *calling* thread while a prior call is still
/// in flight, released from the *worker* thread once that call's callback
/// returns. A plain `std::sync::Mutex` can't do this directly since its
/// guard isn't `Send` and can't cross from the call site to the worker
/// thread that needs to release it.
struct InflightGate {
    busy: StdMutex<bool>,
    free: Condvar,
}

impl InflightGate {
    fn new() -> Self {
        InflightGate {
            busy: StdMutex::new(false),
            free: Condvar::new(),
        }
    }

    /// Blocks the calling thread until no other call is in flight.
    fn acquire(&self) {
        let mut busy = self.busy.lock().expect("inflight gate poisoned");
        while *busy {
            busy = self.free.wait(busy).expect("inflight gate poisoned");
        }
        *busy = true;
    }

    /// Marks the client free again and wakes one waiter, if any.
    fn release(&self) {
        let mut busy = self.busy.lock().expect("inflight gate poisoned");
        *busy = false;
        self.free.notify_one();
    }
}

impl Client {
    /// Builds a client targeting `host:port`. `host` is a dotted-quad IPv4
    /// address.
    pub fn new(host: &str, port: u16) -> std::io::Result<Self> {
        let ip: std::net::Ipv4Addr = host
            .parse()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid host"))?;
        Ok(Client {
            addr: SocketAddr::from((ip, port)),
            handle: None,
        })
    }

    /// Connects and starts the background worker thread.
    pub fn start(&mut self) -> std::io::Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        let addr = self.addr;
        let shutdown = CancellationToken::new();
        let thread_shutdown = shutdown.clone();
        let (tx, rx) = mpsc::unbounded_channel::<PendingCall>();

        let thread = std::thread::Builder::new()
            .name("tinyrpc-client".into())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build client reactor");
                runtime.block_on(run_worker_loop(addr, rx, thread_shutdown));
            })?;

        self.handle = Some(ClientHandle {
            shutdown,
            calls: tx,
            thread,
            inflight: Arc::new(InflightGate::new()),
        });
        Ok(())
    }

    /// Issues a call to `name` with the given arguments. `on_result` runs on
    /// the worker thread once the reply has been decoded (or the call has
    /// failed).
    ///
    /// Only one call may be in flight at a time on a given client: `call`
    /// blocks the calling thread until any previous call's callback has
    /// returned, matching the server's strictly serial per-connection
    /// ordering. A caller that wants concurrent calls in flight creates
    /// multiple clients.
    pub fn call<Args, R, F>(&self, name: &str, args: Args, on_result: F)
    where
        Args: Encode,
        R: Decode + 'static,
        F: FnOnce(Result<R, RpcError>) + Send + 'static,
    {
        let Some(handle) = &self.handle else {
            on_result(Err(RpcError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "client not started",
            ))));
            return;
        };

        handle.inflight.acquire();

        let mut request = Writer::new();
        name.to_string().encode(&mut request);
        args.encode(&mut request);
        let payload = match request.finalize() {
            Ok(bytes) => bytes,
            Err(e) => {
                handle.inflight.release();
                on_result(Err(RpcError::EncodeFailed(e)));
                return;
            }
        };

        let inflight = handle.inflight.clone();
        let decode_and_callback: Box<dyn FnOnce(Result<Vec<u8>, RpcError>) + Send> =
            Box::new(move |result: Result<Vec<u8>, RpcError>| {
                let decoded = result.and_then(|bytes| {
                    let mut reader = Reader::new(&bytes);
                    R::decode(&mut reader).map_err(RpcError::DecodeFailed)
                });
                on_result(decoded);
                inflight.release();
            });

        let pending = PendingCall {
            payload,
            on_result: decode_and_callback,
        };

        if handle.calls.send(pending).is_err() {
            handle.inflight.release();
            debug!(target: "tinyrpc::client", "worker loop gone, call dropped");
        }
    }

    /// Closes the connection, stops the worker loop, and joins the thread.
    /// Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown.cancel();
            let _ = handle.thread.join();
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Bounded connect retries to ride out the brief window between a freshly
/// `start()`-ed `Server`'s background thread being spawned and its listener
/// actually being bound — a real race, not a hypothetical one, since the
/// two run on independent background threads with no handshake between them.
const CONNECT_RETRIES: u32 = 10;
const CONNECT_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(20);

async fn connect_with_retry(addr: SocketAddr) -> std::io::Result<TcpStream> {
    let mut last_err = None;
    for _ in 0..CONNECT_RETRIES {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                last_err = Some(e);
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
        }
    }
    Err(last_err.expect("CONNECT_RETRIES is non-zero"))
}

async fn run_worker_loop(
    addr: SocketAddr,
    mut calls: mpsc::UnboundedReceiver<PendingCall>,
    shutdown: CancellationToken,
) {
    let mut stream = match connect_with_retry(addr).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(target: "tinyrpc::client", error = %e, %addr, "connect failed");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            next = calls.recv() => {
                let Some(pending) = next else { break };
                let result = run_one_call(&mut stream, &pending.payload).await;
                (pending.on_result)(result);
            }
        }
    }
}

async fn run_one_call(stream: &mut TcpStream, payload: &[u8]) -> Result<Vec<u8>, RpcError> {
    write_frame(stream, payload).await?;
    match read_frame(stream, Some(MAX_LENGTH as u32)).await? {
        Some(reply) => Ok(reply),
        None => Err(RpcError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed before reply",
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn calls_are_decoded_against_a_real_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let payload = read_frame(&mut stream, None).await.unwrap().unwrap();
            let mut reader = Reader::new(&payload);
            let name = String::decode(&mut reader).unwrap();
            assert_eq!(name, "echo");
            let arg = String::decode(&mut reader).unwrap();

            let mut w = Writer::new();
            arg.encode(&mut w);
            let reply = w.finalize().unwrap();
            write_frame(&mut stream, &reply).await.unwrap();
        });

        let mut client = Client::new("127.0.0.1", addr.port()).unwrap();
        client.start().unwrap();

        let (tx, rx) = std_mpsc::channel();
        client.call::<_, String, _>("echo", ("hello rpc".to_string(),), move |result| {
            tx.send(result).unwrap();
        });

        let result = rx.recv_timeout(std::time::Duration::from_secs(2)).unwrap();
        assert_eq!(result.unwrap(), "hello rpc");

        client.stop();
        let _ = server.await;
    }

    #[test]
    fn new_rejects_non_ipv4_host() {
        assert!(Client::new("not-an-ip", 1234).is_err());
    }
}
