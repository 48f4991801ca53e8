//! Mode-dispatch demo binary exercising the library end-to-end.
//!
//! Not part of the library's public API: this only drives a real server and
//! a real client against each other over a loopback TCP socket, the same
//! `--listen`/`--connect` mode split a daemon's `main` uses for its
//! `--stdio`/`--listen`/`--daemon` modes.

use tinyrpc_codec::PlainAggregate;
use tinyrpc::{Client, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_PORT: u16 = 7685;

/// `A{sum, diff, product}`, the reply type of the `change` handler.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Totals {
    sum: i32,
    diff: i32,
    product: i32,
}

/// `B{x, y}`, the request type of the `change` handler.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Pair {
    x: i32,
    y: i32,
}

unsafe impl PlainAggregate for Totals {}
unsafe impl PlainAggregate for Pair {}
tinyrpc_codec::plain_aggregate!(Totals);
tinyrpc_codec::plain_aggregate!(Pair);

/// Holds the bias subtracted out by the `sub` handler, standing in for a
/// bound method on a receiver with state.
struct Suber {
    bias: i32,
}

fn print_usage() {
    eprintln!("Usage: tinyrpc-demo <MODE>");
    eprintln!();
    eprintln!("Modes:");
    eprintln!("  --listen [port]       Run the demo server (default port {DEFAULT_PORT})");
    eprintln!("  --connect [host] [port]  Run the demo client against a running server");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --version   Print version and exit");
    eprintln!("  --help      Print this help message");
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "--version" => {
            println!("tinyrpc-demo {}", VERSION);
            Ok(())
        }
        "--help" => {
            print_usage();
            Ok(())
        }
        "--listen" => {
            init_tracing();
            let port = args
                .get(2)
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PORT);
            run_server(port)
        }
        "--connect" => {
            init_tracing();
            let host = args.get(2).map(String::as_str).unwrap_or("127.0.0.1");
            let port = args
                .get(3)
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PORT);
            run_client(host, port)
        }
        other => {
            eprintln!("Unknown option: {other}");
            print_usage();
            std::process::exit(1);
        }
    }
}

fn run_server(port: u16) -> anyhow::Result<()> {
    use std::sync::{Arc, Mutex};

    let mut server = Server::new(port);

    server.register("add", |x: i32, y: i32| x + y + 10);
    server.register("echo", |s: String| s);
    server.register("nothing", || ());
    server.register("change", |pair: Pair| Totals {
        sum: pair.x + pair.y,
        diff: pair.x - pair.y,
        product: pair.x * pair.y,
    });

    let suber = Arc::new(Mutex::new(Suber { bias: 10 }));
    let bound = suber.clone();
    server.register("sub", move |x: i32, y: i32| {
        let s = bound.lock().expect("suber mutex poisoned");
        x - y - s.bias
    });

    server.start()?;
    info!(target: "tinyrpc::demo", port, "tinyrpc-demo server listening, press ctrl-c to stop");

    block_until_ctrlc();
    server.stop();
    Ok(())
}

/// Blocks the calling thread until ctrl-c.
///
/// `main` stays synchronous so it never holds an ambient tokio runtime —
/// `Server`/`Client` each own their own background reactor, and this throwaway
/// one exists only to drive the `ctrl_c` future.
fn block_until_ctrlc() {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build ctrl-c runtime");
    rt.block_on(async {
        let _ = tokio::signal::ctrl_c().await;
    });
}

fn run_client(host: &str, port: u16) -> anyhow::Result<()> {
    use std::sync::mpsc::channel;
    use std::time::Duration;

    let mut client = Client::new(host, port)?;
    client.start()?;

    let (tx, rx) = channel();
    client.call::<_, i32, _>("add", (1i32, 2i32), {
        let tx = tx.clone();
        move |result| tx.send(("add", format!("{result:?}"))).unwrap()
    });
    let (name, value) = rx.recv_timeout(Duration::from_secs(5))?;
    info!(target: "tinyrpc::demo", name, value, "call completed");

    client.call::<_, String, _>("echo", ("hello rpc".to_string(),), {
        let tx = tx.clone();
        move |result| tx.send(("echo", format!("{result:?}"))).unwrap()
    });
    let (name, value) = rx.recv_timeout(Duration::from_secs(5))?;
    info!(target: "tinyrpc::demo", name, value, "call completed");

    client.call::<_, i32, _>("sub", (1i32, 2i32), {
        let tx = tx.clone();
        move |result| tx.send(("sub", format!("{result:?}"))).unwrap()
    });
    let (name, value) = rx.recv_timeout(Duration::from_secs(5))?;
    info!(target: "tinyrpc::demo", name, value, "call completed");

    client.call::<_, (), _>("nothing", (), {
        let tx = tx.clone();
        move |result| tx.send(("nothing", format!("{result:?}"))).unwrap()
    });
    let (name, value) = rx.recv_timeout(Duration::from_secs(5))?;
    info!(target: "tinyrpc::demo", name, value, "call completed");

    client.call::<_, Totals, _>("change", (Pair { x: 2, y: 3 },), {
        let tx = tx.clone();
        move |result| tx.send(("change", format!("{result:?}"))).unwrap()
    });
    let (name, value) = rx.recv_timeout(Duration::from_secs(5))?;
    info!(target: "tinyrpc::demo", name, value, "call completed");

    client.stop();
    Ok(())
}
