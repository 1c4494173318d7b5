//! TCP server: accept loop, handshake and per-connection session threads.
//!
//! # Connection lifecycle (for beginners)
//!
//! ```text
//! client                         relay
//!   │ select,3.rdp;                │
//!   │ ───────────────────────────► │
//!   │            args,hostname,…;  │
//!   │ ◄─────────────────────────── │
//!   │ size,…; audio,…; connect,…;  │
//!   │ ───────────────────────────► │  Session::start (parse, connect)
//!   │     name; size; png; cursor; │
//!   │ ◄─────────────────────────── │
//!   │ mouse/key/clipboard/sync ⇄ drawing instructions  (until disconnect)
//! ```
//!
//! The accept loop is async and never blocks on a session.  Each accepted
//! connection is moved onto blocking threads: one runs the input loop
//! (reading client instructions), a second one runs the update loop
//! ([`Session::run_updates`]).  Both stop when either side disconnects or
//! when the shared `running` flag is cleared.

use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{bail, Context};
use rdp_relay_core::{Instruction, StatusCode};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn};

use crate::application::runtime::RelayRuntime;
use crate::application::session::Session;
use crate::application::sink::DisplaySink;
use crate::domain::error::ReadError;
use crate::domain::settings::{ClientInfo, ARG_NAMES};
use crate::infrastructure::reader::InstructionReader;
use crate::infrastructure::socket::GuacSocket;

/// Protocol name a client must `select`.
pub const PROTOCOL_NAME: &str = "rdp";

/// How long a client may take for each handshake step.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the configured listener and serves until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(runtime: Arc<RelayRuntime>, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let addr = runtime.config().bind_addr;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind listener on {addr}"))?;
    info!("relay listening on {addr}");
    serve(listener, runtime, running).await
}

/// Accept loop over an already-bound listener.
///
/// # Errors
///
/// Currently infallible once bound; accept errors are logged and skipped.
pub async fn serve(
    listener: TcpListener,
    runtime: Arc<RelayRuntime>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Short timeout so the flag is re-checked even when nobody connects.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                info!("new display client connection from {peer}");
                let runtime = Arc::clone(&runtime);
                let running = Arc::clone(&running);
                let stream = match stream.into_std() {
                    Ok(stream) => stream,
                    Err(e) => {
                        error!("could not take over connection from {peer}: {e}");
                        continue;
                    }
                };
                tokio::task::spawn_blocking(move || {
                    match serve_connection(stream, peer, runtime, running) {
                        Ok(()) => info!("connection {peer} closed normally"),
                        Err(e) => warn!("connection {peer} closed with error: {e:#}"),
                    }
                });
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {}
        }
    }
    Ok(())
}

// ── Handshake ─────────────────────────────────────────────────────────────────

/// What the client told us before `connect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Positional connection arguments, in [`ARG_NAMES`] order.
    pub args: Vec<String>,
    pub client: ClientInfo,
}

/// Runs the pre-session handshake: `select`, our `args`, then the client's
/// optional `size` / `audio` and finally `connect`.
///
/// # Errors
///
/// Fails if the client selects another protocol (reported on `sink`), goes
/// away, or sends garbage.
pub fn handshake<R: std::io::Read>(
    reader: &mut InstructionReader<R>,
    sink: &mut dyn DisplaySink,
) -> anyhow::Result<Handshake> {
    match reader.read_instruction().context("waiting for select")? {
        Instruction::Select(protocol) if protocol == PROTOCOL_NAME => {}
        Instruction::Select(protocol) => {
            sink.send(&Instruction::Error {
                message: format!("Unsupported protocol {protocol:?}"),
                status: StatusCode::ClientBadRequest,
            })?;
            sink.flush()?;
            bail!("client selected unsupported protocol {protocol:?}");
        }
        other => bail!("expected select, got {}", other.opcode()),
    }

    sink.send(&Instruction::Args(
        ARG_NAMES.iter().map(|name| name.to_string()).collect(),
    ))?;
    sink.flush()?;

    let mut client = ClientInfo::default();
    loop {
        match reader.read_instruction().context("waiting for connect")? {
            Instruction::ClientSize { width, height } => {
                client.optimal_width = width;
                client.optimal_height = height;
            }
            Instruction::Audio(mimetypes) => client.audio_mimetypes = mimetypes,
            Instruction::Connect(args) => {
                debug!(
                    count = args.len(),
                    width = client.optimal_width,
                    height = client.optimal_height,
                    "handshake complete"
                );
                return Ok(Handshake { args, client });
            }
            other => debug!(opcode = other.opcode(), "ignoring instruction during handshake"),
        }
    }
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Serves one display client from handshake to disconnect.  Blocks.
fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    runtime: Arc<RelayRuntime>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

    let mut reader = InstructionReader::new(stream.try_clone()?);
    let mut sink = GuacSocket::new(stream.try_clone()?);
    let Handshake { args, client } =
        handshake(&mut reader, &mut sink).with_context(|| format!("handshake with {peer}"))?;

    let engine = runtime.create_engine();
    let poll = runtime.config().poll_interval;
    let session = Session::start(Arc::clone(&runtime), engine, Box::new(sink), &args, &client)
        .with_context(|| format!("starting session for {peer}"))?;
    let session = Arc::new(session);

    let span = info_span!("session", id = %session.id(), %peer);
    let _entered = span.enter();

    // Short read timeout: the input loop re-checks the shutdown flags.
    stream.set_read_timeout(Some(poll))?;

    let update_thread = {
        let session = Arc::clone(&session);
        let shutdown = stream.try_clone()?;
        let span = span.clone();
        std::thread::Builder::new()
            .name("rdp-relay-update".to_string())
            .spawn(move || {
                span.in_scope(|| {
                    if let Err(err) = session.run_updates() {
                        error!(error = %err, "update loop failed");
                    }
                    session.stop();
                    // Wakes the input loop if it is blocked in a read.
                    let _ = shutdown.shutdown(Shutdown::Read);
                });
            })
            .context("spawning update thread")?
    };

    input_loop(&session, &mut reader, &running);

    session.stop();
    if update_thread.join().is_err() {
        error!("update thread panicked");
    }
    session.close();
    let _ = stream.shutdown(Shutdown::Both);
    Ok(())
}

/// Reads client instructions until disconnect, shutdown or a fatal error.
fn input_loop(session: &Session, reader: &mut InstructionReader<TcpStream>, running: &AtomicBool) {
    while session.is_running() && running.load(Ordering::Relaxed) {
        let instruction = match reader.read_instruction() {
            Ok(instruction) => instruction,
            Err(ReadError::Io(e)) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                continue
            }
            Err(ReadError::Closed) => {
                info!("display client went away");
                break;
            }
            Err(err) => {
                warn!(error = %err, "unreadable client input, closing");
                break;
            }
        };
        match session.handle_instruction(instruction) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) if err.is_fatal() => {
                error!(error = %err, "input forwarding failed");
                break;
            }
            Err(err) => warn!(error = %err, "input event skipped"),
        }
    }
}
