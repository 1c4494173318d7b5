//! End-to-end tests over a real TCP connection.
//!
//! The relay serves on an ephemeral localhost port with the scripted engine;
//! a blocking client speaks the display protocol the way a browser client
//! would: handshake, receive the first frame, push input, disconnect.

use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use rdp_relay::domain::settings::ARG_NAMES;
use rdp_relay::infrastructure::mock::ScriptedEngineFactory;
use rdp_relay::infrastructure::reader::InstructionReader;
use rdp_relay::infrastructure::server::serve;
use rdp_relay::{EngineEvent, RelayConfig, RelayRuntime};
use rdp_relay_core::{encode_instruction, Instruction, Rect, StatusCode};
use tokio::net::TcpListener;

// ── Helpers ───────────────────────────────────────────────────────────────────

struct Client {
    writer: TcpStream,
    reader: InstructionReader<TcpStream>,
}

impl Client {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect to relay");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        Self {
            writer: stream.try_clone().unwrap(),
            reader: InstructionReader::new(stream),
        }
    }

    fn send(&mut self, instruction: Instruction) {
        self.writer
            .write_all(&encode_instruction(&instruction))
            .expect("write to relay");
    }

    fn read(&mut self) -> Instruction {
        self.reader.read_instruction().expect("instruction from relay")
    }

    /// Reads until an instruction with `opcode` arrives and returns
    /// everything read, that instruction included.
    fn read_until(&mut self, opcode: &str) -> Vec<Instruction> {
        let mut seen = Vec::new();
        loop {
            let instruction = self.read();
            let done = instruction.opcode() == opcode;
            seen.push(instruction);
            if done {
                return seen;
            }
        }
    }
}

async fn start_server(factory: Arc<ScriptedEngineFactory>) -> (SocketAddr, Arc<AtomicBool>, tokio::task::JoinHandle<anyhow::Result<()>>) {
    let config = RelayConfig {
        poll_interval: Duration::from_millis(10),
        ..RelayConfig::default()
    };
    let runtime = Arc::new(RelayRuntime::new(factory, config).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let running = Arc::new(AtomicBool::new(true));
    let server = tokio::spawn(serve(listener, runtime, Arc::clone(&running)));
    (addr, running, server)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_session_over_tcp() {
    // Arrange
    let factory = Arc::new(ScriptedEngineFactory::new());
    let (addr, running, server) = start_server(Arc::clone(&factory)).await;

    // Act
    let client = tokio::task::spawn_blocking(move || {
        let mut client = Client::connect(addr);

        client.send(Instruction::Select("rdp".into()));
        let args = client.read();

        client.send(Instruction::ClientSize {
            width: 640,
            height: 480,
        });
        let mut values = vec![String::new(); ARG_NAMES.len()];
        values[0] = "desktop.example".into();
        client.send(Instruction::Connect(values));
        let opening = client.read_until("cursor");

        factory.handles()[0].push([
            EngineEvent::OpaqueRect {
                rect: Rect::new(0, 0, 10, 10),
                color: 0xF800,
            },
            EngineEvent::EndPaint,
        ]);
        let frame = client.read_until("sync");

        client.send(Instruction::Key {
            keysym: 0x61,
            pressed: true,
        });
        client.send(Instruction::Disconnect);
        let closing = client.read_until("disconnect");

        (args, opening, frame, closing, factory)
    });
    let (args, opening, frame, closing, factory) = client.await.unwrap();
    running.store(false, Ordering::Relaxed);
    server.await.unwrap().unwrap();

    // Assert
    assert!(matches!(args, Instruction::Args(names) if names.len() == ARG_NAMES.len()));
    assert_eq!(opening[0], Instruction::Name("desktop.example".into()));
    assert!(matches!(
        opening[1],
        Instruction::Size { width: 640, height: 480, .. }
    ));
    let opcodes: Vec<&str> = frame.iter().map(Instruction::opcode).collect();
    assert!(opcodes.ends_with(&["rect", "cfill", "sync"]));
    assert_eq!(closing.last(), Some(&Instruction::Disconnect));

    let engine = &factory.handles()[0];
    assert!(engine.is_closed());
    assert_eq!(engine.scancodes().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wrong_protocol_gets_error() {
    // Arrange
    let factory = Arc::new(ScriptedEngineFactory::new());
    let (addr, running, server) = start_server(Arc::clone(&factory)).await;

    // Act
    let reply = tokio::task::spawn_blocking(move || {
        let mut client = Client::connect(addr);
        client.send(Instruction::Select("vnc".into()));
        client.read()
    })
    .await
    .unwrap();
    running.store(false, Ordering::Relaxed);
    server.await.unwrap().unwrap();

    // Assert
    assert!(matches!(
        reply,
        Instruction::Error {
            status: StatusCode::ClientBadRequest,
            ..
        }
    ));
    assert!(factory.handles().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bad_arguments_are_rejected_before_connecting() {
    // Arrange
    let factory = Arc::new(ScriptedEngineFactory::new());
    let (addr, running, server) = start_server(Arc::clone(&factory)).await;

    // Act
    let reply = tokio::task::spawn_blocking(move || {
        let mut client = Client::connect(addr);
        client.send(Instruction::Select("rdp".into()));
        let _args = client.read();
        client.send(Instruction::Connect(vec!["only-host".into()]));
        client.read()
    })
    .await
    .unwrap();
    running.store(false, Ordering::Relaxed);
    server.await.unwrap().unwrap();

    // Assert
    assert_eq!(
        reply,
        Instruction::Error {
            message: "Wrong argument count received.".into(),
            status: StatusCode::ClientBadRequest,
        }
    );
    assert!(factory.handles()[0].settings().is_none());
}
