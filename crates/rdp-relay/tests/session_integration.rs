//! Integration tests for the session bridge.
//!
//! These drive a full [`Session`] through its public API with the scripted
//! engine and in-memory sinks from `infrastructure::mock`: updates are
//! pushed as a remote server would push them, and the resulting instruction
//! stream is inspected the way a display client would see it.

use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rdp_relay::application::pointer::{PointerState, DEFAULT_POINTER_HEIGHT, DEFAULT_POINTER_WIDTH};
use rdp_relay::domain::settings::{ClientInfo, ARG_NAMES, RDP_DEFAULT_HEIGHT, RDP_DEFAULT_PORT, RDP_DEFAULT_WIDTH};
use rdp_relay::infrastructure::mock::{RecordingSink, ScriptedEngineFactory, ScriptedEngineHandle};
use rdp_relay::infrastructure::socket::GuacSocket;
use rdp_relay::{DisplaySink, EngineEvent, ImagePayload, RelayConfig, RelayError, RelayRuntime, Session};
use rdp_relay_core::{decode_instruction, ImageGeometry, Instruction, LayerId, PixelFormat, Rect};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn args(hostname: &str) -> Vec<String> {
    let mut args = vec![String::new(); ARG_NAMES.len()];
    args[0] = hostname.to_string();
    args
}

fn client(width: i32, height: i32) -> ClientInfo {
    ClientInfo {
        optimal_width: width,
        optimal_height: height,
        audio_mimetypes: Vec::new(),
    }
}

fn fast_config() -> RelayConfig {
    RelayConfig {
        poll_interval: Duration::from_millis(10),
        ..RelayConfig::default()
    }
}

/// Starts a session on a fresh scripted engine.
fn start(
    sink: Box<dyn DisplaySink>,
    args: &[String],
    client: &ClientInfo,
) -> (Arc<Session>, ScriptedEngineHandle) {
    let factory = Arc::new(ScriptedEngineFactory::new());
    let runtime = Arc::new(RelayRuntime::new(factory.clone(), fast_config()).unwrap());
    let engine = runtime.create_engine();
    let handle = factory.handles().pop().expect("engine was created");
    let session = Session::start(runtime, engine, sink, args, client).unwrap();
    (Arc::new(session), handle)
}

fn cursor_image(size: i32) -> ImagePayload {
    ImagePayload::new(
        vec![0xFF; (size * size * 4) as usize],
        ImageGeometry::packed(size, size, PixelFormat::Argb32),
    )
}

/// Width and height of every `cursor` instruction, in order.
fn cursor_sizes(instructions: &[Instruction]) -> Vec<(i32, i32)> {
    instructions
        .iter()
        .filter_map(|i| match i {
            Instruction::Cursor { width, height, .. } => Some((*width, *height)),
            _ => None,
        })
        .collect()
}

/// Byte sink shared between the session and the test.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn test_cursor_sequence_custom_hidden_default() {
    // Arrange
    let sink = RecordingSink::new();
    let (session, engine) = start(Box::new(sink.clone()), &args("host"), &client(800, 600));
    sink.clear();

    // Act
    engine.push([
        EngineEvent::CursorNew {
            index: 1,
            image: cursor_image(8),
            hotspot_x: 1,
            hotspot_y: 1,
        },
        EngineEvent::CursorSet { index: 1 },
        EngineEvent::CursorSetNull,
        EngineEvent::CursorSetDefault,
    ]);
    session.handle_messages().unwrap();

    // Assert
    assert_eq!(
        cursor_sizes(&sink.instructions()),
        vec![(8, 8), (0, 0), (DEFAULT_POINTER_WIDTH, DEFAULT_POINTER_HEIGHT)]
    );
    assert_eq!(session.with_update(|ctx| ctx.pointer()), PointerState::Default);
    assert_eq!(sink.flushed_instructions(), sink.instructions());
}

#[test]
fn test_freeing_active_cursor_reverts_to_default() {
    // Arrange
    let sink = RecordingSink::new();
    let (session, engine) = start(Box::new(sink.clone()), &args("host"), &client(800, 600));
    engine.push([
        EngineEvent::CursorNew {
            index: 3,
            image: cursor_image(4),
            hotspot_x: 0,
            hotspot_y: 0,
        },
        EngineEvent::CursorSet { index: 3 },
    ]);
    session.handle_messages().unwrap();
    sink.clear();

    // Act
    engine.push([EngineEvent::CursorFree { index: 3 }]);
    session.handle_messages().unwrap();

    // Assert
    assert_eq!(session.with_update(|ctx| ctx.pointer()), PointerState::Default);
    assert_eq!(
        cursor_sizes(&sink.instructions()),
        vec![(DEFAULT_POINTER_WIDTH, DEFAULT_POINTER_HEIGHT)]
    );
}

#[test]
fn test_orders_then_end_paint_flush_once() {
    // Arrange
    let sink = RecordingSink::new();
    let (session, engine) = start(Box::new(sink.clone()), &args("host"), &client(800, 600));
    sink.clear();
    let orders = (0..5).map(|i| EngineEvent::OpaqueRect {
        rect: Rect::new(i * 10, 0, 10, 10),
        color: 0xFFFF,
    });

    // Act: the orders alone stay buffered
    engine.push(orders);
    session.handle_messages().unwrap();
    let flushed_before_end_paint = sink.flushed_instructions().len();
    engine.push([EngineEvent::EndPaint]);
    session.handle_messages().unwrap();

    // Assert
    assert_eq!(flushed_before_end_paint, 0);
    let sent = sink.flushed_instructions();
    assert_eq!(sent.len(), 5 * 2 + 1);
    assert!(matches!(sent.last(), Some(Instruction::Sync { .. })));
    assert_eq!(sink.flush_count(), 1);
}

#[test]
fn test_unknown_slot_skips_only_that_order() {
    // Arrange
    let sink = RecordingSink::new();
    let (session, engine) = start(Box::new(sink.clone()), &args("host"), &client(800, 600));
    sink.clear();

    // Act
    engine.push([
        EngineEvent::MemBlt {
            index: 42,
            rect: Rect::new(0, 0, 8, 8),
            src_x: 0,
            src_y: 0,
            rop: 0xCC,
        },
        EngineEvent::CursorSet { index: 9 },
        EngineEvent::EndPaint,
    ]);
    let result = session.handle_messages();

    // Assert
    assert!(result.is_ok());
    let opcodes: Vec<&str> = sink.instructions().iter().map(Instruction::opcode).collect();
    assert_eq!(opcodes, vec!["sync"]);
    assert!(session.is_running());
}

#[test]
fn test_bitmap_first_use_inline_then_promoted_to_layer() {
    // Arrange
    let sink = RecordingSink::new();
    let (session, engine) = start(Box::new(sink.clone()), &args("host"), &client(800, 600));
    let tile = ImagePayload::new(
        vec![0x80; 16 * 16 * 4],
        ImageGeometry::packed(16, 16, PixelFormat::Rgb24),
    );
    let blit = |x| EngineEvent::MemBlt {
        index: 7,
        rect: Rect::new(x, 0, 16, 16),
        src_x: 0,
        src_y: 0,
        rop: 0xCC,
    };
    sink.clear();

    // Act
    engine.push([
        EngineEvent::BitmapNew {
            index: 7,
            image: tile,
            offscreen: false,
        },
        blit(0),
        blit(16),
        EngineEvent::EndPaint,
    ]);
    session.handle_messages().unwrap();

    // Assert: first use draws directly, second copies from a buffer layer
    let sent = sink.instructions();
    assert!(matches!(sent[0], Instruction::Png { layer: LayerId::DEFAULT, .. }));
    assert!(sent.iter().any(|i| matches!(
        i,
        Instruction::Copy { src, dst: LayerId::DEFAULT, dst_x: 16, .. } if src.is_buffer()
    )));
}

#[test]
fn test_missing_dimensions_default_and_port_defaults() {
    // Arrange
    let sink = RecordingSink::new();

    // Act
    let (session, engine) = start(Box::new(sink.clone()), &args("host"), &client(0, 0));

    // Assert
    let settings = engine.settings().expect("engine connected");
    assert_eq!(settings.port, RDP_DEFAULT_PORT);
    assert_eq!((settings.width, settings.height), (RDP_DEFAULT_WIDTH, RDP_DEFAULT_HEIGHT));
    assert_eq!(session.settings().window_title, "host");
    assert_eq!(
        sink.instructions()[1],
        Instruction::Size {
            layer: LayerId::DEFAULT,
            width: RDP_DEFAULT_WIDTH,
            height: RDP_DEFAULT_HEIGHT,
        }
    );
}

#[test]
fn test_refused_connection_reports_upstream_error() {
    // Arrange
    let factory = Arc::new(ScriptedEngineFactory::new());
    let runtime = Arc::new(RelayRuntime::new(factory.clone(), fast_config()).unwrap());
    let engine = runtime.create_engine();
    factory.handles()[0].fail_connect("refused");
    let sink = RecordingSink::new();

    // Act
    let result = Session::start(runtime, engine, Box::new(sink.clone()), &args("host"), &client(1, 1));

    // Assert
    assert!(matches!(result, Err(RelayError::ConnectionFailure(_))));
    assert!(matches!(
        &sink.flushed_instructions()[..],
        [Instruction::Error { message, .. }] if message == "Error connecting to RDP server"
    ));
}

#[test]
fn test_key_press_is_forwarded_as_scancode() {
    let (session, engine) = start(Box::new(RecordingSink::new()), &args("host"), &client(800, 600));

    session.handle_instruction(Instruction::Key { keysym: 0x61, pressed: true }).unwrap();
    session.handle_instruction(Instruction::Key { keysym: 0x61, pressed: false }).unwrap();

    let scancodes: Vec<u8> = engine.scancodes().iter().map(|(_, code)| *code).collect();
    assert_eq!(scancodes, vec![0x1E, 0x1E]);
}

#[test]
fn test_concurrent_updates_and_input_never_split_instructions() {
    // Arrange
    let buffer = SharedBuffer::default();
    let socket = GuacSocket::new(buffer.clone());
    let (session, engine) = start(Box::new(socket), &args("host"), &client(640, 480));

    let updater = {
        let session = Arc::clone(&session);
        thread::spawn(move || session.run_updates())
    };
    let pusher = {
        let engine = engine.clone();
        thread::spawn(move || {
            for i in 0..200 {
                engine.push([
                    EngineEvent::OpaqueRect {
                        rect: Rect::new(i % 600, 0, 4, 4),
                        color: 0x07E0,
                    },
                    EngineEvent::EndPaint,
                ]);
            }
        })
    };

    // Act: the input thread echoes pointer positions meanwhile
    for i in 0..200 {
        session
            .handle_instruction(Instruction::Mouse { x: i, y: i, mask: 0 })
            .unwrap();
    }
    pusher.join().unwrap();
    while engine.pending() > 0 {
        thread::sleep(Duration::from_millis(5));
    }
    session.stop();
    updater.join().unwrap().unwrap();
    session.close();

    // Assert: the whole stream decodes cleanly, instruction by instruction
    let bytes = buffer.0.lock().clone();
    let mut offset = 0;
    let mut mice = 0;
    let mut syncs = 0;
    while offset < bytes.len() {
        let (instruction, consumed) =
            decode_instruction(&bytes[offset..]).expect("stream must hold whole instructions");
        match instruction {
            Instruction::Mouse { .. } => mice += 1,
            Instruction::Sync { .. } => syncs += 1,
            _ => {}
        }
        offset += consumed;
    }
    assert_eq!(mice, 200);
    assert_eq!(syncs, 200);
    assert!(engine.is_closed());
}
