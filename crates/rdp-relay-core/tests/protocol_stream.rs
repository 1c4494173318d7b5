//! Integration tests for the rdp-relay-core display protocol codec.
//!
//! These tests drive the public API the way the relay uses it: a byte stream
//! arriving in arbitrary chunks is decoded instruction by instruction, and a
//! frame of drawing instructions is encoded and read back.

use rdp_relay_core::{
    decode_instruction, encode_instruction,
    protocol::{CompositeMode, Instruction, LayerId, LayerPool, StatusCode},
    ImageGeometry, PixelBuffer, PixelFormat, ProtocolError, Rect, Rgba,
};

/// Encodes an instruction and then decodes it, asserting that every byte was
/// consumed.
fn roundtrip(instruction: Instruction) -> Instruction {
    let bytes = encode_instruction(&instruction);
    let (decoded, consumed) = decode_instruction(&bytes).expect("decode must succeed");
    assert_eq!(consumed, bytes.len(), "all bytes must be consumed");
    decoded
}

/// Feeds `stream` to the decoder in chunks of `chunk` bytes, the way a
/// socket reader sees it, and returns every decoded instruction.
fn decode_chunked(stream: &[u8], chunk: usize) -> Vec<Instruction> {
    let mut buffer = Vec::new();
    let mut out = Vec::new();
    for piece in stream.chunks(chunk) {
        buffer.extend_from_slice(piece);
        loop {
            match decode_instruction(&buffer) {
                Ok((instruction, consumed)) => {
                    out.push(instruction);
                    buffer.drain(..consumed);
                }
                Err(ProtocolError::InsufficientData { .. }) => break,
                Err(e) => panic!("unexpected decode error: {e}"),
            }
        }
    }
    assert!(buffer.is_empty(), "trailing bytes left undecoded");
    out
}

#[test]
fn test_client_handshake_decodes_in_any_chunking() {
    // Arrange – what a display client sends before a session starts
    let handshake = [
        Instruction::Select("rdp".into()),
        Instruction::ClientSize {
            width: 1280,
            height: 800,
        },
        Instruction::Audio(vec!["audio/ogg".into(), "audio/wav".into()]),
        Instruction::Connect(vec![
            "desktop.example".into(),
            "".into(),
            "CORP".into(),
            "jdoe".into(),
            "s3cr€t".into(),
        ]),
    ];
    let stream: Vec<u8> = handshake.iter().flat_map(encode_instruction).collect();

    for chunk in [1, 2, 3, 7, 64, stream.len()] {
        // Act
        let decoded = decode_chunked(&stream, chunk);

        // Assert
        assert_eq!(decoded, handshake, "chunk size {chunk}");
    }
}

#[test]
fn test_frame_of_drawing_instructions_survives_the_wire() {
    // Arrange – a buffer upload, a copy out of it, a fill and a frame marker
    let mut pool = LayerPool::new();
    let buffer = pool.allocate();
    let image = PixelBuffer::blank(4, 4, PixelFormat::Argb32).unwrap();
    let frame = vec![
        Instruction::Size {
            layer: buffer,
            width: 4,
            height: 4,
        },
        Instruction::Png {
            mode: CompositeMode::Src,
            layer: buffer,
            x: 0,
            y: 0,
            data: image.encode_png().unwrap(),
        },
        Instruction::Copy {
            src: buffer,
            src_x: 0,
            src_y: 0,
            width: 4,
            height: 4,
            mode: CompositeMode::Over,
            dst: LayerId::DEFAULT,
            dst_x: 100,
            dst_y: 50,
        },
        Instruction::Rect {
            layer: LayerId::DEFAULT,
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        },
        Instruction::Cfill {
            mode: CompositeMode::Src,
            layer: LayerId::DEFAULT,
            color: Rgba::opaque(1, 2, 3),
        },
        Instruction::Sync {
            timestamp: 1_700_000_000_000,
        },
    ];

    // Act
    let decoded: Vec<Instruction> = frame.iter().cloned().map(roundtrip).collect();

    // Assert
    assert_eq!(decoded, frame);
}

#[test]
fn test_cursor_and_error_instructions_roundtrip() {
    let cursor = Instruction::Cursor {
        hotspot_x: 3,
        hotspot_y: 4,
        src: LayerId(-7),
        src_x: 0,
        src_y: 0,
        width: 32,
        height: 32,
    };
    let error = Instruction::Error {
        message: "Wrong argument count received.".into(),
        status: StatusCode::ClientBadRequest,
    };

    assert_eq!(roundtrip(cursor.clone()), cursor);
    assert_eq!(roundtrip(error.clone()), error);
}

#[test]
fn test_png_payload_decodes_to_original_pixels_region() {
    // Arrange – a 2×1 image, encode only its right pixel
    let buffer = PixelBuffer::new(
        vec![0, 0, 0xFF, 0xFF, 0xFF, 0, 0, 0xFF],
        ImageGeometry::packed(2, 1, PixelFormat::Argb32),
    )
    .unwrap();

    // Act
    let png = buffer.encode_png_region(Rect::new(1, 0, 1, 1)).unwrap();
    let decoded = roundtrip(Instruction::Png {
        mode: CompositeMode::Over,
        layer: LayerId::DEFAULT,
        x: 1,
        y: 0,
        data: png.clone(),
    });

    // Assert
    match decoded {
        Instruction::Png { data, .. } => assert_eq!(data, png),
        other => panic!("expected png, got {other:?}"),
    }
}
