//! Criterion benchmarks for the display protocol codec.
//!
//! Measures encoding and decoding latency for the instructions that dominate
//! a busy session: block copies, fills, frame markers and image uploads.
//!
//! Run with:
//! ```bash
//! cargo bench --package rdp-relay-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rdp_relay_core::protocol::codec::{decode_instruction, encode_instruction};
use rdp_relay_core::protocol::{CompositeMode, Instruction, LayerId};
use rdp_relay_core::{PixelBuffer, PixelFormat, Rgba};

// ── Instruction fixtures ──────────────────────────────────────────────────────

fn make_copy() -> Instruction {
    Instruction::Copy {
        src: LayerId(-12),
        src_x: 0,
        src_y: 0,
        width: 64,
        height: 64,
        mode: CompositeMode::Src,
        dst: LayerId::DEFAULT,
        dst_x: 640,
        dst_y: 480,
    }
}

fn make_cfill() -> Instruction {
    Instruction::Cfill {
        mode: CompositeMode::Src,
        layer: LayerId::DEFAULT,
        color: Rgba::opaque(0x20, 0x40, 0x80),
    }
}

fn make_sync() -> Instruction {
    Instruction::Sync {
        timestamp: 1_700_000_000_000,
    }
}

fn make_png(size: i32) -> Instruction {
    let tile = PixelBuffer::blank(size, size, PixelFormat::Argb32).expect("valid tile");
    Instruction::Png {
        mode: CompositeMode::Over,
        layer: LayerId::DEFAULT,
        x: 0,
        y: 0,
        data: tile.encode_png().expect("encodable tile"),
    }
}

fn all_fixtures() -> Vec<(&'static str, Instruction)> {
    vec![
        ("copy", make_copy()),
        ("cfill", make_cfill()),
        ("sync", make_sync()),
        ("png_64", make_png(64)),
    ]
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_instruction");

    for (name, instruction) in all_fixtures() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &instruction, |b, i| {
            b.iter(|| encode_instruction(black_box(i)))
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_instruction");

    for (name, instruction) in all_fixtures() {
        let bytes = encode_instruction(&instruction);
        group.bench_with_input(BenchmarkId::from_parameter(name), &bytes, |b, bytes| {
            b.iter(|| decode_instruction(black_box(bytes)))
        });
    }

    group.finish();
}

fn bench_png_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("png_encode");

    for size in [16, 64, 256] {
        let tile = PixelBuffer::blank(size, size, PixelFormat::Argb32).expect("valid tile");
        group.bench_with_input(BenchmarkId::from_parameter(size), &tile, |b, tile| {
            b.iter(|| black_box(tile).encode_png())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_png_encoding);
criterion_main!(benches);
