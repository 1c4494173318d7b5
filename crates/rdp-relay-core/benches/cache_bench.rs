//! Criterion benchmarks for the cache-slot store.
//!
//! A remote desktop server churns through bitmap slots constantly; these
//! benches cover the allocate → populate → get cycle and eviction.
//!
//! Run with:
//! ```bash
//! cargo bench --package rdp-relay-core --bench cache_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rdp_relay_core::{ImageGeometry, PixelFormat, SlotStore};

const TILE: i32 = 64;

fn tile_data() -> Vec<u8> {
    vec![0x7F; (TILE * TILE * 4) as usize]
}

fn bench_populate_cycle(c: &mut Criterion) {
    let geometry = ImageGeometry::packed(TILE, TILE, PixelFormat::Argb32);
    let mut store: SlotStore<u32> = SlotStore::new("bitmap", 4096);
    let mut index = 0u32;

    c.bench_function("slot_allocate_populate_64px", |b| {
        b.iter(|| {
            index = (index + 1) % 4096;
            store.allocate(index).ok();
            store.populate(index, tile_data(), geometry).ok();
        })
    });
}

fn bench_lookup(c: &mut Criterion) {
    let geometry = ImageGeometry::packed(TILE, TILE, PixelFormat::Argb32);
    let mut store: SlotStore<u32> = SlotStore::new("bitmap", 4096);
    for index in 0..1024 {
        store.allocate(index).ok();
        store.populate(index, tile_data(), geometry).ok();
    }

    c.bench_function("slot_get_hit", |b| {
        b.iter(|| store.get(black_box(512)).is_ok())
    });
    c.bench_function("slot_get_miss", |b| {
        b.iter(|| store.get(black_box(2048)).is_ok())
    });
}

criterion_group!(benches, bench_populate_cycle, bench_lookup);
criterion_main!(benches);
