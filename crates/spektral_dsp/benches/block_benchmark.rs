//! Performance benchmarks for the block processor
//!
//! Run with: cargo bench -p spektral_dsp

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use spektral_dsp::{gain_store, BandLayout, BlockProcessor, SpectralTransform};

fn build(block_size: usize, bands: usize) -> (BlockProcessor, spektral_dsp::GainWriter) {
    let layout = Arc::new(BandLayout::linear(block_size, bands).unwrap());
    let (writer, reader) = gain_store(bands, None).unwrap();
    let transform = SpectralTransform::prepare(block_size).unwrap();
    (BlockProcessor::new(transform, layout, reader).unwrap(), writer)
}

fn benchmark_block_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_processor");

    // Power-of-two analysis blocks
    let block_sizes = [256, 512, 1024, 2048, 4096];

    for size in block_sizes {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("process_block_{}", size), |b| {
            let (mut eq, _writer) = build(size, 10);
            let mut buffer: Vec<f32> = (0..size).map(|i| (i as f32 * 0.001).sin()).collect();

            b.iter(|| {
                eq.process_block(black_box(&mut buffer));
            });
        });

        group.bench_function(format!("process_interleaved_stereo_{}", size), |b| {
            let (mut eq, _writer) = build(size, 10);
            let mut buffer: Vec<f32> = (0..size * 2).map(|i| (i as f32 * 0.001).sin()).collect();

            b.iter(|| {
                eq.process_interleaved(black_box(&mut buffer), 2);
            });
        });
    }

    group.finish();
}

fn benchmark_gain_update(c: &mut Criterion) {
    c.bench_function("gain_set_and_snapshot", |b| {
        let (mut eq, mut writer) = build(1024, 10);
        let mut buffer = vec![0.0_f32; 1024];
        let mut band = 0;
        let mut gain = 0.0_f32;

        b.iter(|| {
            // Simulate dragging a slider while audio runs
            writer.set(band, gain).unwrap();
            eq.process_block(black_box(&mut buffer));
            band = (band + 1) % 10;
            gain = (gain + 0.5) % 10.0;
        });
    });
}

criterion_group!(benches, benchmark_block_processing, benchmark_gain_update);

criterion_main!(benches);
