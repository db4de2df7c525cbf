use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use strata_core::{
    codec::{encode_bytes, StripeEncoder},
    decoder::decode_frame_from_bytes,
    encoder::encode_frame,
    reconstruct::decode,
    types::{CodecParams, Frame, FrameHeader},
    unpack, ArchiveStream, Entry,
};

fn archive(size: usize) -> Vec<u8> {
    let content: Vec<u8> = (0..size).map(|i| (i * 7 % 251) as u8).collect();
    let stream = ArchiveStream::new(vec![
        Entry::directory("bench", 0o755),
        Entry::file("bench/data.bin", 0o644, content),
    ]);
    unpack(&stream).unwrap()
}

fn bench_frame_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");

    for size in [256usize, 1024, 4096, 16384] {
        let encoder = StripeEncoder::new(archive(size), CodecParams::new(4, 2, size)).unwrap();
        let layout = *encoder.layout();
        let payload = Bytes::from(encoder.data_block(0));

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("seal_encode", size), &payload, |b, p| {
            b.iter(|| {
                let frame = Frame::seal(FrameHeader::new(&layout, 0, 0, 0), p.clone());
                encode_frame(black_box(&frame)).unwrap()
            });
        });

        let encoded = encode_frame(&encoder.encode_stripe(0).unwrap()[0]).unwrap();
        group.bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, data| {
            b.iter(|| decode_frame_from_bytes(black_box(data)).unwrap());
        });
    }

    group.finish();
}

fn bench_archive(c: &mut Criterion) {
    let mut group = c.benchmark_group("archive");
    let params = CodecParams::default();

    for size in [64 * 1024usize, 1024 * 1024] {
        let tar = archive(size);
        group.throughput(Throughput::Bytes(tar.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), &tar, |b, tar| {
            b.iter(|| encode_bytes(tar.clone(), &params).unwrap());
        });

        let frames = encode_bytes(tar.clone(), &params).unwrap();
        let width = params.width();
        // lose the first parity-worth of every stripe
        let damaged: Vec<Frame> = frames
            .iter()
            .enumerate()
            .filter(|(i, _)| i % width >= params.parity_shards)
            .map(|(_, f)| f.clone())
            .collect();

        group.bench_with_input(BenchmarkId::new("decode_intact", size), &frames, |b, f| {
            b.iter(|| decode(f.clone()).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("decode_damaged", size), &damaged, |b, f| {
            b.iter(|| decode(f.clone()).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_frame_codec, bench_archive);
criterion_main!(benches);
