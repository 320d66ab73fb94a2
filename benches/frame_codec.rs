use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use voxwire::MemoryLog;
use voxwire::protocol::{
    Compression, CompressionPolicy, FrameEncoder, MessageFlags, MessageType, ProtocolHeader,
    Serialization, decode_frame, encode_frame,
};
use voxwire::response::ResponseParser;

/// Packet sizes for 100, 200 and 500 ms of 16 kHz mono 16-bit audio.
const PACKET_SIZES: [usize; 3] = [3200, 6400, 16000];

/// Deterministic pseudo-speech so gzip has something realistic to chew on.
fn audio_packet(len: usize) -> Vec<u8> {
    (0..len / 2)
        .flat_map(|i| {
            let sample = (((i as f32) * 0.07).sin() * 8000.0) as i16;
            sample.to_le_bytes()
        })
        .collect()
}

fn bench_audio_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("audio_frame");
    for size in PACKET_SIZES {
        let packet = audio_packet(size);
        group.throughput(Throughput::Bytes(size as u64));

        for (name, policy) in [
            ("plain", CompressionPolicy::none()),
            ("gzip", CompressionPolicy::default()),
        ] {
            let mut encoder = FrameEncoder::new(policy, Arc::new(MemoryLog::new()));
            group.bench_with_input(BenchmarkId::new(name, size), &packet, |b, packet| {
                b.iter(|| {
                    encoder.reset_sequence();
                    black_box(encoder.audio_frame(black_box(packet), false))
                })
            });
        }
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_frame");
    for size in PACKET_SIZES {
        let header = ProtocolHeader::new(
            MessageType::AudioOnlyRequest,
            MessageFlags::PositiveSequence,
            Serialization::None,
            Compression::None,
        );
        let bytes = encode_frame(&header, Some(42), &audio_packet(size));
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| black_box(decode_frame(black_box(bytes))))
        });
    }
    group.finish();
}

fn bench_parse_response(c: &mut Criterion) {
    let parser = ResponseParser::default();
    let payload = br#"{"audio_info":{"duration":3200},"result":{"text":"the quick brown fox jumps over the lazy dog","utterances":[{"text":"the quick brown fox jumps over the lazy dog","definite":true,"start_time":0,"end_time":3200}]}}"#;
    let header = ProtocolHeader::new(
        MessageType::FullServerResponse,
        MessageFlags::PositiveSequence,
        Serialization::Json,
        Compression::None,
    );
    let bytes = encode_frame(&header, Some(7), payload);

    c.bench_function("parse_server_frame", |b| {
        b.iter(|| {
            let frame = decode_frame(black_box(&bytes)).ok()?;
            parser.parse_frame(frame).ok()
        })
    });
}

criterion_group!(benches, bench_audio_frames, bench_decode, bench_parse_response);
criterion_main!(benches);
