use criterion::{BatchSize, BenchmarkId, Criterion, Throughput};
use libiot_mqtt::network::application::mqtt::{Decoder, QoS, codec};
use std::hint::black_box;

const PAYLOAD_SIZES: [usize; 3] = [16, 1024, 64 * 1024];

pub fn bench_encode_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_publish");
    for size in PAYLOAD_SIZES {
        let payload = vec![0xA5; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| {
                codec::encode_publish(
                    QoS::AtLeastOnce,
                    false,
                    false,
                    black_box(42),
                    "libiot/bench-topic",
                    black_box(payload),
                )
                .expect("encodable")
            });
        });
    }
    group.finish();
}

pub fn bench_decode_chunked(c: &mut Criterion) {
    let frame = codec::encode_publish(
        QoS::AtLeastOnce,
        false,
        false,
        42,
        "libiot/bench-topic",
        &[0xA5; 1024],
    )
    .expect("encodable");
    let stream: Vec<u8> = frame.iter().copied().cycle().take(frame.len() * 64).collect();

    let mut group = c.benchmark_group("decode_chunked");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    for chunk in [1usize, 64, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            b.iter_batched_ref(
                Decoder::new,
                |decoder| {
                    let mut frames = 0;
                    for piece in stream.chunks(chunk) {
                        for result in decoder.feed(piece) {
                            result.expect("valid stream");
                            frames += 1;
                        }
                    }
                    assert_eq!(frames, 64);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}
