use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use piggykv::{Key, KvClient, KvDevice, TransferConfig};

fn benchmark_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("put");
    // One size per transfer mode: piggyback-only, padded page, combined.
    for size in [64usize, 200, 8392] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let client =
                KvClient::new(KvDevice::in_memory(), TransferConfig::default()).unwrap();
            let value = vec![0xA5u8; size];
            let mut key = 0u32;
            b.iter(|| {
                client.put(Key::from(key), &value).unwrap();
                key = key.wrapping_add(1);
            });
        });
    }
    group.finish();
}

fn benchmark_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    for size in [64usize, 8392] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let client =
                KvClient::new(KvDevice::in_memory(), TransferConfig::default()).unwrap();
            client.put(Key::from(1), &vec![0x5Au8; size]).unwrap();
            b.iter(|| client.get(Key::from(1)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_put, benchmark_get);
criterion_main!(benches);
