use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mask_vault::{AeadCipher, SymmetricCipher, SymmetricKey};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

fn bench_ciphers(c: &mut Criterion) {
    let key = SymmetricKey::generate();

    for cipher in [AeadCipher::XChaCha20Poly1305, AeadCipher::Aes256Gcm] {
        let sc = SymmetricCipher::new(cipher);
        let mut group = c.benchmark_group(cipher.name());

        for size in [1024usize, 65536, 1048576] {
            let data = make_data(size);
            let frame = sc.encrypt(&data, &key).unwrap();
            group.throughput(Throughput::Bytes(size as u64));

            group.bench_with_input(BenchmarkId::new("encrypt", size), &data, |b, data| {
                b.iter(|| sc.encrypt(black_box(data), black_box(&key)).unwrap())
            });
            group.bench_with_input(BenchmarkId::new("decrypt", size), &frame, |b, frame| {
                b.iter(|| sc.decrypt(black_box(frame), black_box(&key)).unwrap())
            });
        }
        group.finish();
    }
}

criterion_group!(benches, bench_ciphers);
criterion_main!(benches);
