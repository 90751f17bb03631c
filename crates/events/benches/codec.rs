use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use searchsync_core::{Product, ProductId};
use searchsync_events::ChangeEvent;

fn sample_product() -> Product {
    let now = Utc::now();
    Product {
        product_id: ProductId::new(1),
        title: "Widget".to_string(),
        long_title: "Widget, the long edition with extra words".to_string(),
        description: "A widget suitable for benchmarking the wire codec".to_string(),
        sku: "WID-001".to_string(),
        price: 9.99,
        sales: 12345,
        created_at: now,
        updated_at: now,
    }
}

fn bench_codec(c: &mut Criterion) {
    let event = ChangeEvent::created(&sample_product()).unwrap();
    let bytes = event.encode().unwrap();

    let mut group = c.benchmark_group("envelope_codec");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("encode", |b| {
        b.iter(|| black_box(&event).encode().unwrap());
    });
    group.bench_function("decode", |b| {
        b.iter(|| ChangeEvent::decode(black_box(&bytes)).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
