//! Benchmarks for decoding and grouping perfdata responses.
//!
//! Bodies are generated in memory, so no InfluxDB instance is needed.
//!
//! Run benchmarks: `cargo bench`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use futures::StreamExt;
use perfdata_influxdb::{decode, transform};
use rand::Rng;
use std::time::Duration;
use tokio::runtime::Runtime;

const METRICS: [&str; 4] = ["rta", "pl", "rtmax", "rtmin"];
const NO_PATTERNS: &[&str] = &[];

/// Generate a value query body with one table per metric
fn generate_body(rows_per_metric: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let base_ts = 1700000000i64;
    let mut body = String::with_capacity(rows_per_metric * METRICS.len() * 48);

    for metric in METRICS {
        body.push_str("name,tags,time,value,warn,crit,unit\n");
        for i in 0..rows_per_metric {
            let value: f64 = rng.gen_range(0.0..1.0);
            let thresholds = if i % 2 == 0 { "0.1,0.5" } else { "," };
            body.push_str(&format!(
                "ping4,metric={},{},{:.6},{},s\n",
                metric,
                base_ts + i as i64 * 60,
                value,
                thresholds
            ));
        }
        body.push('\n');
    }

    body.into_bytes()
}

/// Benchmark record decoding alone
fn bench_decode(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let sizes = [1_000, 10_000, 50_000];

    let mut group = c.benchmark_group("decode");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));

    for size in sizes {
        let body = generate_body(size);
        group.throughput(Throughput::Elements((size * METRICS.len()) as u64));

        group.bench_with_input(BenchmarkId::new("records", size), &body, |b, body| {
            b.to_async(&rt).iter(|| async {
                let mut stream = decode(std::io::Cursor::new(body.clone()), true);
                let mut count = 0;
                while let Some(result) = stream.next().await {
                    result.unwrap();
                    count += 1;
                }
                count
            });
        });
    }

    group.finish();
}

/// Benchmark decoding plus grouping into datasets
fn bench_transform(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let body = generate_body(50_000);

    let mut group = c.benchmark_group("transform");
    group.sample_size(10);
    group.throughput(Throughput::Elements((50_000 * METRICS.len()) as u64));

    group.bench_function("200k_records", |b| {
        b.to_async(&rt).iter(|| async {
            let records = decode(std::io::Cursor::new(body.clone()), true);
            let response = transform(records, NO_PATTERNS, NO_PATTERNS).await.unwrap();
            response.len()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_transform);

criterion_main!(benches);
