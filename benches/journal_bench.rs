use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tempfile::tempdir;

use statedoc::{DocumentConfig, JournaledDocument, Value};

fn add_command_throughput(c: &mut Criterion) {
    c.bench_function("add_command, no snapshot pressure", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let config = DocumentConfig::new(dir.path().join("doc"), "bench", 1, 1 << 20, 1 << 19);
                let doc = JournaledDocument::new(config, Value::empty_map()).unwrap();
                (dir, doc)
            },
            |(_dir, doc)| {
                for i in 0..100 {
                    doc.add_command(format!("k{}", i), Some(Value::Int(i)))
                        .unwrap();
                }
            },
            BatchSize::SmallInput,
        )
    });
}

fn snapshot_cost(c: &mut Criterion) {
    c.bench_function("snapshot of a 100-key document", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let config = DocumentConfig::new(dir.path().join("doc"), "bench", 1, 1 << 20, 1 << 19);
                let doc = JournaledDocument::new(config, Value::empty_map()).unwrap();
                for i in 0..100 {
                    doc.add_command(format!("k{}", i), Some(Value::Int(i)))
                        .unwrap();
                }
                (dir, doc)
            },
            |(_dir, doc)| {
                doc.snapshot().unwrap();
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, add_command_throughput, snapshot_cost);
criterion_main!(benches);
