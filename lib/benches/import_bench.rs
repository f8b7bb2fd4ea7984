use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use oxigraph::model::{Literal, NamedNode};
use quince::{DynamicFileStore, StoreConfig};
use tempdir::TempDir;

const SUBJECTS: usize = 200;
const STATEMENTS_PER_SUBJECT: usize = 5;

fn fresh_store(split_threshold: usize) -> (TempDir, DynamicFileStore) {
    let dir = TempDir::new("quince-bench").expect("tmpdir");
    let config = StoreConfig::builder()
        .root(dir.path().to_path_buf())
        .split_threshold(split_threshold)
        .build()
        .expect("config");
    let store = DynamicFileStore::open(config).expect("open");
    (dir, store)
}

fn assert_batch(store: &mut DynamicFileStore) {
    let graph = NamedNode::new("http://example.org/g").expect("iri");
    for i in 0..SUBJECTS {
        let subject = NamedNode::new(format!("http://example.org/s/{i}")).expect("iri");
        for j in 0..STATEMENTS_PER_SUBJECT {
            let predicate = NamedNode::new(format!("http://example.org/p/{j}")).expect("iri");
            let object = Literal::new_simple_literal(format!("{i}-{j}"));
            store
                .assert(
                    subject.as_ref().into(),
                    predicate.as_ref(),
                    object.as_ref().into(),
                    graph.as_ref(),
                )
                .expect("assert");
        }
    }
    store.flush().expect("flush");
}

fn import(c: &mut Criterion) {
    let mut group = c.benchmark_group("store/import");
    group.sample_size(10);
    group.throughput(Throughput::Elements((SUBJECTS * STATEMENTS_PER_SUBJECT) as u64));
    for split_threshold in [10usize, 2048] {
        group.bench_with_input(
            BenchmarkId::new("assert_and_flush", split_threshold),
            &split_threshold,
            |b, &split| {
                b.iter_batched(
                    || fresh_store(split),
                    |(_dir, mut store)| assert_batch(&mut store),
                    BatchSize::PerIteration,
                );
            },
        );
    }
    group.finish();
}

criterion_group!(benches, import);
criterion_main!(benches);
