//! Criterion benchmarks for index matching and blocking.

use std::sync::atomic::AtomicBool;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use canonize::index::Index;
use canonize::model::{Corpus, MemoryCorpus, Record};

fn synthetic_corpus(size: usize) -> MemoryCorpus {
    let first = ["John", "Jon", "Jane", "Maria", "Ivan", "Chen", "Fatima", "Olga"];
    let last = ["Doe", "Roe", "Santos", "Petrov", "Wei", "Haddad", "Smith", "Ivanova"];
    let records = (0..size).map(|i| {
        Record::new(format!("p{i}"), "Person")
            .with(
                "name",
                format!("{} {}", first[i % first.len()], last[(i / 3) % last.len()]),
            )
            .with("birthDate", format!("19{:02}-01-01", 50 + (i % 40)))
    });
    MemoryCorpus::from_records(records).unwrap()
}

fn bench_match(c: &mut Criterion) {
    let corpus = synthetic_corpus(1000);
    let cancel = AtomicBool::new(false);
    let mut index = Index::new(false);
    index.build(&corpus, &cancel);
    index.commit();
    let query = corpus.get("p0").unwrap();

    c.bench_function("match_entity_1k", |b| {
        b.iter(|| black_box(index.match_entity(&corpus, query, 30)))
    });
}

fn bench_pairs(c: &mut Criterion) {
    let corpus = synthetic_corpus(500);
    let cancel = AtomicBool::new(false);
    let mut index = Index::new(false);
    index.build(&corpus, &cancel);
    index.commit();

    c.bench_function("pairs_500", |b| {
        b.iter(|| black_box(index.pairs(100, &cancel)))
    });
}

criterion_group!(benches, bench_match, bench_pairs);
criterion_main!(benches);
