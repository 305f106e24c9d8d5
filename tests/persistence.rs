//! Persistence round trips: resolver edge logs and index snapshots.

use std::sync::atomic::AtomicBool;

use canonize::error::CanonError;
use canonize::index::Index;
use canonize::judgement::Judgement;
use canonize::model::{Corpus, MemoryCorpus, Record};
use canonize::resolver::Resolver;

fn corpus() -> MemoryCorpus {
    MemoryCorpus::from_records([
        Record::new("A", "Person").with("name", "John Doe"),
        Record::new("B", "Person").with("name", "Jon Doe"),
        Record::new("C", "Person").with("name", "Jane Roe"),
    ])
    .unwrap()
}

#[test]
fn resolver_log_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("resolver.log");

    let mut resolver = Resolver::new();
    let canonical = resolver
        .decide("A", "B", Judgement::Positive, Some("reviewer"), None)
        .unwrap();
    resolver
        .decide("A", "X", Judgement::Negative, None, None)
        .unwrap();
    resolver.suggest("C", "D", 0.42, None).unwrap();
    resolver.save(&path).unwrap();

    let restored = Resolver::load(&path).unwrap();
    assert_eq!(restored.len(), resolver.len());
    assert_eq!(restored.get_canonical("A"), canonical.id);
    assert_eq!(restored.get_canonical("B"), canonical.id);
    assert_eq!(restored.get_judgement("A", "X"), Judgement::Negative);
    let edge = restored.get_edge("C", "D").unwrap().unwrap();
    assert_eq!(edge.judgement, Judgement::NoJudgement);
    assert_eq!(edge.score, Some(0.42));

    // Saving the restored state reproduces the file byte for byte: the log
    // is sorted by pair ordering, so round trips are deterministic.
    let second = dir.path().join("resolver2.log");
    restored.save(&second).unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        std::fs::read_to_string(&second).unwrap(),
    );
}

#[test]
fn merge_is_last_write_wins() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("resolver.log");
    std::fs::write(
        &path,
        concat!(
            "[\"a\",\"b\",\"no_judgement\",0.5,null,null]\n",
            "[\"a\",\"b\",\"negative\",null,\"reviewer\",\"2024-01-01T00:00:00Z\"]\n",
        ),
    )
    .unwrap();
    let resolver = Resolver::load(&path).unwrap();
    assert_eq!(resolver.len(), 1);
    let edge = resolver.get_edge("a", "b").unwrap().unwrap();
    assert_eq!(edge.judgement, Judgement::Negative);
    assert_eq!(edge.score, None);
}

#[test]
fn corrupt_log_fails_loudly() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("resolver.log");
    std::fs::write(
        &path,
        "[\"a\",\"b\",\"positive\",null,null,null]\nthis is not json\n",
    )
    .unwrap();
    let err = Resolver::load(&path).unwrap_err();
    match err {
        CanonError::Resolver(canonize::error::ResolverError::CorruptLog { line, .. }) => {
            assert_eq!(line, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn missing_log_is_an_io_error() {
    let err = Resolver::load(std::path::Path::new("/nonexistent/resolver.log")).unwrap_err();
    assert!(matches!(
        err,
        CanonError::Resolver(canonize::error::ResolverError::Io { .. })
    ));
}

#[test]
fn index_snapshot_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("index.bin");
    let corpus = corpus();
    let cancel = AtomicBool::new(false);

    let mut index = Index::new(false);
    index.build(&corpus, &cancel);
    index.commit();
    index.save(&path).unwrap();

    let restored = Index::restore(&path).unwrap();
    assert_eq!(restored.entity_count(), index.entity_count());
    assert_eq!(restored.token_count(), index.token_count());

    let query = corpus.get("A").unwrap();
    assert_eq!(
        restored.match_entity(&corpus, query, 10),
        index.match_entity(&corpus, query, 10),
    );
}

#[test]
fn missing_snapshot_triggers_rebuild_and_save() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("index.bin");
    let corpus = corpus();
    let cancel = AtomicBool::new(false);

    assert!(!path.exists());
    let index = Index::load_or_build(&path, &corpus, false, &cancel).unwrap();
    assert!(path.exists());
    assert_eq!(index.entity_count(), 3);

    // A second load comes from the snapshot and matches the fresh build.
    let reloaded = Index::load_or_build(&path, &corpus, false, &cancel).unwrap();
    let query = corpus.get("A").unwrap();
    assert_eq!(
        reloaded.match_entity(&corpus, query, 10),
        index.match_entity(&corpus, query, 10),
    );
}

#[test]
fn corrupt_snapshot_fails_loudly() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("index.bin");
    std::fs::write(&path, b"garbage").unwrap();
    let err = Index::restore(&path).unwrap_err();
    assert!(matches!(
        err,
        CanonError::Index(canonize::error::IndexError::CorruptSnapshot { .. })
    ));
}
