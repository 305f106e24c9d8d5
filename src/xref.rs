//! Cross-referencing: stream a corpus through the index and record
//! high-scoring candidates as resolver suggestions.
//!
//! Suggestions are individually idempotent, so an interrupted run keeps
//! everything recorded so far; there is no transactional rollback.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::CanonResult;
use crate::index::Index;
use crate::model::{Corpus, EntityLike};
use crate::resolver::Resolver;

/// How often progress statistics are logged, in entities.
const LOG_INTERVAL: usize = 100;

/// Running statistics over suggested match scores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XrefStats {
    pub entities: usize,
    pub matches: usize,
    pub min_score: f64,
    pub max_score: f64,
    pub sum_score: f64,
}

impl XrefStats {
    fn record(&mut self, score: f64) {
        if self.matches == 0 {
            self.min_score = score;
            self.max_score = score;
        } else {
            self.min_score = self.min_score.min(score);
            self.max_score = self.max_score.max(score);
        }
        self.matches += 1;
        self.sum_score += score;
    }

    pub fn avg_score(&self) -> f64 {
        self.sum_score / self.matches.max(1) as f64
    }

    fn log(&self) {
        tracing::info!(
            entities = self.entities,
            matches = self.matches,
            avg = self.avg_score(),
            min = self.min_score,
            max = self.max_score,
            "xref progress"
        );
    }
}

/// Run the index over every matchable entity and suggest each candidate
/// pair to the resolver.
///
/// `cancel` stops the outer scan between entities; mutations already applied
/// stay in place. All other errors propagate.
pub fn xref<C: Corpus>(
    index: &Index,
    resolver: &mut Resolver,
    corpus: &C,
    limit: usize,
    cancel: &AtomicBool,
) -> CanonResult<XrefStats> {
    tracing::info!(entities = corpus.len(), limit, "begin xref");
    let mut stats = XrefStats::default();
    for entity in corpus.entities() {
        if cancel.load(Ordering::Relaxed) {
            tracing::info!("xref cancelled, stopping gracefully");
            break;
        }
        stats.entities += 1;
        if !entity.matchable() {
            continue;
        }
        for (candidate_id, score) in index.match_entity(corpus, entity, limit) {
            if candidate_id == entity.id() {
                continue;
            }
            resolver.suggest(entity.id(), &candidate_id, score, None)?;
            stats.record(score);
        }
        if stats.entities % LOG_INTERVAL == 0 {
            stats.log();
        }
    }
    stats.log();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemoryCorpus, Record};

    fn fixture() -> (MemoryCorpus, Index) {
        let corpus = MemoryCorpus::from_records([
            Record::new("A", "Person").with("name", "John Doe"),
            Record::new("B", "Person").with("name", "Jon Doe"),
            Record::new("C", "Person").with("name", "Jane Roe"),
        ])
        .unwrap();
        let cancel = AtomicBool::new(false);
        let mut index = Index::new(false);
        index.build(&corpus, &cancel);
        index.commit();
        (corpus, index)
    }

    #[test]
    fn xref_records_suggestions() {
        let (corpus, index) = fixture();
        let mut resolver = Resolver::new();
        let cancel = AtomicBool::new(false);
        let stats = xref(&index, &mut resolver, &corpus, 10, &cancel).unwrap();
        assert_eq!(stats.entities, 3);
        assert!(stats.matches > 0);
        assert!(stats.max_score >= stats.min_score);

        let candidates: Vec<_> = resolver.get_candidates(None).collect();
        assert!(
            candidates
                .iter()
                .any(|(t, s, _)| (t == "A" && s == "B") || (t == "B" && s == "A"))
        );
        assert!(candidates.iter().all(|(_, _, score)| score.unwrap() > 0.0));
    }

    #[test]
    fn xref_is_idempotent() {
        let (corpus, index) = fixture();
        let mut resolver = Resolver::new();
        let cancel = AtomicBool::new(false);
        xref(&index, &mut resolver, &corpus, 10, &cancel).unwrap();
        let first = resolver.len();
        xref(&index, &mut resolver, &corpus, 10, &cancel).unwrap();
        assert_eq!(resolver.len(), first);
    }

    #[test]
    fn cancelled_xref_keeps_applied_suggestions() {
        let (corpus, index) = fixture();
        let mut resolver = Resolver::new();
        let cancel = AtomicBool::new(true);
        let stats = xref(&index, &mut resolver, &corpus, 10, &cancel).unwrap();
        assert_eq!(stats.entities, 0);
        assert!(resolver.is_empty());
    }
}
