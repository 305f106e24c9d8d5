//! The in-memory inverted index: blocking and candidate ranking.
//!
//! Built once per corpus snapshot. There is no incremental single-document
//! update: adding an entity after `commit()` requires a rebuild. This is a
//! known limitation of the snapshot design, not an oversight.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{CanonResult, IndexError};
use crate::index::entry::IndexEntry;
use crate::index::tokenizer::{marker_schema, tokenize_with};
use crate::model::{Corpus, EntityLike};
use crate::resolver::Pair;

/// Default result cap for [`Index::match_entity`].
pub const DEFAULT_MATCH_LIMIT: usize = 30;

/// Per-posting entity cap in [`Index::pairs`], bounding the combinatorics.
const PAIRS_TOP_K: usize = 200;

/// A weighted inverted index over tokenized entities.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Index {
    /// Token → posting.
    postings: BTreeMap<String, IndexEntry>,
    /// Entity id → total token mass of that document.
    doc_terms: BTreeMap<String, f64>,
    /// Whether one-hop adjacency tokens were included at build time.
    adjacency: bool,
    #[serde(skip)]
    committed: bool,
}

impl Index {
    pub fn new(adjacency: bool) -> Self {
        Index {
            adjacency,
            ..Index::default()
        }
    }

    /// Whether adjacency tokens were included at build time.
    pub fn adjacency(&self) -> bool {
        self.adjacency
    }

    /// Number of distinct tokens.
    pub fn token_count(&self) -> usize {
        self.postings.len()
    }

    /// Number of indexed entities.
    pub fn entity_count(&self) -> usize {
        self.doc_terms.len()
    }

    /// Index every matchable entity in the corpus.
    ///
    /// `cancel` allows a coarse early stop between entities; the partial
    /// index is still usable after `commit()` but covers only the entities
    /// seen so far.
    pub fn build<C: Corpus>(&mut self, corpus: &C, cancel: &AtomicBool) {
        self.postings.clear();
        self.doc_terms.clear();
        self.committed = false;
        let mut indexed = 0usize;
        for entity in corpus.entities() {
            if cancel.load(Ordering::Relaxed) {
                tracing::warn!(indexed, "index build cancelled");
                break;
            }
            if !entity.matchable() {
                continue;
            }
            for (token, weight) in tokenize_with(corpus, entity, self.adjacency) {
                self.postings
                    .entry(token)
                    .or_default()
                    .add(entity.id(), weight);
                *self.doc_terms.entry(entity.id().to_string()).or_insert(0.0) += weight;
            }
            indexed += 1;
        }
        tracing::info!(
            entities = indexed,
            tokens = self.postings.len(),
            adjacency = self.adjacency,
            "built index"
        );
    }

    /// Derive idf and term frequencies for every posting.
    ///
    /// The term-frequency floor is the lower tercile of document token
    /// masses, guarding degenerate documents from dominating the ranking.
    pub fn commit(&mut self) {
        let corpus_size = self.doc_terms.len();
        let mut masses: Vec<f64> = self.doc_terms.values().copied().collect();
        masses.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let min_terms = if masses.is_empty() {
            1.0
        } else {
            masses[masses.len() / 3]
        };
        for entry in self.postings.values_mut() {
            entry.compute(corpus_size, &self.doc_terms, min_terms);
        }
        self.committed = true;
    }

    /// Entity ids allowed as candidates for the query's schema, resolved
    /// through the shared schema-marker postings.
    fn compatible_ids<E: EntityLike>(&self, query: &E) -> HashSet<&str> {
        let mut allowed: HashSet<&str> = HashSet::new();
        for (token, entry) in &self.postings {
            let Some(schema) = marker_schema(token) else {
                continue;
            };
            if query.can_match(schema) {
                allowed.extend(entry.entities.keys().map(String::as_str));
            }
        }
        allowed
    }

    /// Match one entity against the index.
    ///
    /// Scores accumulate `frequency × idf` over all shared tokens. The
    /// query's own id and schema-incompatible candidates are dropped; the
    /// ranking stops at the first non-positive score and is capped at
    /// `limit`. An empty or unbuilt index yields an empty result.
    pub fn match_entity<C: Corpus>(
        &self,
        corpus: &C,
        query: &C::Entity,
        limit: usize,
    ) -> Vec<(String, f64)> {
        if self.postings.is_empty() || !self.committed || !query.matchable() {
            return Vec::new();
        }
        let mut scores: BTreeMap<&str, f64> = BTreeMap::new();
        for (token, weight) in tokenize_with(corpus, query, self.adjacency) {
            // Zero-weight tokens (schema markers) never contribute to score.
            if weight <= 0.0 {
                continue;
            }
            let Some(entry) = self.postings.get(&token) else {
                continue;
            };
            let idf = entry.idf.unwrap_or(0.0);
            for (id, freq) in &entry.frequencies {
                *scores.entry(id.as_str()).or_insert(0.0) += freq * idf;
            }
        }
        scores.remove(query.id());

        let allowed = self.compatible_ids(query);
        let mut ranked: Vec<(String, f64)> = scores
            .into_iter()
            .filter(|(id, _)| allowed.contains(id))
            .map(|(id, score)| (id.to_string(), score))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked
            .into_iter()
            .take_while(|(_, score)| *score > 0.0)
            .take(limit)
            .collect()
    }

    /// Full-corpus blocking pass: rank entity pairs by symmetric token
    /// frequency overlap.
    ///
    /// Each posting contributes its top entities by frequency (capped to
    /// bound the combinatorics); pair scores accumulate `lw + rw`. The
    /// accumulation map is periodically truncated to bound memory.
    pub fn pairs(&self, max_pairs: usize, cancel: &AtomicBool) -> Vec<(Pair, f64)> {
        let pool_cap = max_pairs.saturating_mul(5).max(1);
        let mut pairs: HashMap<Pair, f64> = HashMap::new();
        for (token, entry) in &self.postings {
            if cancel.load(Ordering::Relaxed) {
                tracing::warn!("pair generation cancelled");
                break;
            }
            // Markers carry no scoring weight; single-entity postings carry
            // no pairs.
            if marker_schema(token).is_some() || entry.entities.len() < 2 {
                continue;
            }
            let top = entry.top_frequencies(PAIRS_TOP_K);
            for (i, (left, lw)) in top.iter().enumerate() {
                for (right, rw) in &top[i + 1..] {
                    let score = lw + rw;
                    if score <= 0.0 {
                        continue;
                    }
                    let Ok(pair) = Pair::new(*left, *right) else {
                        continue;
                    };
                    *pairs.entry(pair).or_insert(0.0) += score;
                }
            }
            if pairs.len() > pool_cap * 2 {
                pairs = Self::truncate_pairs(pairs, pool_cap);
            }
        }
        let mut ranked: Vec<(Pair, f64)> = pairs.into_iter().collect();
        Self::sort_pairs(&mut ranked);
        ranked.truncate(max_pairs);
        ranked
    }

    fn sort_pairs(ranked: &mut [(Pair, f64)]) {
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
    }

    fn truncate_pairs(pairs: HashMap<Pair, f64>, cap: usize) -> HashMap<Pair, f64> {
        let mut ranked: Vec<(Pair, f64)> = pairs.into_iter().collect();
        Self::sort_pairs(&mut ranked);
        ranked.truncate(cap);
        ranked.into_iter().collect()
    }

    /// Write the index snapshot (postings and document masses; derived
    /// frequencies are recomputed on load).
    pub fn save(&self, path: &Path) -> CanonResult<()> {
        let file = File::create(path).map_err(|source| IndexError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, self).map_err(|source| IndexError::CorruptSnapshot {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(
            tokens = self.postings.len(),
            path = %path.display(),
            "saved index snapshot"
        );
        Ok(())
    }

    /// Restore an index from a snapshot and recompute derived state.
    pub fn restore(path: &Path) -> CanonResult<Self> {
        let file = File::open(path).map_err(|source| IndexError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut index: Index =
            bincode::deserialize_from(reader).map_err(|source| IndexError::CorruptSnapshot {
                path: path.display().to_string(),
                source,
            })?;
        index.commit();
        tracing::info!(
            tokens = index.postings.len(),
            entities = index.entity_count(),
            path = %path.display(),
            "restored index snapshot"
        );
        Ok(index)
    }

    /// Load a snapshot if one exists; otherwise build from the corpus and
    /// save the fresh snapshot.
    pub fn load_or_build<C: Corpus>(
        path: &Path,
        corpus: &C,
        adjacency: bool,
        cancel: &AtomicBool,
    ) -> CanonResult<Self> {
        if path.exists() {
            return Self::restore(path);
        }
        let mut index = Index::new(adjacency);
        index.build(corpus, cancel);
        index.commit();
        index.save(path)?;
        Ok(index)
    }
}
