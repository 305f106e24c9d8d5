//! Inverted-index postings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The set of entities carrying a given token, with per-entity weight.
///
/// `idf` and `frequencies` are derived at commit time and recomputed after a
/// snapshot load; only the raw weights are persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Accumulated token weight per entity id.
    pub entities: BTreeMap<String, f64>,
    /// Inverse document frequency, `ln(corpus_size / posting_size)`.
    #[serde(skip)]
    pub idf: Option<f64>,
    /// Per-entity term frequency relative to document token mass.
    #[serde(skip)]
    pub frequencies: BTreeMap<String, f64>,
}

impl IndexEntry {
    /// Accumulate weight for an entity under this token.
    pub fn add(&mut self, entity_id: &str, weight: f64) {
        *self.entities.entry(entity_id.to_string()).or_insert(0.0) += weight;
    }

    /// Derive idf and per-entity frequencies.
    ///
    /// `doc_terms` is each entity's total token mass; `min_terms` floors it
    /// so tiny documents do not dominate.
    pub fn compute(&mut self, corpus_size: usize, doc_terms: &BTreeMap<String, f64>, min_terms: f64) {
        let posting_size = self.entities.len().max(1);
        self.idf = Some((corpus_size as f64 / posting_size as f64).ln());
        self.frequencies = self
            .entities
            .iter()
            .map(|(id, weight)| {
                let terms = doc_terms.get(id).copied().unwrap_or(0.0).max(min_terms);
                (id.clone(), weight / terms)
            })
            .collect();
    }

    /// Entities ordered by descending frequency (id ascending on ties),
    /// capped at `top`.
    pub fn top_frequencies(&self, top: usize) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .frequencies
            .iter()
            .map(|(id, freq)| (id.as_str(), *freq))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        ranked.truncate(top);
        ranked
    }
}
