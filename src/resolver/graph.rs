//! The resolver: a graph of pairwise identity judgements.
//!
//! Edges live in a map keyed by [`Pair`]; an adjacency map lists the pair
//! keys touching each identifier. Connectivity follows POSITIVE edges only
//! and is memoized per node; every mutation entry point clears the whole
//! cache before returning, because a single positive edge can merge two
//! previously disjoint components.
//!
//! Positive decisions are canonicalised: instead of linking two raw ids
//! directly, the resolver mints a synthetic canonical identifier and links
//! both sides to it, so every member of a cluster reaches its representative
//! in one hop.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;

use crate::error::{CanonResult, ResolverError};
use crate::judgement::Judgement;
use crate::resolver::edge::Edge;
use crate::resolver::identifier::{Identifier, Pair, is_qid};

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn current_user() -> String {
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}

/// Sort edges by score descending (missing scores last), then by pair key
/// so the order is fully deterministic.
fn by_score_desc(a: &Edge, b: &Edge) -> std::cmp::Ordering {
    let sa = a.score.unwrap_or(-1.0);
    let sb = b.score.unwrap_or(-1.0);
    sb.partial_cmp(&sa)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| a.key.cmp(&b.key))
}

/// A persistent graph of pairwise identity judgements.
pub struct Resolver {
    /// All edges, keyed by their canonical pair.
    edges: HashMap<Pair, Edge>,
    /// Pair keys touching each identifier.
    adjacency: HashMap<Identifier, HashSet<Pair>>,
    /// Memoized positive-edge connectivity. Derived state, never persisted;
    /// cleared completely by every mutator.
    cache: DashMap<Identifier, Arc<BTreeSet<Identifier>>>,
}

impl Resolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Resolver {
            edges: HashMap::new(),
            adjacency: HashMap::new(),
            cache: DashMap::new(),
        }
    }

    /// Load a resolver from a persisted edge log.
    pub fn load(path: &Path) -> CanonResult<Self> {
        let mut resolver = Resolver::new();
        resolver.merge(path)?;
        Ok(resolver)
    }

    /// Number of stored edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    fn invalidate(&self) {
        self.cache.clear();
    }

    /// Register an edge under its key and both endpoints, enforcing the
    /// decided-edges-carry-no-score invariant.
    fn register(&mut self, mut edge: Edge) {
        if edge.judgement != Judgement::NoJudgement {
            edge.score = None;
        }
        let key = edge.key.clone();
        self.adjacency
            .entry(key.target.clone())
            .or_default()
            .insert(key.clone());
        self.adjacency
            .entry(key.source.clone())
            .or_default()
            .insert(key.clone());
        self.edges.insert(key, edge);
    }

    fn drop_edge(&mut self, key: &Pair) {
        self.edges.remove(key);
        for node in [&key.target, &key.source] {
            if let Some(keys) = self.adjacency.get_mut(node) {
                keys.remove(key);
                if keys.is_empty() {
                    self.adjacency.remove(node);
                }
            }
        }
    }

    /// Direct lookup of the edge stored for a pair, if any.
    pub fn get_edge(&self, left: &str, right: &str) -> CanonResult<Option<&Edge>> {
        let key = Pair::new(left, right)?;
        Ok(self.edges.get(&key))
    }

    /// All identifiers reachable from `node` via POSITIVE edges, including
    /// `node` itself. Memoized per node.
    pub fn connected(&self, node: &Identifier) -> Arc<BTreeSet<Identifier>> {
        if let Some(cached) = self.cache.get(node) {
            return Arc::clone(cached.value());
        }
        let mut seen: BTreeSet<Identifier> = BTreeSet::new();
        let mut queue: VecDeque<Identifier> = VecDeque::new();
        seen.insert(node.clone());
        queue.push_back(node.clone());
        while let Some(current) = queue.pop_front() {
            if let Some(keys) = self.adjacency.get(&current) {
                for key in keys {
                    let Some(edge) = self.edges.get(key) else {
                        continue;
                    };
                    if edge.judgement != Judgement::Positive {
                        continue;
                    }
                    let other = edge.other(&current);
                    if seen.insert(other.clone()) {
                        queue.push_back(other.clone());
                    }
                }
            }
        }
        let connected = Arc::new(seen);
        self.cache.insert(node.clone(), connected.clone());
        connected
    }

    /// The canonical id for an entity id.
    ///
    /// Picks the greatest member of the connected component under identifier
    /// ordering; an entity with no canonical representative resolves to
    /// itself.
    pub fn get_canonical(&self, entity_id: &str) -> String {
        let node = Identifier::get(entity_id);
        let connected = self.connected(&node);
        // The component always contains the node itself.
        let best = connected.iter().max().unwrap_or(&node);
        if best.canonical() {
            best.id.clone()
        } else {
            entity_id.to_string()
        }
    }

    /// Every canonical identifier that heads its own cluster.
    pub fn canonicals(&self) -> impl Iterator<Item = Identifier> + '_ {
        self.adjacency
            .keys()
            .filter(|node| node.canonical())
            .filter(|node| self.get_canonical(&node.id) == node.id)
            .cloned()
    }

    /// All other members of the cluster headed by `canonical_id`.
    ///
    /// With `include_canonicals` off, other canonical-weight members are
    /// skipped.
    pub fn get_referents(&self, canonical_id: &str, include_canonicals: bool) -> BTreeSet<String> {
        let node = Identifier::get(canonical_id);
        self.connected(&node)
            .iter()
            .filter(|member| *member != &node)
            .filter(|member| include_canonicals || !member.canonical())
            .map(|member| member.id.clone())
            .collect()
    }

    /// The effective judgement between two entity ids, with transitivity
    /// factored in.
    ///
    /// Positive connectivity wins outright. Otherwise every cross-component
    /// identifier pair is scanned for a stored decided edge — an explicit
    /// O(|A|×|B|) trade-off that keeps individual edges inspectable.
    pub fn get_judgement(&self, entity_id: &str, other_id: &str) -> Judgement {
        let entity = Identifier::get(entity_id);
        let other = Identifier::get(other_id);
        if entity == other {
            return Judgement::Positive;
        }
        let entity_connected = self.connected(&entity);
        if entity_connected.contains(&other) {
            return Judgement::Positive;
        }
        // Two distinct authority ids can never be the same entity.
        if is_qid(&entity.id) && is_qid(&other.id) {
            return Judgement::Negative;
        }
        let other_connected = self.connected(&other);
        for e in entity_connected.iter() {
            for o in other_connected.iter() {
                if e == o {
                    continue;
                }
                let Ok(key) = Pair::new(e.clone(), o.clone()) else {
                    continue;
                };
                if let Some(edge) = self.edges.get(&key) {
                    if edge.judgement != Judgement::NoJudgement {
                        return edge.judgement;
                    }
                }
            }
        }
        Judgement::NoJudgement
    }

    /// Whether the two ids could still be merged, i.e. no judgement exists.
    pub fn check_candidate(&self, left: &str, right: &str) -> bool {
        self.get_judgement(left, right) == Judgement::NoJudgement
    }

    /// Some stored edge connecting the two components, if one exists.
    pub fn get_resolved_edge(&self, left: &str, right: &str) -> CanonResult<Option<&Edge>> {
        let key = Pair::new(left, right)?;
        let left_connected = self.connected(&key.target);
        let right_connected = self.connected(&key.source);
        for e in left_connected.iter() {
            for o in right_connected.iter() {
                if e == o {
                    continue;
                }
                let Ok(pair) = Pair::new(e.clone(), o.clone()) else {
                    continue;
                };
                if let Some(edge) = self.edges.get(&pair) {
                    return Ok(Some(edge));
                }
            }
        }
        Ok(None)
    }

    /// Record a suggestion that two ids may refer to the same entity.
    ///
    /// An existing undecided suggestion has its score refreshed in place; an
    /// already-decided edge is never touched.
    pub fn suggest(
        &mut self,
        left: &str,
        right: &str,
        score: f64,
        user: Option<&str>,
    ) -> CanonResult<Identifier> {
        let key = Pair::new(left, right)?;
        if let Some(edge) = self.edges.get_mut(&key) {
            if edge.judgement == Judgement::NoJudgement {
                edge.score = Some(score);
            }
            return Ok(edge.key.target.clone());
        }
        self.decide(left, right, Judgement::NoJudgement, user, Some(score))
    }

    /// Record a judgement between two ids and return the target identifier.
    ///
    /// Positive decisions are canonicalised: when the merged component has
    /// no canonical representative, a synthetic identifier is minted and
    /// both sides are linked to it instead of to each other.
    pub fn decide(
        &mut self,
        left: impl Into<Identifier>,
        right: impl Into<Identifier>,
        judgement: Judgement,
        user: Option<&str>,
        score: Option<f64>,
    ) -> CanonResult<Identifier> {
        let left = left.into();
        let right = right.into();
        let key = Pair::new(left, right)?;
        let mut edge = match self.edges.get(&key) {
            Some(existing) => existing.clone(),
            None => Edge {
                key: key.clone(),
                judgement,
                score: None,
                user: None,
                timestamp: None,
            },
        };

        if judgement == Judgement::Positive {
            let mut component: BTreeSet<Identifier> =
                self.connected(&key.target).iter().cloned().collect();
            component.extend(self.connected(&key.source).iter().cloned());
            // max() is safe: the component contains both endpoints.
            let best = component.iter().max().cloned();
            if let Some(best) = best {
                if !best.canonical() {
                    let canonical = Identifier::make(None);
                    // Discard the implied direct edge; both endpoints link
                    // to the fresh canonical hub instead.
                    self.drop_edge(&key);
                    self.decide(
                        key.source.clone(),
                        canonical.clone(),
                        Judgement::Positive,
                        user,
                        None,
                    )?;
                    self.decide(
                        key.target.clone(),
                        canonical.clone(),
                        Judgement::Positive,
                        user,
                        None,
                    )?;
                    return Ok(canonical);
                }
            }
        }

        edge.judgement = judgement;
        edge.timestamp = Some(timestamp());
        edge.user = Some(user.map(str::to_string).unwrap_or_else(current_user));
        edge.score = score.or(edge.score);
        let target = edge.key.target.clone();
        self.register(edge);
        self.invalidate();
        Ok(target)
    }

    /// Dissolve every decision in the cluster around `node_id`.
    ///
    /// Removes all decided edges (positive and negative) touching any member
    /// of the component; undecided suggestions survive so the cluster can be
    /// re-reviewed. Returns the affected identifiers.
    pub fn explode(&mut self, node_id: &str) -> BTreeSet<String> {
        let node = Identifier::get(node_id);
        let members: Vec<Identifier> = self.connected(&node).iter().cloned().collect();
        let mut affected = BTreeSet::new();
        for member in members {
            affected.insert(member.id.clone());
            let keys: Vec<Pair> = self
                .adjacency
                .get(&member)
                .map(|keys| keys.iter().cloned().collect())
                .unwrap_or_default();
            for key in keys {
                let decided = self
                    .edges
                    .get(&key)
                    .is_some_and(|e| e.judgement != Judgement::NoJudgement);
                if decided {
                    self.drop_edge(&key);
                }
            }
        }
        self.invalidate();
        affected
    }

    /// Remove every edge touching the given node, suggestions included.
    pub fn remove(&mut self, node_id: &str) {
        let node = Identifier::get(node_id);
        let keys: Vec<Pair> = self
            .adjacency
            .get(&node)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        for key in keys {
            self.drop_edge(&key);
        }
        self.invalidate();
    }

    /// Suggested (undecided) edges, best score first.
    fn suggested(&self) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self
            .edges
            .values()
            .filter(|e| e.judgement == Judgement::NoJudgement)
            .collect();
        edges.sort_by(|a, b| by_score_desc(a, b));
        edges
    }

    /// Trim stored suggestions to the `keep` best-scoring ones.
    ///
    /// Suggestions whose pair has since been decided transitively are always
    /// dropped. `keep = 0` clears every suggestion.
    pub fn prune(&mut self, keep: usize) {
        let mut kept = 0usize;
        let mut doomed: Vec<Pair> = Vec::new();
        for edge in self.suggested() {
            let decided = self.get_judgement(&edge.key.source.id, &edge.key.target.id)
                != Judgement::NoJudgement;
            if decided || kept >= keep {
                doomed.push(edge.key.clone());
            } else {
                kept += 1;
            }
        }
        let dropped = doomed.len();
        for key in doomed {
            self.drop_edge(&key);
        }
        self.invalidate();
        tracing::info!(dropped, kept, "pruned resolver suggestions");
    }

    /// Reviewable candidates: undecided suggestions, best score first,
    /// skipping pairs that have been resolved out-of-band.
    pub fn get_candidates(
        &self,
        limit: Option<usize>,
    ) -> impl Iterator<Item = (String, String, Option<f64>)> + '_ {
        self.suggested()
            .into_iter()
            .filter(|edge| self.check_candidate(&edge.key.source.id, &edge.key.target.id))
            .map(|edge| {
                (
                    edge.key.target.id.clone(),
                    edge.key.source.id.clone(),
                    edge.score,
                )
            })
            .take(limit.unwrap_or(usize::MAX))
    }

    /// All stored edges, sorted by pair key.
    pub fn edges(&self) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self.edges.values().collect();
        edges.sort_by(|a, b| a.key.cmp(&b.key));
        edges
    }

    /// Write all edges to a newline-delimited JSON log, sorted by pair key.
    pub fn save(&self, path: &Path) -> CanonResult<()> {
        let io_err = |source| ResolverError::Io {
            path: path.display().to_string(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        let mut keys: Vec<&Pair> = self.edges.keys().collect();
        keys.sort();
        for key in &keys {
            let edge = &self.edges[*key];
            writeln!(writer, "{}", edge.to_line()).map_err(io_err)?;
        }
        writer.flush().map_err(io_err)?;
        tracing::info!(edges = keys.len(), path = %path.display(), "saved resolver");
        Ok(())
    }

    /// Replay a persisted edge log into this resolver.
    ///
    /// Later lines for the same pair overwrite earlier ones. A structurally
    /// corrupt line is a fatal load error.
    pub fn merge(&mut self, path: &Path) -> CanonResult<usize> {
        let file = File::open(path).map_err(|source| ResolverError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut count = 0usize;
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| ResolverError::Io {
                path: path.display().to_string(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let edge = Edge::from_line(&line).map_err(|source| ResolverError::CorruptLog {
                path: path.display().to_string(),
                line: idx + 1,
                source,
            })?;
            self.register(edge);
            count += 1;
        }
        self.invalidate();
        tracing::info!(edges = count, path = %path.display(), "loaded resolver log");
        Ok(count)
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("edges", &self.edges.len())
            .field("nodes", &self.adjacency.len())
            .finish()
    }
}
