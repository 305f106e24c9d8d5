//! Identifier and pair types for the resolution graph.
//!
//! An [`Identifier`] is a node label carrying a *weight* that encodes how
//! much we trust it as a cluster representative: raw external ids weigh 1,
//! synthetic canonical ids minted by the resolver weigh 2, and ids issued by
//! a well-known canonical authority (knowledge-base QIDs) weigh 3. The total
//! order over identifiers — weight descending, then id ascending — is the
//! sole tie-break used to pick cluster representatives.

use std::cmp::Ordering;
use std::sync::LazyLock;

use rand::Rng;
use rand::distributions::Alphanumeric;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ResolverError;

/// Prefix marking identifiers minted by the resolver itself.
pub const SYNTHETIC_PREFIX: &str = "CN-";

/// Length of the random suffix on minted identifiers.
const SUFFIX_LEN: usize = 22;

static QID_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^Q\d+$").unwrap());

/// Whether an id is issued by the external canonical authority (a QID).
pub fn is_qid(id: &str) -> bool {
    QID_PATTERN.is_match(id)
}

/// A node label in the resolution graph.
///
/// Immutable value object; equality and hashing consider the id string only,
/// since the weight is derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Identifier {
    pub id: String,
    pub weight: u8,
}

impl Identifier {
    /// Wrap a raw id string. Idempotent: the weight is derived from the id.
    pub fn get(id: impl Into<String>) -> Self {
        let id = id.into();
        let weight = if id.starts_with(SYNTHETIC_PREFIX) {
            2
        } else if is_qid(&id) {
            3
        } else {
            1
        };
        Identifier { id, weight }
    }

    /// Mint a brand-new synthetic canonical identifier (weight 2).
    ///
    /// With a `seed`, the id is deterministic (`CN-<seed>`); otherwise a
    /// random alphanumeric suffix is generated.
    pub fn make(seed: Option<&str>) -> Self {
        let suffix: String = match seed {
            Some(s) => s.to_string(),
            None => rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(SUFFIX_LEN)
                .map(char::from)
                .collect(),
        };
        Identifier::get(format!("{SYNTHETIC_PREFIX}{suffix}"))
    }

    /// Whether this identifier may serve as a cluster representative.
    pub fn canonical(&self) -> bool {
        self.weight > 1
    }
}

impl From<String> for Identifier {
    fn from(id: String) -> Self {
        Identifier::get(id)
    }
}

impl From<Identifier> for String {
    fn from(ident: Identifier) -> Self {
        ident.id
    }
}

impl From<&str> for Identifier {
    fn from(id: &str) -> Self {
        Identifier::get(id)
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Identifier {}

impl std::hash::Hash for Identifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Ord for Identifier {
    /// Weight descending, then id ascending: the *greatest* identifier under
    /// this order is the preferred cluster representative.
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .cmp(&other.weight)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Canonical unordered key for an edge between two distinct identifiers.
///
/// Always stored as `(target, source) = (max, min)` under [`Identifier`]
/// ordering, so `Pair::new(a, b) == Pair::new(b, a)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pair {
    pub target: Identifier,
    pub source: Identifier,
}

impl Pair {
    /// Build the canonical pair for two identifiers.
    ///
    /// Fails with [`ResolverError::SelfPair`] when both sides are equal.
    pub fn new(
        left: impl Into<Identifier>,
        right: impl Into<Identifier>,
    ) -> Result<Self, ResolverError> {
        let left = left.into();
        let right = right.into();
        if left == right {
            return Err(ResolverError::SelfPair { id: left.id });
        }
        if left > right {
            Ok(Pair { target: left, source: right })
        } else {
            Ok(Pair { target: right, source: left })
        }
    }
}

impl std::fmt::Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.target, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_tiers() {
        assert_eq!(Identifier::get("gb-companies-123").weight, 1);
        assert_eq!(Identifier::get("CN-abc").weight, 2);
        assert_eq!(Identifier::get("Q7747").weight, 3);
        assert_eq!(Identifier::get("Q7747x").weight, 1);
    }

    #[test]
    fn canonical_is_weight_above_one() {
        assert!(!Identifier::get("a").canonical());
        assert!(Identifier::get("CN-abc").canonical());
        assert!(Identifier::get("Q42").canonical());
    }

    #[test]
    fn equality_ignores_weight() {
        // Weight is derived from the id, so same id always means equal.
        let a = Identifier::get("x");
        let b = Identifier::from("x".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn ordering_prefers_weight_then_lower_id() {
        let raw = Identifier::get("zzz");
        let synth = Identifier::get("CN-a");
        let qid = Identifier::get("Q1");
        assert!(qid > synth);
        assert!(synth > raw);

        // Equal weight: the lexicographically smaller id wins.
        let a = Identifier::get("a");
        let b = Identifier::get("b");
        assert!(a > b);
        assert_eq!([&b, &a].iter().max().unwrap().id, "a");
    }

    #[test]
    fn pair_is_order_independent() {
        let p1 = Pair::new("a", "b").unwrap();
        let p2 = Pair::new("b", "a").unwrap();
        assert_eq!(p1, p2);
        assert_eq!(p1.target.id, "a");
        assert_eq!(p1.source.id, "b");
    }

    #[test]
    fn self_pair_fails() {
        let err = Pair::new("a", "a").unwrap_err();
        assert!(matches!(err, ResolverError::SelfPair { .. }));
    }

    #[test]
    fn make_is_synthetic() {
        let seeded = Identifier::make(Some("test"));
        assert_eq!(seeded.id, "CN-test");
        assert_eq!(seeded.weight, 2);

        let random = Identifier::make(None);
        assert!(random.id.starts_with(SYNTHETIC_PREFIX));
        assert!(random.canonical());
        assert_ne!(random, Identifier::make(None));
    }

    #[test]
    fn serde_round_trip_as_string() {
        let ident = Identifier::get("Q42");
        let json = serde_json::to_string(&ident).unwrap();
        assert_eq!(json, "\"Q42\"");
        let back: Identifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back.weight, 3);
    }
}
