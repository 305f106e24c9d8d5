//! Edges: judgement records attached to identifier pairs.

use crate::error::ResolverError;
use crate::judgement::Judgement;
use crate::resolver::identifier::{Identifier, Pair};

/// One persisted log row: `[target, source, judgement, score, user, timestamp]`.
type Row = (
    String,
    String,
    Judgement,
    Option<f64>,
    Option<String>,
    Option<String>,
);

/// Historical rows may carry a trailing seventh field; it is ignored.
type LegacyRow = (
    String,
    String,
    Judgement,
    Option<f64>,
    Option<String>,
    Option<String>,
    Option<String>,
);

/// A judgement record between two identifiers.
///
/// Invariant: `score` is populated only while the judgement is
/// [`Judgement::NoJudgement`]; deciding an edge clears it.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub key: Pair,
    pub judgement: Judgement,
    pub score: Option<f64>,
    pub user: Option<String>,
    pub timestamp: Option<String>,
}

impl Edge {
    /// Build an edge between two identifiers, normalizing the key to
    /// `(target, source) = (max, min)`.
    pub fn new(
        left: impl Into<Identifier>,
        right: impl Into<Identifier>,
        judgement: Judgement,
    ) -> Result<Self, ResolverError> {
        Ok(Edge {
            key: Pair::new(left, right)?,
            judgement,
            score: None,
            user: None,
            timestamp: None,
        })
    }

    pub fn target(&self) -> &Identifier {
        &self.key.target
    }

    pub fn source(&self) -> &Identifier {
        &self.key.source
    }

    /// The endpoint that is not `current`.
    pub fn other(&self, current: &Identifier) -> &Identifier {
        if current == &self.key.target {
            &self.key.source
        } else {
            &self.key.target
        }
    }

    /// Encode as one self-describing JSON array line (no trailing newline).
    pub fn to_line(&self) -> String {
        let row: Row = (
            self.key.target.id.clone(),
            self.key.source.id.clone(),
            self.judgement,
            self.score,
            self.user.clone(),
            self.timestamp.clone(),
        );
        // A six-element tuple of strings and numbers cannot fail to encode.
        serde_json::to_string(&row).unwrap_or_default()
    }

    /// Decode one persisted log line.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        let (target, source, judgement, score, user, timestamp) =
            match serde_json::from_str::<Row>(line) {
                Ok(row) => row,
                Err(err) => match serde_json::from_str::<LegacyRow>(line) {
                    Ok((t, s, j, sc, u, ts, _)) => (t, s, j, sc, u, ts),
                    Err(_) => return Err(err),
                },
            };
        let key = Pair::new(target, source).map_err(serde::de::Error::custom)?;
        Ok(Edge {
            key,
            judgement,
            score,
            user,
            timestamp,
        })
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<{} = {} [{}]>",
            self.key.target, self.key.source, self.judgement
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_endpoints() {
        let edge = Edge::new("b", "a", Judgement::NoJudgement).unwrap();
        assert_eq!(edge.target().id, "a");
        assert_eq!(edge.source().id, "b");
    }

    #[test]
    fn other_endpoint() {
        let edge = Edge::new("a", "b", Judgement::Positive).unwrap();
        let a = Identifier::get("a");
        let b = Identifier::get("b");
        assert_eq!(edge.other(&a), &b);
        assert_eq!(edge.other(&b), &a);
    }

    #[test]
    fn line_round_trip() {
        let mut edge = Edge::new("a", "b", Judgement::NoJudgement).unwrap();
        edge.score = Some(0.75);
        edge.user = Some("reviewer".into());
        let line = edge.to_line();
        assert_eq!(line, "[\"a\",\"b\",\"no_judgement\",0.75,\"reviewer\",null]");
        let back = Edge::from_line(&line).unwrap();
        assert_eq!(back, edge);
    }

    #[test]
    fn legacy_seven_field_row() {
        let line = "[\"a\",\"b\",\"positive\",null,\"reviewer\",\"2021-01-01\",\"2021-02-01\"]";
        let edge = Edge::from_line(line).unwrap();
        assert_eq!(edge.judgement, Judgement::Positive);
        assert_eq!(edge.timestamp.as_deref(), Some("2021-01-01"));
    }

    #[test]
    fn corrupt_line_is_an_error() {
        assert!(Edge::from_line("not json").is_err());
        assert!(Edge::from_line("[\"a\"]").is_err());
        // Self-pairs in the log are structural corruption too.
        assert!(Edge::from_line("[\"a\",\"a\",\"positive\",null,null,null]").is_err());
    }
}
