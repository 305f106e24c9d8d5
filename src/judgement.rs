//! Identity judgements: the decision states attached to resolver edges.

use serde::{Deserialize, Serialize};

/// A judgement of whether two identifiers refer to the same entity.
///
/// `NoJudgement` is the implicit state of every unseen pair; a stored
/// `NoJudgement` edge is a *suggestion* awaiting review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgement {
    Positive,
    Negative,
    Unsure,
    NoJudgement,
}

impl Judgement {
    /// Whether this judgement still allows a suggestion to be updated.
    pub fn is_undecided(self) -> bool {
        matches!(self, Judgement::NoJudgement | Judgement::Unsure)
    }

    /// Combine two judgements about overlapping pairs into one.
    ///
    /// Two positives stay positive; a positive against a negative is a
    /// conflict and resolves to negative; anything else is unsure.
    pub fn combine(self, other: Judgement) -> Judgement {
        match (self, other) {
            (Judgement::Positive, Judgement::Positive) => Judgement::Positive,
            (Judgement::Positive, Judgement::Negative)
            | (Judgement::Negative, Judgement::Positive) => Judgement::Negative,
            _ => Judgement::Unsure,
        }
    }
}

impl std::fmt::Display for Judgement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Judgement::Positive => write!(f, "positive"),
            Judgement::Negative => write!(f, "negative"),
            Judgement::Unsure => write!(f, "unsure"),
            Judgement::NoJudgement => write!(f, "no_judgement"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_tags_are_snake_case() {
        let tag = serde_json::to_string(&Judgement::NoJudgement).unwrap();
        assert_eq!(tag, "\"no_judgement\"");
        let back: Judgement = serde_json::from_str("\"positive\"").unwrap();
        assert_eq!(back, Judgement::Positive);
    }

    #[test]
    fn undecided_states() {
        assert!(Judgement::NoJudgement.is_undecided());
        assert!(Judgement::Unsure.is_undecided());
        assert!(!Judgement::Positive.is_undecided());
        assert!(!Judgement::Negative.is_undecided());
    }

    #[test]
    fn combine_table() {
        use Judgement::*;
        assert_eq!(Positive.combine(Positive), Positive);
        assert_eq!(Positive.combine(Negative), Negative);
        assert_eq!(Negative.combine(Positive), Negative);
        assert_eq!(Negative.combine(Negative), Unsure);
        assert_eq!(Positive.combine(Unsure), Unsure);
    }
}
