//! Pure tokenization of entities into weighted token multisets.
//!
//! No state is kept here: the same entity always yields the same tokens.
//! Every entity emits one schema-marker token at weight zero, used only for
//! schema-compatibility filtering, never for scoring. Property values emit
//! exact-value tokens weighted by semantic type, plus (for text-like types)
//! fingerprint, word and name-n-gram tokens at decreasing weights.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::model::{Corpus, EntityLike, PropType};

/// Weight multiplier for tokens taken from directly adjacent entities.
pub const ADJACENCY_FACTOR: f64 = 0.8;

/// Exact values are truncated to this many characters before tokenization.
const MAX_VALUE_LEN: usize = 100;

const WORD_WEIGHT: f64 = 0.5;
const NGRAM_WEIGHT: f64 = 0.2;
const FINGERPRINT_WEIGHT: f64 = 2.0;
const YEAR_WEIGHT: f64 = 0.75;

/// Fixed per-type weight for exact-value tokens. Names weigh highest.
fn type_weight(ptype: PropType) -> f64 {
    match ptype {
        PropType::Name => 3.0,
        PropType::Identifier | PropType::Email | PropType::Phone => 2.5,
        PropType::Address => 2.0,
        PropType::Date => 1.5,
        PropType::Country | PropType::Text => 1.0,
        PropType::Entity => 0.0,
    }
}

fn type_tag(ptype: PropType) -> &'static str {
    match ptype {
        PropType::Name => "n",
        PropType::Date => "d",
        PropType::Country => "c",
        PropType::Phone => "p",
        PropType::Email => "e",
        PropType::Address => "a",
        PropType::Identifier => "i",
        PropType::Text => "t",
        PropType::Entity => "x",
    }
}

/// The schema-compatibility marker token for a schema name.
pub fn schema_marker(schema: &str) -> String {
    format!("s:{schema}")
}

/// The schema name of a marker token, if it is one.
pub fn marker_schema(token: &str) -> Option<&str> {
    token.strip_prefix("s:")
}

/// ASCII-fold and lowercase a string: NFKD decomposition with combining
/// marks stripped, non-alphanumerics collapsed to single spaces.
fn fold(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_space = true;
    for ch in value.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Normalized fingerprint: folded words, deduplicated and sorted.
pub fn fingerprint(value: &str) -> Option<String> {
    let folded = fold(value);
    let mut words: Vec<&str> = folded.split(' ').filter(|w| !w.is_empty()).collect();
    if words.is_empty() {
        return None;
    }
    words.sort_unstable();
    words.dedup();
    Some(words.join(" "))
}

fn truncate(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// Emit the tokens for one property value at a weight scale.
fn value_tokens(ptype: PropType, value: &str, scale: f64, out: &mut Vec<(String, f64)>) {
    let value = truncate(value, MAX_VALUE_LEN);
    if value.is_empty() {
        return;
    }
    let tag = type_tag(ptype);
    out.push((
        format!("{tag}:{}", value.to_lowercase()),
        type_weight(ptype) * scale,
    ));

    if ptype == PropType::Date {
        let year = truncate(value, 4);
        if year.chars().count() == 4 {
            out.push((format!("y:{year}"), YEAR_WEIGHT * scale));
        }
    }

    let text_like = matches!(
        ptype,
        PropType::Name | PropType::Text | PropType::Address | PropType::Identifier
    );
    if !text_like {
        return;
    }
    let Some(fp) = fingerprint(value) else {
        return;
    };
    out.push((format!("f:{fp}"), FINGERPRINT_WEIGHT * scale));
    for word in fp.split(' ') {
        out.push((format!("w:{word}"), WORD_WEIGHT * scale));
        if ptype == PropType::Name {
            let chars: Vec<char> = word.chars().collect();
            for len in 2..=4usize {
                if chars.len() < len {
                    break;
                }
                for window in chars.windows(len) {
                    let gram: String = window.iter().collect();
                    out.push((format!("g:{gram}"), NGRAM_WEIGHT * scale));
                }
            }
        }
    }
}

/// Tokenize one entity, without adjacency.
pub fn tokenize<E: EntityLike>(entity: &E) -> Vec<(String, f64)> {
    let mut out = Vec::new();
    out.push((schema_marker(entity.schema()), 0.0));
    for (ptype, value) in entity.typed_values() {
        value_tokens(ptype, value, 1.0, &mut out);
    }
    out
}

/// Tokenize one entity, optionally including properties of directly
/// adjacent entities (one hop), down-weighted by [`ADJACENCY_FACTOR`].
///
/// Date-typed adjacent values are excluded so unrelated dates do not
/// pollute temporal matching.
pub fn tokenize_with<C: Corpus>(
    corpus: &C,
    entity: &C::Entity,
    adjacency: bool,
) -> Vec<(String, f64)> {
    let mut out = tokenize(entity);
    if !adjacency {
        return out;
    }
    for adjacent in corpus.adjacent(entity.id()) {
        for (ptype, value) in adjacent.typed_values() {
            if ptype == PropType::Date {
                continue;
            }
            value_tokens(ptype, value, ADJACENCY_FACTOR, &mut out);
        }
    }
    out
}
