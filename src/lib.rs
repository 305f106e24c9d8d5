//! # canonize
//!
//! An entity resolution engine: decides which records across datasets refer
//! to the same real-world entity and assigns each cluster a stable canonical
//! identifier.
//!
//! ## Architecture
//!
//! - **Resolver** (`resolver`): a persistent graph of pairwise identity
//!   judgements. Positive judgements merge clusters around a canonical hub;
//!   negative and unsure judgements block future suggestions.
//! - **Index** (`index`): a weighted inverted index over tokenized entities,
//!   used for blocking — proposing likely-duplicate candidate pairs without
//!   comparing every record against every other.
//! - **Xref** (`xref`): streams a corpus through the index and records
//!   high-scoring candidates as resolver suggestions for review.
//! - **Model** (`model`): the trait boundary to the surrounding system
//!   (entities, schemata, corpora) plus a JSON-lines record implementation.
//!
//! ## Library usage
//!
//! ```no_run
//! use canonize::resolver::Resolver;
//! use canonize::judgement::Judgement;
//!
//! let mut resolver = Resolver::new();
//! resolver.decide("acme-corp-1", "acme-inc-2", Judgement::Positive, None, None).unwrap();
//! assert_eq!(
//!     resolver.get_canonical("acme-corp-1"),
//!     resolver.get_canonical("acme-inc-2"),
//! );
//! ```

pub mod error;
pub mod index;
pub mod judgement;
pub mod model;
pub mod resolver;
pub mod xref;
