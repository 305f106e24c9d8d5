//! The resolution graph: identifiers, judgement edges, and the resolver.

pub mod edge;
pub mod graph;
pub mod identifier;

pub use edge::Edge;
pub use graph::Resolver;
pub use identifier::{Identifier, Pair, SYNTHETIC_PREFIX, is_qid};
