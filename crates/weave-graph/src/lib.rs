pub mod graph;
pub mod mapping;
pub mod query;

pub use graph::{DependencyGraph, GraphStats, Relationship, ScanResults, TokenRank};
pub use mapping::{Mapping, MappingIndex};
pub use query::UsageQuery;
