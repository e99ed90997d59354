//! Queries: the builder callers use and the managers translating filter
//! chains for each backend.

mod builder;
mod manager;

pub use builder::{Query, QueryResult};
pub use manager::{DocumentQueryManager, PredicateQueryManager, QueryManager, SqlQueryManager};
