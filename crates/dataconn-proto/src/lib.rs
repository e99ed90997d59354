//! dataconn shared types.
//!
//! This crate defines the types exchanged between the filter language, the
//! drivers and the repository layer.
//!
//! # Modules
//!
//! - [`value`] - Runtime values stored in lines and bound as query parameters
//! - [`line`] - Raw storage records and primary keys
//! - [`filter`] - Operator registry, filters and connector chains
//! - [`error`] - Errors raised while building filters

pub mod error;
pub mod filter;
pub mod line;
pub mod value;

pub use error::Error;
pub use filter::{Connector, Filter, FilterChain, Operator, Orientation};
pub use line::{Line, PrimaryKey};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_over_line() {
        let mut line = Line::new();
        line.insert("username".into(), Value::from("Kredh"));
        line.insert("id".into(), Value::Int64(3));

        let mut chain = FilterChain::new();
        chain.push(
            Connector::And,
            Filter::new("username", Operator::Eq, vec!["Kredh".into()]).unwrap(),
        );
        chain.push(
            Connector::And,
            Filter::new("id", Operator::Le, vec![Value::Int64(3)]).unwrap(),
        );
        assert!(chain.matches(&line));
    }
}
