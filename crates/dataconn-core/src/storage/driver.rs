//! The driver contract.

use super::table::Table;
use crate::config::Configuration;
use crate::error::Result;
use dataconn_proto::{FilterChain, Line, Value};

/// A parameterized SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub text: String,
    pub parameters: Vec<Value>,
}

/// A query in the form a backend executes.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeQuery {
    /// SQL text with positional parameters.
    Sql(SqlStatement),
    /// A `$and` / `$or` document filter.
    Document(serde_json::Value),
    /// Filters evaluated in memory against every line.
    Predicate(FilterChain),
}

impl NativeQuery {
    pub fn kind(&self) -> &'static str {
        match self {
            NativeQuery::Sql(_) => "sql",
            NativeQuery::Document(_) => "document",
            NativeQuery::Predicate(_) => "predicate",
        }
    }
}

/// Low-level I/O against one backend.
///
/// Drivers know tables and lines only. Identifiers passed to point
/// operations are the primary-key mapping currently stored, which is the
/// old key when the key itself is being updated.
pub trait Driver: Send {
    /// Registry name of the driver.
    fn name(&self) -> &'static str;

    fn is_open(&self) -> bool;

    /// Connect and discover existing tables.
    ///
    /// Fails with `ConnectionAlreadyOpen` when already open.
    fn open(&mut self, config: &Configuration) -> Result<()>;

    /// Create the table's physical structure unless it already exists.
    fn add_table(&mut self, table: Table) -> Result<()>;

    /// Every line of a table.
    fn query_for_lines(&mut self, table: &str) -> Result<Vec<Line>>;

    /// The line with the given primary key.
    fn query_for_line(&mut self, table: &str, identifiers: &Line) -> Result<Option<Line>>;

    /// Lines whose fields equal every value in `matches`.
    fn find_matching_lines(&mut self, table: &str, matches: &Line) -> Result<Vec<Line>>;

    /// Store a new line, returning only the values the backend assigned.
    fn add_line(&mut self, table: &str, line: &Line) -> Result<Line>;

    /// Update one field of one line.
    fn update_line(
        &mut self,
        table: &str,
        identifiers: &Line,
        field: &str,
        value: &Value,
    ) -> Result<()>;

    fn remove_line(&mut self, table: &str, identifiers: &Line) -> Result<()>;

    /// Run a query produced by the matching query manager.
    fn execute(&mut self, table: &str, query: &NativeQuery) -> Result<Vec<Line>>;

    /// Flush deferred writes.
    fn save(&mut self) -> Result<()> {
        Ok(())
    }

    /// Remove every line, keeping tables and auto-increment counters.
    fn clear(&mut self) -> Result<()>;

    /// Release the connection.
    fn close(&mut self) -> Result<()>;

    /// Erase all stored data and close.
    fn destroy(&mut self) -> Result<()>;
}
