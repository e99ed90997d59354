//! Query managers: translate filter chains into each backend's native query.

use crate::error::Result;
use crate::storage::document::document_operator;
use crate::storage::sql::SqlDialect;
use crate::storage::{convert, NativeQuery, SqlStatement, Table};
use dataconn_proto::{Filter, FilterChain, Operator, Value};
use serde_json::json;
use tracing::debug;

/// Translates a filter chain into a query its driver runs.
///
/// Every manager groups the chain the same way: filters joined by `and`
/// form a group, groups joined by `or` are alternatives.
pub trait QueryManager: Send {
    fn translate(&self, table: &Table, chain: &FilterChain) -> Result<NativeQuery>;
}

/// Builds parameterized `SELECT` statements.
#[derive(Debug, Clone, Copy)]
pub struct SqlQueryManager {
    dialect: SqlDialect,
}

impl SqlQueryManager {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    fn condition(&self, filter: &Filter, parameters: &mut Vec<Value>) -> String {
        let column = self.dialect.quote(&filter.field);
        let parameter = filter.parameter();
        match (filter.operator, parameter.is_null()) {
            (Operator::Eq, true) => return format!("{} IS NULL", column),
            (Operator::Ne, true) => return format!("{} IS NOT NULL", column),
            _ => {}
        }
        parameters.push(parameter.clone());
        let placeholder = self.dialect.placeholder(parameters.len());
        match filter.operator {
            Operator::Contains => self.dialect.contains(&column, &placeholder),
            Operator::Ne => self.dialect.not_equal(&column, &placeholder),
            op => format!("{} {} {}", column, op.symbol(), placeholder),
        }
    }
}

impl QueryManager for SqlQueryManager {
    fn translate(&self, table: &Table, chain: &FilterChain) -> Result<NativeQuery> {
        if chain.is_empty() {
            return Ok(NativeQuery::Sql(self.dialect.select_all(&table.name)));
        }

        let groups = chain.groups();
        let mut parameters = Vec::new();
        let clauses: Vec<String> = groups
            .iter()
            .map(|group| {
                let conditions: Vec<String> = group
                    .iter()
                    .map(|filter| self.condition(filter, &mut parameters))
                    .collect();
                if groups.len() > 1 && conditions.len() > 1 {
                    format!("({})", conditions.join(" AND "))
                } else {
                    conditions.join(" AND ")
                }
            })
            .collect();

        let statement = SqlStatement {
            text: format!(
                "SELECT * FROM {} WHERE {}",
                self.dialect.quote(&table.name),
                clauses.join(" OR ")
            ),
            parameters,
        };
        debug!(sql = %statement.text, "Translated filters");
        Ok(NativeQuery::Sql(statement))
    }
}

/// Builds `$and` / `$or` document filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentQueryManager;

impl QueryManager for DocumentQueryManager {
    fn translate(&self, table: &Table, chain: &FilterChain) -> Result<NativeQuery> {
        if chain.is_empty() {
            return Ok(NativeQuery::Document(json!({})));
        }
        let groups: Vec<serde_json::Value> = chain
            .groups()
            .into_iter()
            .map(|group| {
                let conditions: Vec<serde_json::Value> = group
                    .into_iter()
                    .map(|filter| {
                        json!({
                            filter.field.clone(): {
                                document_operator(filter.operator): convert::value_to_json(filter.parameter())
                            }
                        })
                    })
                    .collect();
                json!({ "$and": conditions })
            })
            .collect();
        let document = json!({ "$or": groups });
        debug!(table = %table.name, filter = %document, "Translated filters");
        Ok(NativeQuery::Document(document))
    }
}

/// Hands the chain to the driver for in-memory evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredicateQueryManager;

impl QueryManager for PredicateQueryManager {
    fn translate(&self, _table: &Table, chain: &FilterChain) -> Result<NativeQuery> {
        Ok(NativeQuery::Predicate(chain.clone()))
    }
}
