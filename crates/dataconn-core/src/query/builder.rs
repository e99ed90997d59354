//! Filter query builder.

use crate::error::{Error, Result};
use crate::repository::{Object, Repository};
use dataconn_lang::LangError;
use dataconn_proto::{Connector, Filter, FilterChain, Operator, Value};

/// Result of [`Query::execute_with`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Many(Vec<Object>),
    One(Option<Object>),
}

/// A query over one model, built filter by filter.
///
/// ```text
/// users.query()
///     .filter("id >= ?", 2)?
///     .or_filter("? in username", "red")?
///     .execute()?
/// ```
///
/// `and` binds tighter than `or`: the example matches users with an id of at
/// least 2, plus every user whose name contains "red".
#[derive(Debug, Clone)]
pub struct Query {
    repository: Repository,
    chain: FilterChain,
}

impl Query {
    pub(crate) fn new(repository: Repository) -> Self {
        Self {
            repository,
            chain: FilterChain::new(),
        }
    }

    /// Add a filter joined with `and`.
    pub fn filter(self, expression: &str, parameter: impl Into<Value>) -> Result<Self> {
        self.push(Connector::And, expression, vec![parameter.into()])
    }

    /// Add a filter joined with `or`.
    pub fn or_filter(self, expression: &str, parameter: impl Into<Value>) -> Result<Self> {
        self.push(Connector::Or, expression, vec![parameter.into()])
    }

    /// Add a filter joined with `and`, binding every parameter.
    pub fn filter_params(self, expression: &str, parameters: Vec<Value>) -> Result<Self> {
        self.push(Connector::And, expression, parameters)
    }

    /// Add a filter with an explicit connector (`"and"` or `"or"`).
    pub fn filter_with(self, connector: &str, expression: &str, parameters: Vec<Value>) -> Result<Self> {
        let connector: Connector = connector.parse().map_err(LangError::from)?;
        self.push(connector, expression, parameters)
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }

    /// Every matching object.
    pub fn execute(&self) -> Result<Vec<Object>> {
        self.repository.run(&self.chain)
    }

    /// The first matching object.
    pub fn first(&self) -> Result<Option<Object>> {
        Ok(self.execute()?.into_iter().next())
    }

    pub fn execute_with(&self, many: bool) -> Result<QueryResult> {
        if many {
            self.execute().map(QueryResult::Many)
        } else {
            self.first().map(QueryResult::One)
        }
    }

    fn push(mut self, connector: Connector, expression: &str, parameters: Vec<Value>) -> Result<Self> {
        let filter = dataconn_lang::compile(expression, parameters)?;
        let filter = self.check(filter)?;
        self.chain.push(connector, filter);
        Ok(self)
    }

    /// Check the field and bring the parameters to its type.
    fn check(&self, filter: Filter) -> Result<Filter> {
        let model = self.repository.model();
        let field = model
            .field(&filter.field)
            .filter(|f| f.register)
            .ok_or_else(|| Error::UnknownField {
                model: model.name().to_string(),
                field: filter.field.clone(),
            })?;
        let scalar = field.scalar_type().ok_or_else(|| Error::UnknownField {
            model: model.name().to_string(),
            field: filter.field.clone(),
        })?;
        let invalid = |reason: String| Error::InvalidValue {
            model: model.name().to_string(),
            field: filter.field.clone(),
            reason,
        };

        if filter.operator == Operator::Contains && scalar != crate::catalog::ScalarType::String {
            return Err(invalid(format!(
                "'{}' only applies to string fields",
                Operator::Contains
            )));
        }
        let parameters = filter
            .parameters
            .iter()
            .cloned()
            .map(|value| {
                let found = value.type_name();
                scalar
                    .coerce(value)
                    .ok_or_else(|| invalid(format!("expected {}, got {}", scalar.name(), found)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Filter::new(filter.field, filter.operator, parameters).map_err(LangError::from)?)
    }
}
