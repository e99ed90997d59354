//! Operator registry, filters and connector chains.

use crate::error::Error;
use crate::line::Line;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Where the field name sits relative to the placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// `field op ?`
    FieldFirst,
    /// `? op field`
    ValueFirst,
}

/// A registered filter operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Equal (`=`).
    Eq,
    /// Not equal (`!=`).
    Ne,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Le,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Ge,
    /// `? in field`: the field's text contains the parameter.
    Contains,
}

impl Operator {
    /// Every registered operator.
    pub const ALL: [Operator; 7] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Le,
        Operator::Gt,
        Operator::Ge,
        Operator::Contains,
    ];

    /// The operator's text in a filter expression.
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Contains => "in",
        }
    }

    /// Look an operator up by its text.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    /// The syntax this operator expects.
    pub fn orientation(&self) -> Orientation {
        match self {
            Operator::Contains => Orientation::ValueFirst,
            _ => Orientation::FieldFirst,
        }
    }

    /// Number of parameters the operator binds.
    pub fn parameter_count(&self) -> usize {
        1
    }

    /// Evaluate the operator against a stored value.
    ///
    /// Ordering comparisons involving null or mismatched types are false.
    pub fn evaluate(&self, stored: &Value, parameter: &Value) -> bool {
        match self {
            Operator::Eq => stored.loosely_equals(parameter),
            Operator::Ne => !stored.loosely_equals(parameter),
            Operator::Lt => stored.compare(parameter) == Some(Ordering::Less),
            Operator::Le => matches!(
                stored.compare(parameter),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Gt => stored.compare(parameter) == Some(Ordering::Greater),
            Operator::Ge => matches!(
                stored.compare(parameter),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Contains => match (stored, parameter) {
                (Value::String(text), Value::String(needle)) => text.contains(needle.as_str()),
                _ => false,
            },
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Boolean connector joining two consecutive filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connector {
    #[default]
    And,
    Or,
}

impl FromStr for Connector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "and" => Ok(Connector::And),
            "or" => Ok(Connector::Or),
            _ => Err(Error::InvalidConnector(s.to_string())),
        }
    }
}

/// A single filter: a field, an operator and typed parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Field name being filtered.
    pub field: String,
    /// Comparison operator.
    pub operator: Operator,
    /// Bound parameters, never re-parsed from text.
    pub parameters: Vec<Value>,
}

impl Filter {
    /// Create a filter, checking the parameter count against the operator.
    pub fn new(
        field: impl Into<String>,
        operator: Operator,
        parameters: Vec<Value>,
    ) -> Result<Self, Error> {
        if parameters.len() != operator.parameter_count() {
            return Err(Error::ParameterCount {
                operator: operator.symbol(),
                expected: operator.parameter_count(),
                actual: parameters.len(),
            });
        }
        Ok(Self {
            field: field.into(),
            operator,
            parameters,
        })
    }

    /// The first bound parameter.
    pub fn parameter(&self) -> &Value {
        self.parameters.first().unwrap_or(&Value::Null)
    }

    /// Evaluate the filter against a line. A missing field reads as null.
    pub fn matches(&self, line: &Line) -> bool {
        let stored = line.get(&self.field).unwrap_or(&Value::Null);
        self.operator.evaluate(stored, self.parameter())
    }
}

/// An ordered list of filters joined by connectors.
///
/// `connectors[i]` joins `filters[i]` and `filters[i + 1]`. `and` binds
/// tighter than `or`: the chain is split into groups at every `or`, filters
/// inside a group are ANDed and groups are ORed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterChain {
    filters: Vec<Filter>,
    connectors: Vec<Connector>,
}

impl FilterChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter. The connector joins it to the previous filter and
    /// is ignored for the first one.
    pub fn push(&mut self, connector: Connector, filter: Filter) {
        if !self.filters.is_empty() {
            self.connectors.push(connector);
        }
        self.filters.push(filter);
    }

    /// The filters in order.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// The connectors in order.
    pub fn connectors(&self) -> &[Connector] {
        &self.connectors
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Split the chain into AND-groups separated by `or` connectors.
    pub fn groups(&self) -> Vec<Vec<&Filter>> {
        let mut groups = Vec::new();
        let mut current = Vec::new();
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 && self.connectors[i - 1] == Connector::Or {
                groups.push(std::mem::take(&mut current));
            }
            current.push(filter);
        }
        if !current.is_empty() {
            groups.push(current);
        }
        groups
    }

    /// Evaluate the whole chain against a line. An empty chain matches.
    pub fn matches(&self, line: &Line) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        self.groups()
            .iter()
            .any(|group| group.iter().all(|filter| filter.matches(line)))
    }
}
