//! Physical table descriptions handed to drivers.

use crate::catalog::{Constraint, ModelDef, ScalarType};
use dataconn_proto::{Line, PrimaryKey};

/// One stored column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub scalar: ScalarType,
    pub constraint: Constraint,
}

/// A table: physical name and ordered columns.
///
/// Built once from a model's registered fields; drivers never see models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    /// Create a table from explicit columns.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Derive the table of a recorded model, columns ordered by field index.
    pub fn from_model(model: &ModelDef) -> Self {
        let mut fields: Vec<_> = model.registered_fields().collect();
        fields.sort_by_key(|f| f.index());
        let columns = fields
            .into_iter()
            .filter_map(|field| {
                field.scalar_type().map(|scalar| Column {
                    name: field.name.clone(),
                    scalar,
                    constraint: field.constraint.clone(),
                })
            })
            .collect();
        Self::new(model.table_name(), columns)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary key column names, in order.
    pub fn pkey_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.constraint.pkey)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Columns whose values storage assigns.
    pub fn auto_increment_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.constraint.auto_increment)
    }

    /// Extract a line's primary key.
    pub fn primary_key(&self, line: &Line) -> Option<PrimaryKey> {
        PrimaryKey::from_line(line, &self.pkey_names())
    }

    /// Whether `line` carries the values given in `identifiers`.
    pub fn matches(line: &Line, identifiers: &Line) -> bool {
        identifiers
            .iter()
            .all(|(field, value)| line.get(field).map_or(value.is_null(), |v| v.loosely_equals(value)))
    }
}
