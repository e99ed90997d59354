//! SQL statement generation for the SQL-family backends.

use super::driver::SqlStatement;
use super::table::{Column, Table};
use crate::catalog::ScalarType;
use dataconn_proto::{Line, Value};

/// SQL dialect: placeholder format and column type mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    /// `?` placeholders, `AUTOINCREMENT` keys.
    Sqlite,
    /// `$1`, `$2`, … placeholders, `SERIAL` keys.
    Postgres,
}

impl SqlDialect {
    /// Placeholder for the parameter at 1-based `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::Sqlite => "?".to_string(),
            SqlDialect::Postgres => format!("${}", index),
        }
    }

    /// Quote an identifier.
    pub fn quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Inequality that also matches null columns.
    pub fn not_equal(&self, column: &str, placeholder: &str) -> String {
        match self {
            SqlDialect::Sqlite => format!("{} IS NOT {}", column, placeholder),
            SqlDialect::Postgres => format!("{} IS DISTINCT FROM {}", column, placeholder),
        }
    }

    /// Case-sensitive substring test. The parameter is taken literally,
    /// `%` and `_` included.
    pub fn contains(&self, column: &str, placeholder: &str) -> String {
        match self {
            SqlDialect::Sqlite => format!("instr({}, {}) > 0", column, placeholder),
            SqlDialect::Postgres => format!("strpos({}, {}) > 0", column, placeholder),
        }
    }

    /// Native type of a column.
    pub fn column_type(&self, column: &Column) -> &'static str {
        match (self, column.scalar) {
            (SqlDialect::Postgres, ScalarType::Integer) if column.constraint.auto_increment => {
                "SERIAL"
            }
            (SqlDialect::Sqlite, ScalarType::Integer) => "integer",
            (SqlDialect::Postgres, ScalarType::Integer) => "numeric",
            (_, ScalarType::String) => "text",
            (SqlDialect::Sqlite, ScalarType::DateTime) => "integer",
            (SqlDialect::Postgres, ScalarType::DateTime) => "bigint",
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` statement.
    pub fn create_table(&self, table: &Table) -> String {
        let keys = table.pkey_names();
        let single_key = keys.len() == 1;
        let mut definitions: Vec<String> = table
            .columns
            .iter()
            .map(|column| {
                let mut definition =
                    format!("{} {}", self.quote(&column.name), self.column_type(column));
                if single_key && column.constraint.pkey {
                    definition.push_str(" PRIMARY KEY");
                    if *self == SqlDialect::Sqlite && column.constraint.auto_increment {
                        definition.push_str(" AUTOINCREMENT");
                    }
                }
                definition
            })
            .collect();
        if keys.len() > 1 {
            let quoted: Vec<String> = keys.iter().map(|k| self.quote(k)).collect();
            definitions.push(format!("PRIMARY KEY ({})", quoted.join(", ")));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.quote(&table.name),
            definitions.join(", ")
        )
    }

    /// Query listing the user tables already present.
    pub fn list_tables(&self) -> &'static str {
        match self {
            SqlDialect::Sqlite => {
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'"
            }
            SqlDialect::Postgres => {
                "SELECT table_name FROM information_schema.tables WHERE table_schema='public'"
            }
        }
    }

    pub fn select_all(&self, table: &str) -> SqlStatement {
        SqlStatement {
            text: format!("SELECT * FROM {}", self.quote(table)),
            parameters: Vec::new(),
        }
    }

    /// Select the lines matching every identifier.
    pub fn select_where(&self, table: &str, identifiers: &Line) -> SqlStatement {
        let mut parameters = Vec::new();
        let clause = self.where_clause(identifiers, &mut parameters);
        SqlStatement {
            text: format!("SELECT * FROM {} WHERE {}", self.quote(table), clause),
            parameters,
        }
    }

    /// Insert a line. Null auto-increment columns are left to the database;
    /// on Postgres their values are returned.
    pub fn insert(&self, table: &Table, line: &Line) -> SqlStatement {
        let mut names = Vec::new();
        let mut placeholders = Vec::new();
        let mut parameters = Vec::new();
        for column in &table.columns {
            let value = line.get(&column.name).cloned().unwrap_or(Value::Null);
            if column.constraint.auto_increment && value.is_null() {
                continue;
            }
            parameters.push(value);
            names.push(self.quote(&column.name));
            placeholders.push(self.placeholder(parameters.len()));
        }

        let mut text = if names.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.quote(&table.name))
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.quote(&table.name),
                names.join(", "),
                placeholders.join(", ")
            )
        };
        if *self == SqlDialect::Postgres {
            let returning: Vec<String> = table
                .auto_increment_columns()
                .map(|c| self.quote(&c.name))
                .collect();
            if !returning.is_empty() {
                text.push_str(&format!(" RETURNING {}", returning.join(", ")));
            }
        }
        SqlStatement { text, parameters }
    }

    /// Update one field of the line with the given identifiers.
    pub fn update(&self, table: &str, identifiers: &Line, field: &str, value: &Value) -> SqlStatement {
        let mut parameters = vec![value.clone()];
        let assignment = format!("{} = {}", self.quote(field), self.placeholder(1));
        let clause = self.where_clause(identifiers, &mut parameters);
        SqlStatement {
            text: format!(
                "UPDATE {} SET {} WHERE {}",
                self.quote(table),
                assignment,
                clause
            ),
            parameters,
        }
    }

    pub fn delete(&self, table: &str, identifiers: &Line) -> SqlStatement {
        let mut parameters = Vec::new();
        let clause = self.where_clause(identifiers, &mut parameters);
        SqlStatement {
            text: format!("DELETE FROM {} WHERE {}", self.quote(table), clause),
            parameters,
        }
    }

    pub fn delete_all(&self, table: &str) -> String {
        format!("DELETE FROM {}", self.quote(table))
    }

    pub fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote(table))
    }

    /// Equality conditions joined with AND, numbering placeholders after
    /// the parameters already bound.
    fn where_clause(&self, identifiers: &Line, parameters: &mut Vec<Value>) -> String {
        if identifiers.is_empty() {
            return "1 = 1".to_string();
        }
        let conditions: Vec<String> = identifiers
            .iter()
            .map(|(field, value)| {
                if value.is_null() {
                    format!("{} IS NULL", self.quote(field))
                } else {
                    parameters.push(value.clone());
                    format!("{} = {}", self.quote(field), self.placeholder(parameters.len()))
                }
            })
            .collect();
        conditions.join(" AND ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Constraint, ScalarType};
    use pretty_assertions::assert_eq;

    fn users() -> Table {
        Table::new(
            "users",
            vec![
                Column {
                    name: "id".into(),
                    scalar: ScalarType::Integer,
                    constraint: Constraint {
                        pkey: true,
                        auto_increment: true,
                        ..Default::default()
                    },
                },
                Column {
                    name: "username".into(),
                    scalar: ScalarType::String,
                    constraint: Constraint::default(),
                },
            ],
        )
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(SqlDialect::Sqlite.placeholder(3), "?");
        assert_eq!(SqlDialect::Postgres.placeholder(3), "$3");
    }

    #[test]
    fn test_create_table() {
        assert_eq!(
            SqlDialect::Sqlite.create_table(&users()),
            "CREATE TABLE IF NOT EXISTS \"users\" (\"id\" integer PRIMARY KEY AUTOINCREMENT, \"username\" text)"
        );
        assert_eq!(
            SqlDialect::Postgres.create_table(&users()),
            "CREATE TABLE IF NOT EXISTS \"users\" (\"id\" SERIAL PRIMARY KEY, \"username\" text)"
        );
    }

    #[test]
    fn test_create_table_composite_key() {
        let key = |name: &str| Column {
            name: name.into(),
            scalar: ScalarType::Integer,
            constraint: Constraint {
                pkey: true,
                ..Default::default()
            },
        };
        let table = Table::new("seats", vec![key("row"), key("number")]);
        assert_eq!(
            SqlDialect::Sqlite.create_table(&table),
            "CREATE TABLE IF NOT EXISTS \"seats\" (\"row\" integer, \"number\" integer, PRIMARY KEY (\"row\", \"number\"))"
        );
    }

    #[test]
    fn test_insert_skips_auto_increment() {
        let mut line = Line::new();
        line.insert("id".into(), Value::Null);
        line.insert("username".into(), Value::from("Kredh"));

        let statement = SqlDialect::Sqlite.insert(&users(), &line);
        assert_eq!(statement.text, "INSERT INTO \"users\" (\"username\") VALUES (?)");
        assert_eq!(statement.parameters, vec![Value::from("Kredh")]);

        let statement = SqlDialect::Postgres.insert(&users(), &line);
        assert_eq!(
            statement.text,
            "INSERT INTO \"users\" (\"username\") VALUES ($1) RETURNING \"id\""
        );
    }

    #[test]
    fn test_update_numbers_placeholders() {
        let mut identifiers = Line::new();
        identifiers.insert("id".into(), Value::Int64(4));
        let statement =
            SqlDialect::Postgres.update("users", &identifiers, "username", &Value::from("x"));
        assert_eq!(
            statement.text,
            "UPDATE \"users\" SET \"username\" = $1 WHERE \"id\" = $2"
        );
        assert_eq!(statement.parameters, vec![Value::from("x"), Value::Int64(4)]);
    }

    #[test]
    fn test_null_identifier() {
        let mut identifiers = Line::new();
        identifiers.insert("group_id".into(), Value::Null);
        let statement = SqlDialect::Sqlite.select_where("users", &identifiers);
        assert_eq!(statement.text, "SELECT * FROM \"users\" WHERE \"group_id\" IS NULL");
        assert!(statement.parameters.is_empty());
    }
}
