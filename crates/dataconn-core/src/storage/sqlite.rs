//! SQLite driver.

use super::driver::{Driver, NativeQuery, SqlStatement};
use super::sql::SqlDialect;
use super::table::Table;
use crate::catalog::ScalarType;
use crate::config::Configuration;
use crate::error::{Error, Result, StorageError};
use dataconn_proto::{Line, Value};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

/// Location value selecting an in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Driver storing tables in an SQLite database.
///
/// Configuration: `location`, a file path or `:memory:`.
#[derive(Default)]
pub struct SqliteDriver {
    connection: Option<Connection>,
    location: Option<PathBuf>,
    tables: HashMap<String, Table>,
    existing: HashSet<String>,
}

impl SqliteDriver {
    pub const NAME: &'static str = "sqlite3";
    const DIALECT: SqlDialect = SqlDialect::Sqlite;

    pub fn new() -> Self {
        Self::default()
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection
            .as_ref()
            .ok_or_else(|| Error::ConnectionClosed(Self::NAME.to_string()))
    }

    fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| StorageError::UnknownTable(name.to_string()).into())
    }

    fn run(&self, statement: &SqlStatement) -> Result<usize> {
        debug!(sql = %statement.text, parameters = statement.parameters.len(), "Executing statement");
        let connection = self.connection()?;
        let affected = connection.execute(
            &statement.text,
            params_from_iter(statement.parameters.iter().map(to_sql)),
        )?;
        Ok(affected)
    }

    fn select(&self, table: &str, statement: &SqlStatement) -> Result<Vec<Line>> {
        debug!(sql = %statement.text, parameters = statement.parameters.len(), "Executing query");
        let table = self.table(table)?;
        let connection = self.connection()?;
        let mut prepared = connection.prepare(&statement.text)?;
        let names: Vec<String> = prepared
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let rows = prepared.query_map(
            params_from_iter(statement.parameters.iter().map(to_sql)),
            |row| {
                (0..names.len())
                    .map(|i| row.get::<_, SqlValue>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            },
        )?;

        let mut lines = Vec::new();
        for row in rows {
            let raw = row?;
            let mut line = Line::new();
            for column in &table.columns {
                let value = match names.iter().position(|n| n == &column.name) {
                    Some(i) => from_sql(&raw[i], column.scalar)?,
                    None => Value::Null,
                };
                line.insert(column.name.clone(), value);
            }
            lines.push(line);
        }
        Ok(lines)
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    #[instrument(skip(self, config))]
    fn open(&mut self, config: &Configuration) -> Result<()> {
        if self.is_open() {
            return Err(Error::ConnectionAlreadyOpen(Self::NAME.to_string()));
        }
        let location = config.location(Self::NAME)?;
        let connection = if location.as_os_str() == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = location.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Connection::open(&location)?
        };

        let mut existing = HashSet::new();
        {
            let mut statement = connection.prepare(Self::DIALECT.list_tables())?;
            let names = statement.query_map([], |row| row.get::<_, String>(0))?;
            for name in names {
                existing.insert(name?);
            }
        }

        info!(location = %location.display(), tables = existing.len(), "Opened SQLite database");
        self.connection = Some(connection);
        self.location = Some(location);
        self.existing = existing;
        Ok(())
    }

    fn add_table(&mut self, table: Table) -> Result<()> {
        if !self.existing.contains(&table.name) {
            let ddl = Self::DIALECT.create_table(&table);
            debug!(sql = %ddl, "Creating table");
            self.connection()?.execute(&ddl, [])?;
            self.existing.insert(table.name.clone());
        }
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    fn query_for_lines(&mut self, table: &str) -> Result<Vec<Line>> {
        self.select(table, &Self::DIALECT.select_all(table))
    }

    fn query_for_line(&mut self, table: &str, identifiers: &Line) -> Result<Option<Line>> {
        let lines = self.select(table, &Self::DIALECT.select_where(table, identifiers))?;
        Ok(lines.into_iter().next())
    }

    fn find_matching_lines(&mut self, table: &str, matches: &Line) -> Result<Vec<Line>> {
        self.select(table, &Self::DIALECT.select_where(table, matches))
    }

    #[instrument(skip(self, line))]
    fn add_line(&mut self, table: &str, line: &Line) -> Result<Line> {
        let definition = self.table(table)?;
        let statement = Self::DIALECT.insert(definition, line);
        let generated_columns: Vec<String> = definition
            .auto_increment_columns()
            .filter(|c| line.get(&c.name).map_or(true, Value::is_null))
            .map(|c| c.name.clone())
            .collect();

        self.run(&statement)?;
        let row_id = self.connection()?.last_insert_rowid();
        Ok(generated_columns
            .into_iter()
            .map(|name| (name, Value::Int64(row_id)))
            .collect())
    }

    fn update_line(
        &mut self,
        table: &str,
        identifiers: &Line,
        field: &str,
        value: &Value,
    ) -> Result<()> {
        let statement = Self::DIALECT.update(table, identifiers, field, value);
        if self.run(&statement)? == 0 {
            warn!(table, field, "Update matched no line");
        }
        Ok(())
    }

    fn remove_line(&mut self, table: &str, identifiers: &Line) -> Result<()> {
        let statement = Self::DIALECT.delete(table, identifiers);
        if self.run(&statement)? == 0 {
            warn!(table, "Delete matched no line");
        }
        Ok(())
    }

    fn execute(&mut self, table: &str, query: &NativeQuery) -> Result<Vec<Line>> {
        match query {
            NativeQuery::Sql(statement) => self.select(table, statement),
            other => Err(StorageError::UnsupportedQuery(format!(
                "{} driver can not run a {} query",
                Self::NAME,
                other.kind()
            ))
            .into()),
        }
    }

    fn clear(&mut self) -> Result<()> {
        let connection = self.connection()?;
        for name in self.tables.keys() {
            connection.execute(&Self::DIALECT.delete_all(name), [])?;
        }
        info!(tables = self.tables.len(), "Cleared SQLite tables");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(connection) = self.connection.take() {
            connection.close().map_err(|(_, e)| Error::from(e))?;
            info!("Closed SQLite database");
        }
        self.tables.clear();
        self.existing.clear();
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        {
            let connection = self.connection()?;
            let names: HashSet<&String> = self.existing.iter().chain(self.tables.keys()).collect();
            for name in names {
                connection.execute(&Self::DIALECT.drop_table(name), [])?;
            }
            let has_sequence: i64 = connection.query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='sqlite_sequence'",
                [],
                |row| row.get(0),
            )?;
            if has_sequence > 0 {
                connection.execute("DELETE FROM sqlite_sequence", [])?;
            }
        }
        info!(location = ?self.location, "Destroyed SQLite database");
        self.close()
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Int32(i) => SqlValue::Integer(*i as i64),
        Value::Int64(i) | Value::Timestamp(i) => SqlValue::Integer(*i),
        Value::String(s) => SqlValue::Text(s.clone()),
    }
}

fn from_sql(value: &SqlValue, scalar: ScalarType) -> Result<Value> {
    match (scalar, value) {
        (_, SqlValue::Null) => Ok(Value::Null),
        (ScalarType::Integer, SqlValue::Integer(i)) => Ok(Value::Int64(*i)),
        (ScalarType::DateTime, SqlValue::Integer(i)) => Ok(Value::Timestamp(*i)),
        (ScalarType::String, SqlValue::Text(s)) => Ok(Value::String(s.clone())),
        (ScalarType::String, SqlValue::Integer(i)) => Ok(Value::String(i.to_string())),
        _ => Err(Error::DataFormatting(format!(
            "expected {} column value, found {:?}",
            scalar.name(),
            value
        ))),
    }
}
