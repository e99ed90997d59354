//! Document driver backed by sled.
//!
//! Every table is a sled tree named `table:<name>` holding one JSON document
//! per line, keyed by the JSON array of its primary key values. Auto-increment
//! counters live in a separate `increments` tree and are never rewound, so
//! deleted keys are not reused.

use super::convert::{json_to_line, json_to_value, line_to_json, value_to_json};
use super::driver::{Driver, NativeQuery};
use super::table::Table;
use crate::config::Configuration;
use crate::error::{Error, Result, StorageError};
use dataconn_proto::{Line, Operator, Value};
use sled::{Db, Tree};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

/// Prefix of the trees holding table documents.
const TABLE_PREFIX: &str = "table:";

/// Tree holding auto-increment counters, keyed by `<table>.<column>`.
const INCREMENTS_TREE: &str = "increments";

/// Tuning for the sled database.
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// Path to the database directory.
    pub path: PathBuf,

    /// Page cache capacity in bytes.
    pub cache_capacity: u64,

    /// Flush interval in milliseconds. None means flush on save only.
    pub flush_every_ms: Option<u64>,

    /// Enable zstd compression.
    pub compression: bool,

    /// Temporary database (deleted on drop).
    pub temporary: bool,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./dataconn_data"),
            cache_capacity: 64 * 1024 * 1024, // 64MB
            flush_every_ms: Some(1000),
            compression: false,
            temporary: false,
        }
    }
}

impl DocumentConfig {
    /// Read the driver keys: `location`, `cache_capacity`, `flush_every_ms`,
    /// `compression` and `temporary`. `location` may be omitted for a
    /// temporary database.
    pub fn from_configuration(config: &Configuration) -> Result<Self> {
        let defaults = Self::default();
        let temporary = config.get_bool("temporary").unwrap_or(false);
        let path = if temporary && config.get("location").is_none() {
            PathBuf::new()
        } else {
            config.location(DocumentDriver::NAME)?
        };
        Ok(Self {
            path,
            cache_capacity: config
                .get_u64("cache_capacity")?
                .unwrap_or(defaults.cache_capacity),
            flush_every_ms: config.get_u64("flush_every_ms")?.or(defaults.flush_every_ms),
            compression: config.get_bool("compression").unwrap_or(defaults.compression),
            temporary,
        })
    }

    /// Convert to sled configuration.
    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression)
            .flush_every_ms(self.flush_every_ms);

        if self.temporary {
            config = config.temporary(true);
        }
        if !self.path.as_os_str().is_empty() {
            config = config.path(&self.path);
        }
        config
    }
}

struct Collection {
    table: Table,
    tree: Tree,
}

/// Driver storing lines as JSON documents in sled trees.
#[derive(Default)]
pub struct DocumentDriver {
    db: Option<Db>,
    increments: Option<Tree>,
    collections: HashMap<String, Collection>,
}

impl DocumentDriver {
    pub const NAME: &'static str = "sled";

    pub fn new() -> Self {
        Self::default()
    }

    fn db(&self) -> Result<&Db> {
        self.db
            .as_ref()
            .ok_or_else(|| Error::ConnectionClosed(Self::NAME.to_string()))
    }

    fn collection(&self, name: &str) -> Result<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| StorageError::UnknownTable(name.to_string()).into())
    }

    /// Next counter value for an auto-increment column.
    fn next_increment(&self, table: &str, column: &str) -> Result<i64> {
        let increments = self
            .increments
            .as_ref()
            .ok_or_else(|| Error::ConnectionClosed(Self::NAME.to_string()))?;
        let key = format!("{}.{}", table, column);
        let updated = increments.update_and_fetch(key.as_bytes(), |old| {
            let current = old
                .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
                .map(i64::from_be_bytes)
                .unwrap_or(0);
            Some((current + 1).to_be_bytes().to_vec())
        })?;
        updated
            .and_then(|bytes| <[u8; 8]>::try_from(&bytes[..]).ok())
            .map(i64::from_be_bytes)
            .ok_or_else(|| Error::DataFormatting(format!("corrupt counter for {}", key)))
    }

    /// Every line of a collection, decoded.
    fn scan(collection: &Collection) -> Result<Vec<Line>> {
        let mut lines = Vec::new();
        for entry in collection.tree.iter() {
            let (_, bytes) = entry?;
            lines.push(decode(&collection.table, &bytes)?);
        }
        Ok(lines)
    }
}

/// Storage key of a line: the JSON array of its primary key values.
/// `None` when the line lacks a key column.
fn key_of(table: &Table, line: &Line) -> Result<Option<Vec<u8>>> {
    let mut values = Vec::new();
    for name in table.pkey_names() {
        match line.get(name) {
            Some(value) => values.push(value_to_json(value)),
            None => return Ok(None),
        }
    }
    Ok(Some(serde_json::to_vec(&values)?))
}

fn encode(line: &Line) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&line_to_json(line))?)
}

fn decode(table: &Table, bytes: &[u8]) -> Result<Line> {
    let document: serde_json::Value = serde_json::from_slice(bytes)?;
    match document {
        serde_json::Value::Object(object) => json_to_line(table, &object),
        other => Err(Error::DataFormatting(format!(
            "document in '{}' is not an object: {}",
            table.name, other
        ))),
    }
}

/// Query operator name of a filter operator.
pub fn document_operator(operator: Operator) -> &'static str {
    match operator {
        Operator::Eq => "$eq",
        Operator::Ne => "$ne",
        Operator::Lt => "$lt",
        Operator::Le => "$lte",
        Operator::Gt => "$gt",
        Operator::Ge => "$gte",
        Operator::Contains => "$contains",
    }
}

fn operator_from_document(name: &str) -> Option<Operator> {
    Operator::ALL
        .into_iter()
        .find(|op| document_operator(*op) == name)
}

/// Evaluate a `$and` / `$or` document query against a line.
///
/// Leaf conditions have the form `{"field": {"$op": parameter}}`; an empty
/// object matches everything.
pub fn evaluate_document(table: &Table, query: &serde_json::Value, line: &Line) -> Result<bool> {
    let object = query.as_object().ok_or_else(|| {
        StorageError::UnsupportedQuery(format!("expected a query object, found {}", query))
    })?;
    for (key, condition) in object {
        let matched = match key.as_str() {
            "$and" | "$or" => {
                let branches = condition.as_array().ok_or_else(|| {
                    StorageError::UnsupportedQuery(format!("{} expects an array", key))
                })?;
                let mut results = Vec::with_capacity(branches.len());
                for branch in branches {
                    results.push(evaluate_document(table, branch, line)?);
                }
                if key == "$and" {
                    results.into_iter().all(|r| r)
                } else {
                    results.into_iter().any(|r| r)
                }
            }
            field => evaluate_condition(table, field, condition, line)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn evaluate_condition(
    table: &Table,
    field: &str,
    condition: &serde_json::Value,
    line: &Line,
) -> Result<bool> {
    let column = table.column(field).ok_or_else(|| {
        StorageError::UnsupportedQuery(format!("'{}' has no column '{}'", table.name, field))
    })?;
    let operators = condition.as_object().ok_or_else(|| {
        StorageError::UnsupportedQuery(format!("condition on '{}' must be an object", field))
    })?;
    let stored = line.get(field).unwrap_or(&Value::Null);
    for (name, parameter) in operators {
        let operator = operator_from_document(name).ok_or_else(|| {
            StorageError::UnsupportedQuery(format!("unknown query operator '{}'", name))
        })?;
        let parameter = json_to_value(parameter, column.scalar)?;
        if !operator.evaluate(stored, &parameter) {
            return Ok(false);
        }
    }
    Ok(true)
}

impl Driver for DocumentDriver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_open(&self) -> bool {
        self.db.is_some()
    }

    #[instrument(skip(self, config))]
    fn open(&mut self, config: &Configuration) -> Result<()> {
        if self.is_open() {
            return Err(Error::ConnectionAlreadyOpen(Self::NAME.to_string()));
        }
        let settings = DocumentConfig::from_configuration(config)?;
        let db = settings.to_sled_config().open()?;
        let increments = db.open_tree(INCREMENTS_TREE)?;
        info!(
            path = %settings.path.display(),
            temporary = settings.temporary,
            recovered = db.was_recovered(),
            "Opened document store"
        );
        self.db = Some(db);
        self.increments = Some(increments);
        Ok(())
    }

    fn add_table(&mut self, table: Table) -> Result<()> {
        let tree = self.db()?.open_tree(format!("{}{}", TABLE_PREFIX, table.name))?;
        debug!(table = %table.name, lines = tree.len(), "Opened collection");
        self.collections
            .insert(table.name.clone(), Collection { table, tree });
        Ok(())
    }

    fn query_for_lines(&mut self, table: &str) -> Result<Vec<Line>> {
        Self::scan(self.collection(table)?)
    }

    fn query_for_line(&mut self, table: &str, identifiers: &Line) -> Result<Option<Line>> {
        let collection = self.collection(table)?;
        match key_of(&collection.table, identifiers)? {
            Some(key) => match collection.tree.get(key)? {
                Some(bytes) => Ok(Some(decode(&collection.table, &bytes)?)),
                None => Ok(None),
            },
            None => Ok(Self::scan(collection)?
                .into_iter()
                .find(|line| Table::matches(line, identifiers))),
        }
    }

    fn find_matching_lines(&mut self, table: &str, matches: &Line) -> Result<Vec<Line>> {
        let lines = Self::scan(self.collection(table)?)?;
        Ok(lines
            .into_iter()
            .filter(|line| Table::matches(line, matches))
            .collect())
    }

    #[instrument(skip(self, line))]
    fn add_line(&mut self, table: &str, line: &Line) -> Result<Line> {
        let auto_columns: Vec<String> = self
            .collection(table)?
            .table
            .auto_increment_columns()
            .filter(|c| line.get(&c.name).map_or(true, Value::is_null))
            .map(|c| c.name.clone())
            .collect();

        let mut generated = Line::new();
        for column in auto_columns {
            let next = self.next_increment(table, &column)?;
            generated.insert(column, Value::Int64(next));
        }

        let collection = self.collection(table)?;
        let mut stored = line.clone();
        stored.extend(generated.clone());
        let key = key_of(&collection.table, &stored)?.ok_or_else(|| {
            Error::DataFormatting(format!("line for '{}' lacks its primary key", table))
        })?;
        debug!(table, key = %hex::encode(&key), "Inserting document");

        let swapped = collection
            .tree
            .compare_and_swap(&key, None as Option<&[u8]>, Some(encode(&stored)?))?;
        if swapped.is_err() {
            return Err(StorageError::DuplicateKey {
                table: table.to_string(),
                pkey: String::from_utf8_lossy(&key).into_owned(),
            }
            .into());
        }
        Ok(generated)
    }

    fn update_line(
        &mut self,
        table: &str,
        identifiers: &Line,
        field: &str,
        value: &Value,
    ) -> Result<()> {
        let collection = self.collection(table)?;
        let Some(old_key) = key_of(&collection.table, identifiers)? else {
            return Err(StorageError::UnsupportedQuery(format!(
                "update on '{}' requires the full primary key",
                table
            ))
            .into());
        };
        let Some(bytes) = collection.tree.get(&old_key)? else {
            warn!(table, field, "Update matched no document");
            return Ok(());
        };

        let mut line = decode(&collection.table, &bytes)?;
        line.insert(field.to_string(), value.clone());
        let new_key = key_of(&collection.table, &line)?.unwrap_or_else(|| old_key.clone());
        let encoded = encode(&line)?;

        if new_key == old_key {
            collection.tree.insert(&old_key, encoded)?;
        } else {
            let swapped =
                collection
                    .tree
                    .compare_and_swap(&new_key, None as Option<&[u8]>, Some(encoded))?;
            if swapped.is_err() {
                return Err(StorageError::DuplicateKey {
                    table: table.to_string(),
                    pkey: String::from_utf8_lossy(&new_key).into_owned(),
                }
                .into());
            }
            collection.tree.remove(&old_key)?;
            debug!(
                table,
                from = %hex::encode(&old_key),
                to = %hex::encode(&new_key),
                "Moved document"
            );
        }
        Ok(())
    }

    fn remove_line(&mut self, table: &str, identifiers: &Line) -> Result<()> {
        let collection = self.collection(table)?;
        match key_of(&collection.table, identifiers)? {
            Some(key) => {
                if collection.tree.remove(&key)?.is_none() {
                    warn!(table, "Delete matched no document");
                }
            }
            None => {
                for entry in collection.tree.iter() {
                    let (key, bytes) = entry?;
                    if Table::matches(&decode(&collection.table, &bytes)?, identifiers) {
                        collection.tree.remove(key)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn execute(&mut self, table: &str, query: &NativeQuery) -> Result<Vec<Line>> {
        let collection = self.collection(table)?;
        match query {
            NativeQuery::Document(document) => {
                let mut lines = Vec::new();
                for line in Self::scan(collection)? {
                    if evaluate_document(&collection.table, document, &line)? {
                        lines.push(line);
                    }
                }
                Ok(lines)
            }
            other => Err(StorageError::UnsupportedQuery(format!(
                "{} driver can not run a {} query",
                Self::NAME,
                other.kind()
            ))
            .into()),
        }
    }

    fn save(&mut self) -> Result<()> {
        let flushed = self.db()?.flush()?;
        debug!(bytes = flushed, "Flushed document store");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        for collection in self.collections.values() {
            collection.tree.clear()?;
        }
        info!(tables = self.collections.len(), "Cleared collections");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(db) = self.db.take() {
            db.flush()?;
            info!("Closed document store");
        }
        self.increments = None;
        self.collections.clear();
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        {
            let db = self.db()?;
            for name in db.tree_names() {
                let is_table = name.starts_with(TABLE_PREFIX.as_bytes());
                if is_table || name.as_ref() == INCREMENTS_TREE.as_bytes() {
                    db.drop_tree(&name)?;
                }
            }
        }
        info!("Destroyed document store");
        self.close()
    }
}
