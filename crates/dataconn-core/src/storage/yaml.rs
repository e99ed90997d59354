//! Flat-file YAML driver.
//!
//! Each table is stored as `<location>/<table>.yml`, a sequence whose first
//! element is a header and whose remaining elements are flat mappings:
//!
//! ```yaml
//! - auto_increments:
//!     id: 3
//! - id: 1
//!   username: Kredh
//! - id: 2
//!   username: Nitrate
//! ```
//!
//! The header stores the next value of every auto-increment column. Tables
//! are held in memory and written back on `save` and `close`.

use super::convert::{line_to_yaml, yaml_to_line};
use super::driver::{Driver, NativeQuery};
use super::table::Table;
use crate::config::Configuration;
use crate::error::{Error, Result, StorageError};
use dataconn_proto::{Line, Value};
use serde_yaml::{Mapping, Value as Yaml};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

const HEADER_INCREMENTS: &str = "auto_increments";
const EXTENSION: &str = "yml";

struct FlatFile {
    table: Table,
    path: PathBuf,
    increments: BTreeMap<String, i64>,
    lines: Vec<Line>,
    dirty: bool,
}

impl FlatFile {
    fn read(table: Table, path: PathBuf) -> Result<Self> {
        let source = std::fs::read_to_string(&path)?;
        let document: Yaml = serde_yaml::from_str(&source)?;
        let Yaml::Sequence(elements) = document else {
            return Err(Error::DataFormatting(format!(
                "{} must contain a YAML sequence",
                path.display()
            )));
        };

        let mut elements = elements.into_iter();
        let increments = match elements.next() {
            Some(Yaml::Mapping(header)) => read_header(&path, &header)?,
            Some(Yaml::Null) | None => BTreeMap::new(),
            Some(other) => {
                return Err(Error::DataFormatting(format!(
                    "the header of {} is not a mapping: {:?}",
                    path.display(),
                    other
                )))
            }
        };

        let mut lines = Vec::new();
        for (position, element) in elements.enumerate() {
            match element {
                Yaml::Mapping(mapping) => lines.push(yaml_to_line(&table, &mapping)?),
                other => warn!(
                    file = %path.display(),
                    position = position + 1,
                    element = ?other,
                    "Discarding line that is not a mapping"
                ),
            }
        }

        Ok(Self {
            table,
            path,
            increments,
            lines,
            dirty: false,
        })
    }

    fn write(&mut self) -> Result<()> {
        let mut header = Mapping::new();
        if !self.increments.is_empty() {
            let increments: Mapping = self
                .increments
                .iter()
                .map(|(field, next)| (Yaml::String(field.clone()), Yaml::Number((*next).into())))
                .collect();
            header.insert(Yaml::String(HEADER_INCREMENTS.into()), Yaml::Mapping(increments));
        }

        let mut elements = Vec::with_capacity(self.lines.len() + 1);
        elements.push(Yaml::Mapping(header));
        elements.extend(
            self.lines
                .iter()
                .map(|line| Yaml::Mapping(line_to_yaml(&self.table, line))),
        );

        let content = serde_yaml::to_string(&Yaml::Sequence(elements))?;
        std::fs::write(&self.path, content)?;
        self.dirty = false;
        debug!(file = %self.path.display(), lines = self.lines.len(), "Wrote table file");
        Ok(())
    }

    fn position(&self, identifiers: &Line) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| Table::matches(line, identifiers))
    }

    fn duplicate(&self, line: &Line, skip: Option<usize>) -> Result<()> {
        let Some(key) = self.table.primary_key(line) else {
            return Ok(());
        };
        let taken = self.lines.iter().enumerate().any(|(i, other)| {
            Some(i) != skip && self.table.primary_key(other).as_ref() == Some(&key)
        });
        if taken {
            return Err(StorageError::DuplicateKey {
                table: self.table.name.clone(),
                pkey: key.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn read_header(path: &Path, header: &Mapping) -> Result<BTreeMap<String, i64>> {
    let mut increments = BTreeMap::new();
    match header.get(HEADER_INCREMENTS) {
        None | Some(Yaml::Null) => {}
        Some(Yaml::Mapping(fields)) => {
            for (field, next) in fields {
                match (field.as_str(), next.as_i64()) {
                    (Some(field), Some(next)) => {
                        increments.insert(field.to_string(), next);
                    }
                    _ => warn!(
                        file = %path.display(),
                        field = ?field,
                        "Ignoring malformed auto-increment entry"
                    ),
                }
            }
        }
        Some(other) => {
            return Err(Error::DataFormatting(format!(
                "{} in {} must be a mapping, got {:?}",
                HEADER_INCREMENTS,
                path.display(),
                other
            )))
        }
    }
    Ok(increments)
}

/// Driver storing each table in a flat YAML file.
///
/// Configuration: `location`, the directory holding the files. It is
/// created when missing.
#[derive(Default)]
pub struct YamlDriver {
    location: Option<PathBuf>,
    files: HashMap<String, FlatFile>,
}

impl YamlDriver {
    pub const NAME: &'static str = "yaml";

    pub fn new() -> Self {
        Self::default()
    }

    fn location(&self) -> Result<&Path> {
        self.location
            .as_deref()
            .ok_or_else(|| Error::ConnectionClosed(Self::NAME.to_string()))
    }

    fn file(&self, table: &str) -> Result<&FlatFile> {
        self.files
            .get(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()).into())
    }

    fn file_mut(&mut self, table: &str) -> Result<&mut FlatFile> {
        self.files
            .get_mut(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()).into())
    }
}

impl Driver for YamlDriver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_open(&self) -> bool {
        self.location.is_some()
    }

    #[instrument(skip(self, config))]
    fn open(&mut self, config: &Configuration) -> Result<()> {
        if self.is_open() {
            return Err(Error::ConnectionAlreadyOpen(Self::NAME.to_string()));
        }
        let location = config.location(Self::NAME)?;
        std::fs::create_dir_all(&location)?;
        info!(location = %location.display(), "Opened YAML directory");
        self.location = Some(location);
        Ok(())
    }

    fn add_table(&mut self, table: Table) -> Result<()> {
        let path = self
            .location()?
            .join(format!("{}.{}", table.name, EXTENSION));
        let name = table.name.clone();
        let file = if path.exists() {
            FlatFile::read(table, path)?
        } else {
            let mut file = FlatFile {
                table,
                path,
                increments: BTreeMap::new(),
                lines: Vec::new(),
                dirty: true,
            };
            file.write()?;
            file
        };
        debug!(table = %name, lines = file.lines.len(), "Loaded table file");
        self.files.insert(name, file);
        Ok(())
    }

    fn query_for_lines(&mut self, table: &str) -> Result<Vec<Line>> {
        Ok(self.file(table)?.lines.clone())
    }

    fn query_for_line(&mut self, table: &str, identifiers: &Line) -> Result<Option<Line>> {
        let file = self.file(table)?;
        Ok(file.position(identifiers).map(|i| file.lines[i].clone()))
    }

    fn find_matching_lines(&mut self, table: &str, matches: &Line) -> Result<Vec<Line>> {
        Ok(self
            .file(table)?
            .lines
            .iter()
            .filter(|line| Table::matches(line, matches))
            .cloned()
            .collect())
    }

    fn add_line(&mut self, table: &str, line: &Line) -> Result<Line> {
        let file = self.file_mut(table)?;
        let auto_columns: Vec<String> = file
            .table
            .auto_increment_columns()
            .filter(|c| line.get(&c.name).map_or(true, Value::is_null))
            .map(|c| c.name.clone())
            .collect();

        let mut generated = Line::new();
        let mut increments = file.increments.clone();
        for column in auto_columns {
            let next = increments.get(&column).copied().unwrap_or(1);
            increments.insert(column.clone(), next + 1);
            generated.insert(column, Value::Int64(next));
        }

        let mut stored = line.clone();
        stored.extend(generated.clone());
        file.duplicate(&stored, None)?;

        file.increments = increments;
        file.lines.push(stored);
        file.dirty = true;
        Ok(generated)
    }

    fn update_line(
        &mut self,
        table: &str,
        identifiers: &Line,
        field: &str,
        value: &Value,
    ) -> Result<()> {
        let file = self.file_mut(table)?;
        let Some(index) = file.position(identifiers) else {
            warn!(table, field, "Update matched no line");
            return Ok(());
        };
        let mut updated = file.lines[index].clone();
        updated.insert(field.to_string(), value.clone());
        file.duplicate(&updated, Some(index))?;
        file.lines[index] = updated;
        file.dirty = true;
        Ok(())
    }

    fn remove_line(&mut self, table: &str, identifiers: &Line) -> Result<()> {
        let file = self.file_mut(table)?;
        let before = file.lines.len();
        file.lines.retain(|line| !Table::matches(line, identifiers));
        if file.lines.len() == before {
            warn!(table, "Delete matched no line");
        } else {
            file.dirty = true;
        }
        Ok(())
    }

    fn execute(&mut self, table: &str, query: &NativeQuery) -> Result<Vec<Line>> {
        match query {
            NativeQuery::Predicate(chain) => Ok(self
                .file(table)?
                .lines
                .iter()
                .filter(|line| chain.matches(line))
                .cloned()
                .collect()),
            other => Err(StorageError::UnsupportedQuery(format!(
                "{} driver can not run a {} query",
                Self::NAME,
                other.kind()
            ))
            .into()),
        }
    }

    fn save(&mut self) -> Result<()> {
        for file in self.files.values_mut().filter(|f| f.dirty) {
            file.write()?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        for file in self.files.values_mut() {
            file.lines.clear();
            file.dirty = true;
        }
        info!(tables = self.files.len(), "Cleared YAML tables");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.is_open() {
            self.save()?;
            info!(location = ?self.location, "Closed YAML directory");
        }
        self.files.clear();
        self.location = None;
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        let location = self.location()?.to_path_buf();
        for entry in std::fs::read_dir(&location)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION) {
                std::fs::remove_file(&path)?;
            }
        }
        info!(location = %location.display(), "Destroyed YAML directory");
        self.files.clear();
        self.location = None;
        Ok(())
    }
}
