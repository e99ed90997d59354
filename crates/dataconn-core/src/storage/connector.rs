//! Driver registry.

use super::document::DocumentDriver;
use super::driver::Driver;
use super::sql::SqlDialect;
use super::sqlite::SqliteDriver;
use super::yaml::YamlDriver;
use crate::error::{Error, Result};
use crate::query::{DocumentQueryManager, PredicateQueryManager, QueryManager, SqlQueryManager};

/// A driver paired with the query manager that speaks its query language.
pub struct DataConnector {
    pub driver: Box<dyn Driver>,
    pub query_manager: Box<dyn QueryManager>,
}

impl DataConnector {
    /// Registered driver names.
    pub const NAMES: [&'static str; 3] = [SqliteDriver::NAME, DocumentDriver::NAME, YamlDriver::NAME];

    pub fn new(driver: Box<dyn Driver>, query_manager: Box<dyn QueryManager>) -> Self {
        Self {
            driver,
            query_manager,
        }
    }

    /// Look a connector up by driver name.
    pub fn by_name(name: &str) -> Result<Self> {
        match name {
            "sqlite3" | "sqlite" => Ok(Self::new(
                Box::new(SqliteDriver::new()),
                Box::new(SqlQueryManager::new(SqlDialect::Sqlite)),
            )),
            "sled" | "document" => Ok(Self::new(
                Box::new(DocumentDriver::new()),
                Box::new(DocumentQueryManager),
            )),
            "yaml" => Ok(Self::new(
                Box::new(YamlDriver::new()),
                Box::new(PredicateQueryManager),
            )),
            other => Err(Error::DriverNotFound(other.to_string())),
        }
    }
}

impl std::fmt::Debug for DataConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataConnector")
            .field("driver", &self.driver.name())
            .field("open", &self.driver.is_open())
            .finish()
    }
}
