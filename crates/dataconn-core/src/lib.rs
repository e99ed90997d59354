//! dataconn core
//!
//! A data-access layer mapping declared models onto interchangeable
//! storage backends:
//!
//! - **catalog**: field and model declarations, constraints and resolved relations
//! - **storage**: tables, the [`Driver`] contract and the SQLite, sled and YAML drivers
//! - **query**: the filter query builder and per-backend query managers
//! - **repository**: the identity-mapped cache, CRUD and the relation engine
//!
//! # Example
//!
//! ```rust,no_run
//! use dataconn_core::{Configuration, FieldDef, ModelDef, RepositoryManager};
//!
//! let manager = RepositoryManager::connect(&Configuration::for_driver("yaml", "./data"))?;
//! let repositories = manager.record_models(vec![
//!     ModelDef::new("Group")
//!         .with_field(FieldDef::string("name"))
//!         .with_field(FieldDef::has_many("users", "User")),
//!     ModelDef::new("User")
//!         .with_field(FieldDef::string("username"))
//!         .with_field(FieldDef::has_one("group", "Group")),
//! ])?;
//! let (groups, users) = (&repositories[0], &repositories[1]);
//!
//! let admins = groups.create([("name", "admins")])?;
//! let user = users.create([("username", "Kredh")])?;
//! admins.many("users").push(&user)?;
//! assert!(user.get_one("group")?.is_some_and(|g| g.is(&admins)));
//! # Ok::<(), dataconn_core::Error>(())
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod query;
pub mod repository;
pub mod storage;

pub use catalog::{Catalog, Constraint, FieldDef, FieldType, ModelDef, RelationKind, ScalarType};
pub use config::Configuration;
pub use error::{Error, ErrorKind, RelationError, Result, StorageError};
pub use query::{Query, QueryResult};
pub use repository::{Collection, Modification, Object, ObjectId, Repository, RepositoryManager};
pub use storage::{DataConnector, Driver, Table};

pub use dataconn_proto::{Line, PrimaryKey, Value};
