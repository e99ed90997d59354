//! Storage layer: tables, the driver contract and the concrete drivers.
//!
//! Drivers only see [`Table`]s and [`Line`](dataconn_proto::Line)s; model
//! semantics stay in the repository layer.

pub mod connector;
pub mod convert;
pub mod document;
pub mod driver;
pub mod sql;
pub mod sqlite;
pub mod table;
pub mod yaml;

pub use connector::DataConnector;
pub use document::{DocumentConfig, DocumentDriver};
pub use driver::{Driver, NativeQuery, SqlStatement};
pub use sql::SqlDialect;
pub use sqlite::SqliteDriver;
pub use table::{Column, Table};
pub use yaml::YamlDriver;
