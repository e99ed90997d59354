//! Model catalog.
//!
//! The catalog stores model declarations, their fields and constraints, and
//! the relations resolved between them.

#[allow(clippy::module_inception)]
mod catalog;
mod constraint;
mod field;
mod model;
mod relation;
mod types;

pub use catalog::Catalog;
pub use constraint::Constraint;
pub use field::{DefaultValue, FieldDef};
pub use model::{plural, ModelDef, DEFAULT_KEY};
pub use relation::{foreign_key_name, RelationDef, RelationKind};
pub use types::{FieldType, ScalarType};
