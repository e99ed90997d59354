//! Repositories, the identity map and the relation engine.
//!
//! A [`RepositoryManager`] owns one backend. Recording a model returns its
//! [`Repository`], whose operations hand out [`Object`] handles into the
//! shared cache: a primary key is never represented by two live instances.

mod context;
mod manager;
mod object;
mod relations;
#[allow(clippy::module_inception)]
mod repository;

pub use context::ObjectId;
pub use manager::RepositoryManager;
pub use object::{Collection, Object};
pub use relations::Modification;
pub use repository::Repository;
