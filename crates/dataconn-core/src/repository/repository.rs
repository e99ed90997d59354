//! Per-model repository.

use super::context::Context;
use super::object::Object;
use crate::catalog::ModelDef;
use crate::error::{Error, Result};
use crate::query::Query;
use dataconn_proto::{Line, Value};
use parking_lot::Mutex;
use std::sync::Arc;

/// CRUD entry point for one recorded model.
#[derive(Clone)]
pub struct Repository {
    model: Arc<ModelDef>,
    context: Arc<Mutex<Context>>,
}

impl Repository {
    pub(crate) fn new(model: Arc<ModelDef>, context: Arc<Mutex<Context>>) -> Self {
        Self { model, context }
    }

    pub fn model(&self) -> &Arc<ModelDef> {
        &self.model
    }

    fn wrap(&self, ids: Vec<super::ObjectId>) -> Vec<Object> {
        ids.into_iter()
            .map(|id| Object::new(id, self.model.clone(), self.context.clone()))
            .collect()
    }

    /// Every stored object. A key is never returned as two instances.
    pub fn get_all(&self) -> Result<Vec<Object>> {
        let ids = self.context.lock().get_all(&self.model)?;
        Ok(self.wrap(ids))
    }

    /// Find by the value of the single primary key field.
    pub fn find(&self, value: impl Into<Value>) -> Result<Object> {
        if self.model.pkey_fields().len() != 1 {
            return Err(Error::Usage(format!(
                "{} has a composite primary key, use find_by with every key field",
                self.model.name()
            )));
        }
        let mut context = self.context.lock();
        let key = context.coerce_key(&self.model, vec![value.into()])?;
        let id = context.find(&self.model, key)?;
        Ok(Object::new(id, self.model.clone(), self.context.clone()))
    }

    /// Find by naming every primary key field.
    pub fn find_by<K, V>(&self, named: impl IntoIterator<Item = (K, V)>) -> Result<Object>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut named: Line = named
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let names = self.model.pkey_names();
        let mut values = Vec::with_capacity(names.len());
        for name in &names {
            let value = named.remove(name).ok_or_else(|| {
                Error::Usage(format!("find_by on {} requires '{}'", self.model.name(), name))
            })?;
            values.push(value);
        }
        if let Some(extra) = named.keys().next() {
            return Err(Error::Usage(format!(
                "'{}' is not a primary key field of {}",
                extra,
                self.model.name()
            )));
        }

        let mut context = self.context.lock();
        let key = context.coerce_key(&self.model, values)?;
        let id = context.find(&self.model, key)?;
        Ok(Object::new(id, self.model.clone(), self.context.clone()))
    }

    /// Create, persist and cache a new object.
    pub fn create<K, V>(&self, named: impl IntoIterator<Item = (K, V)>) -> Result<Object>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let named: Line = named
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let id = self.context.lock().create(&self.model, named)?;
        Ok(Object::new(id, self.model.clone(), self.context.clone()))
    }

    /// Persist a new value for one field of `object`, returning the old one.
    pub fn update(&self, object: &Object, field: &str, value: impl Into<Value>) -> Result<Value> {
        self.check_model(object)?;
        self.context.lock().set_field(object.id(), field, value.into())
    }

    /// Delete an object. Later mutations through any handle fail.
    pub fn delete(&self, object: &Object) -> Result<()> {
        self.check_model(object)?;
        self.context.lock().delete(object.id())
    }

    /// Start a filtered query.
    pub fn query(&self) -> Query {
        Query::new(self.clone())
    }

    pub(crate) fn run(&self, chain: &dataconn_proto::FilterChain) -> Result<Vec<Object>> {
        let ids = self.context.lock().query_objects(&self.model, chain)?;
        Ok(self.wrap(ids))
    }

    fn check_model(&self, object: &Object) -> Result<()> {
        object.check_context(&self.context)?;
        if object.model().name() != self.model.name() {
            return Err(Error::Usage(format!(
                "the {} repository can not handle a {} object",
                self.model.name(),
                object.model().name()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("model", &self.model.name())
            .finish()
    }
}
