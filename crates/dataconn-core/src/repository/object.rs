//! Object and collection handles.

use super::context::{Context, ObjectId};
use crate::catalog::ModelDef;
use crate::error::{Error, Result};
use dataconn_proto::{Line, PrimaryKey, Value};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Handle to a cached model instance.
///
/// Two handles are equal when they refer to the same cached instance. Every
/// accessor takes the repository lock.
#[derive(Clone)]
pub struct Object {
    id: ObjectId,
    model: Arc<ModelDef>,
    context: Arc<Mutex<Context>>,
}

impl Object {
    pub(crate) fn new(id: ObjectId, model: Arc<ModelDef>, context: Arc<Mutex<Context>>) -> Self {
        Self { id, model, context }
    }

    /// Wrap an id whose model is not known to the caller.
    pub(crate) fn from_context(context: &Arc<Mutex<Context>>, guard: &Context, id: ObjectId) -> Result<Self> {
        let model = guard.slot(id)?.model.clone();
        Ok(Self::new(id, model, context.clone()))
    }

    /// Refuse a handle cached by another repository manager. Ids are only
    /// meaningful inside the context that issued them.
    pub(crate) fn check_context(&self, context: &Arc<Mutex<Context>>) -> Result<()> {
        if Arc::ptr_eq(&self.context, context) {
            Ok(())
        } else {
            Err(Error::Usage(format!(
                "{:?} belongs to another repository manager",
                self
            )))
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn model(&self) -> &ModelDef {
        &self.model
    }

    /// Read a registered field.
    pub fn get(&self, field: &str) -> Result<Value> {
        self.context.lock().get_value(self.id, field)
    }

    /// Assign a registered field. The change is validated and persisted at
    /// once; changing a primary key field re-keys the cache.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<()> {
        self.context.lock().set_field(self.id, field, value.into())?;
        Ok(())
    }

    /// The object referenced by a `has_one` field.
    pub fn get_one(&self, field: &str) -> Result<Option<Object>> {
        let mut context = self.context.lock();
        match context.get_one(self.id, field)? {
            Some(id) => Object::from_context(&self.context, &context, id).map(Some),
            None => Ok(None),
        }
    }

    /// Point a `has_one` field at another object, or clear it with `None`.
    pub fn set_one(&self, field: &str, target: Option<&Object>) -> Result<()> {
        if let Some(target) = target {
            target.check_context(&self.context)?;
        }
        self.context
            .lock()
            .set_one(self.id, field, target.map(|t| t.id))
    }

    /// The `has_many` collection behind `field`.
    pub fn many(&self, field: &str) -> Collection {
        Collection {
            owner: self.clone(),
            field: field.to_string(),
        }
    }

    /// Snapshot of the registered field values. A deleted object has none.
    pub fn values(&self) -> Result<Line> {
        Ok(self.context.lock().values(self.id)?.clone())
    }

    pub fn primary_key(&self) -> Result<PrimaryKey> {
        Ok(self.context.lock().slot(self.id)?.key.clone())
    }

    /// Whether both handles refer to the same instance.
    pub fn is(&self, other: &Object) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.context, &other.context)
    }

    pub fn is_deleted(&self) -> bool {
        self.context.lock().is_deleted(self.id)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.is(other)
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.context.try_lock() {
            Some(context) => match context.slot(self.id) {
                Ok(slot) => write!(f, "{}#{}", self.model.name(), slot.key),
                Err(_) => write!(f, "{}{}", self.model.name(), self.id),
            },
            None => write!(f, "{}{}", self.model.name(), self.id),
        }
    }
}

/// A `has_many` collection of an object.
///
/// Membership is backed by the children's foreign keys: adding or removing
/// a member writes the child's key at once.
#[derive(Clone)]
pub struct Collection {
    owner: Object,
    field: String,
}

impl Collection {
    pub fn owner(&self) -> &Object {
        &self.owner
    }

    /// Current members, loaded on first access.
    pub fn list(&self) -> Result<Vec<Object>> {
        let context = &self.owner.context;
        let mut guard = context.lock();
        let ids = guard.load_collection(self.owner.id, &self.field)?;
        ids.into_iter()
            .map(|id| Object::from_context(context, &guard, id))
            .collect()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self
            .owner
            .context
            .lock()
            .load_collection(self.owner.id, &self.field)?
            .len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&self, object: &Object) -> Result<bool> {
        object.check_context(&self.owner.context)?;
        Ok(self
            .owner
            .context
            .lock()
            .load_collection(self.owner.id, &self.field)?
            .contains(&object.id))
    }

    /// Append a member, taking it from its previous owner.
    pub fn push(&self, object: &Object) -> Result<()> {
        object.check_context(&self.owner.context)?;
        self.owner
            .context
            .lock()
            .collection_push(self.owner.id, &self.field, object.id)
    }

    /// Insert a member at `index` (clamped to the length).
    pub fn insert(&self, index: usize, object: &Object) -> Result<()> {
        object.check_context(&self.owner.context)?;
        self.owner
            .context
            .lock()
            .collection_insert(self.owner.id, &self.field, index, object.id)
    }

    /// Remove a member, clearing its foreign key. Returns whether it was a member.
    pub fn remove(&self, object: &Object) -> Result<bool> {
        object.check_context(&self.owner.context)?;
        self.owner
            .context
            .lock()
            .collection_remove(self.owner.id, &self.field, object.id)
    }

    /// Replace the member at `index`, returning the replaced one.
    pub fn set(&self, index: usize, object: &Object) -> Result<Object> {
        object.check_context(&self.owner.context)?;
        let context = &self.owner.context;
        let mut guard = context.lock();
        let replaced = guard.collection_set(self.owner.id, &self.field, index, object.id)?;
        Object::from_context(context, &guard, replaced)
    }

    /// Replace every member.
    pub fn replace(&self, objects: &[Object]) -> Result<()> {
        for object in objects {
            object.check_context(&self.owner.context)?;
        }
        self.owner.context.lock().collection_replace(
            self.owner.id,
            &self.field,
            objects.iter().map(|o| o.id).collect(),
        )
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}.{}", self.owner, self.field)
    }
}
