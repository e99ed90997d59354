//! The shared repository context: driver, catalog, object arena and
//! identity map.
//!
//! ```text
//! identity:  model -> PrimaryKey -> ObjectId
//! slots:     ObjectId -> Slot { values, loaded collections, deleted }
//!            (deleted slots are tombstones holding only model and key)
//! deleted:   (model, PrimaryKey) of every object deleted since open
//! ```
//!
//! Handles refer to objects by `ObjectId`, so a primary key change only swaps
//! the identity map entry. Every method here runs with the context lock held.

use crate::catalog::{Catalog, ModelDef};
use crate::error::{Error, Result};
use crate::storage::{DataConnector, Table};
use dataconn_proto::{FilterChain, Line, PrimaryKey, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Stable arena index of a cached object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One cached object, or the tombstone of a deleted one.
pub(crate) struct Slot {
    pub(crate) model: Arc<ModelDef>,
    pub(crate) key: PrimaryKey,
    pub(crate) values: Line,
    /// Loaded `HasMany` collections, by field name.
    pub(crate) collections: HashMap<String, Vec<ObjectId>>,
    pub(crate) deleted: bool,
}

pub(crate) struct Context {
    pub(crate) connector: DataConnector,
    pub(crate) catalog: Catalog,
    tables: HashMap<String, Table>,
    slots: HashMap<ObjectId, Slot>,
    identity: HashMap<String, HashMap<PrimaryKey, ObjectId>>,
    deleted: HashSet<(String, PrimaryKey)>,
    next_id: u64,
}

impl Context {
    pub(crate) fn new(connector: DataConnector) -> Self {
        Self {
            connector,
            catalog: Catalog::new(),
            tables: HashMap::new(),
            slots: HashMap::new(),
            identity: HashMap::new(),
            deleted: HashSet::new(),
            next_id: 1,
        }
    }

    /// Record models and create their tables.
    pub(crate) fn record(&mut self, batch: Vec<ModelDef>) -> Result<Vec<Arc<ModelDef>>> {
        let models = self.catalog.record(batch)?;
        for model in &models {
            let table = Table::from_model(model);
            info!(
                model = model.name(),
                table = %table.name,
                columns = table.columns.len(),
                "Recorded model"
            );
            self.connector.driver.add_table(table.clone())?;
            self.tables.insert(model.name().to_string(), table);
        }
        Ok(models)
    }

    pub(crate) fn model(&self, name: &str) -> Result<Arc<ModelDef>> {
        self.catalog
            .model(name)
            .cloned()
            .ok_or_else(|| Error::UnknownModel(name.to_string()))
    }

    pub(crate) fn slot(&self, id: ObjectId) -> Result<&Slot> {
        self.slots
            .get(&id)
            .ok_or_else(|| Error::Usage(format!("object {} is not cached", id)))
    }

    fn slot_mut(&mut self, id: ObjectId) -> Result<&mut Slot> {
        self.slots
            .get_mut(&id)
            .ok_or_else(|| Error::Usage(format!("object {} is not cached", id)))
    }

    pub(crate) fn slot_mut_unchecked(&mut self, id: ObjectId) -> Option<&mut Slot> {
        self.slots.get_mut(&id)
    }

    /// The slot of an object that may still be modified.
    pub(crate) fn check_live(&self, id: ObjectId) -> Result<&Slot> {
        let slot = self.slot(id)?;
        let key = (slot.model.name().to_string(), slot.key.clone());
        if slot.deleted || self.deleted.contains(&key) {
            return Err(Error::UpdateDeletedObject {
                model: key.0,
                pkey: key.1,
            });
        }
        Ok(slot)
    }

    /// Turn a slot into a tombstone. Stale handles still find the model and
    /// key to report, but the values and loaded collections are released.
    fn bury(slot: &mut Slot) {
        slot.deleted = true;
        slot.values = Line::new();
        slot.collections = HashMap::new();
    }

    /// Field values of an object that still exists.
    pub(crate) fn values(&self, id: ObjectId) -> Result<&Line> {
        let slot = self.slot(id)?;
        if slot.deleted {
            return Err(Error::ObjectNotFound {
                model: slot.model.name().to_string(),
                pkey: slot.key.clone(),
            });
        }
        Ok(&slot.values)
    }

    pub(crate) fn is_deleted(&self, id: ObjectId) -> bool {
        self.slots.get(&id).map_or(true, |slot| slot.deleted)
    }

    /// Identity map lookup.
    pub(crate) fn cached(&self, model: &str, key: &PrimaryKey) -> Option<ObjectId> {
        self.identity.get(model).and_then(|keys| keys.get(key)).copied()
    }

    /// Normalize caller-supplied key values to the key fields' types.
    pub(crate) fn coerce_key(&self, model: &ModelDef, values: Vec<Value>) -> Result<PrimaryKey> {
        let fields = model.pkey_fields();
        if fields.len() != values.len() {
            return Err(Error::Usage(format!(
                "{} has {} primary key field(s), {} value(s) given",
                model.name(),
                fields.len(),
                values.len()
            )));
        }
        let values = fields
            .iter()
            .zip(values)
            .map(|(field, value)| field.accept_value(model.name(), value))
            .collect::<Result<Vec<_>>>()?;
        Ok(PrimaryKey::new(values))
    }

    /// Convert a stored line into a cached object, reusing the cached
    /// instance when the key is already known. Deleted keys yield `None`.
    pub(crate) fn load_line(&mut self, model: &Arc<ModelDef>, line: Line) -> Result<Option<ObjectId>> {
        let key = PrimaryKey::from_line(&line, &model.pkey_names()).ok_or_else(|| {
            Error::DataFormatting(format!(
                "stored line of {} lacks its primary key",
                model.name()
            ))
        })?;
        if self.deleted.contains(&(model.name().to_string(), key.clone())) {
            return Ok(None);
        }
        if let Some(id) = self.cached(model.name(), &key) {
            return Ok(Some(id));
        }
        Ok(Some(self.insert_slot(model.clone(), key, line)))
    }

    fn insert_slot(&mut self, model: Arc<ModelDef>, key: PrimaryKey, values: Line) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.identity
            .entry(model.name().to_string())
            .or_default()
            .insert(key.clone(), id);
        self.slots.insert(
            id,
            Slot {
                model,
                key,
                values,
                collections: HashMap::new(),
                deleted: false,
            },
        );
        id
    }

    pub(crate) fn find(&mut self, model: &Arc<ModelDef>, key: PrimaryKey) -> Result<ObjectId> {
        let not_found = || Error::ObjectNotFound {
            model: model.name().to_string(),
            pkey: key.clone(),
        };
        if self.deleted.contains(&(model.name().to_string(), key.clone())) {
            return Err(not_found());
        }
        if let Some(id) = self.cached(model.name(), &key) {
            return Ok(id);
        }
        let identifiers = key.to_line(&model.pkey_names());
        let line = self
            .connector
            .driver
            .query_for_line(&model.table_name(), &identifiers)?;
        match line {
            Some(line) => self.load_line(model, line)?.ok_or_else(not_found),
            None => Err(not_found()),
        }
    }

    pub(crate) fn get_all(&mut self, model: &Arc<ModelDef>) -> Result<Vec<ObjectId>> {
        let lines = self.connector.driver.query_for_lines(&model.table_name())?;
        self.load_lines(model, lines)
    }

    pub(crate) fn query_objects(&mut self, model: &Arc<ModelDef>, chain: &FilterChain) -> Result<Vec<ObjectId>> {
        let table = self
            .tables
            .get(model.name())
            .ok_or_else(|| Error::UnknownModel(model.name().to_string()))?;
        let native = self.connector.query_manager.translate(table, chain)?;
        debug!(model = model.name(), kind = native.kind(), filters = chain.len(), "Running query");
        let lines = self.connector.driver.execute(&table.name, &native)?;
        self.load_lines(model, lines)
    }

    pub(crate) fn load_lines(&mut self, model: &Arc<ModelDef>, lines: Vec<Line>) -> Result<Vec<ObjectId>> {
        let mut ids = Vec::with_capacity(lines.len());
        for line in lines {
            if let Some(id) = self.load_line(model, line)? {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Build, persist and cache a new object.
    ///
    /// Fields are filled in registration order: the supplied value, else the
    /// default (computed defaults see the fields filled before them), else
    /// null. Auto-increment fields are left to storage.
    pub(crate) fn create(&mut self, model: &Arc<ModelDef>, mut named: Line) -> Result<ObjectId> {
        for name in named.keys() {
            match model.field(name) {
                None => {
                    return Err(Error::UnknownField {
                        model: model.name().to_string(),
                        field: name.clone(),
                    })
                }
                Some(field) if field.field_type.is_relation() => {
                    return Err(Error::Usage(format!(
                        "{}.{} is a relation, set it on the created object",
                        model.name(),
                        name
                    )))
                }
                Some(_) => {}
            }
        }

        let mut fields: Vec<_> = model.registered_fields().collect();
        fields.sort_by_key(|f| f.index());
        let mut line = Line::new();
        for field in fields {
            let supplied = named.remove(&field.name);
            if !field.constraint.accepts_caller_value() {
                if supplied.as_ref().is_some_and(|v| !v.is_null()) {
                    return Err(Error::InvalidValue {
                        model: model.name().to_string(),
                        field: field.name.clone(),
                        reason: "the value is assigned by storage".into(),
                    });
                }
                line.insert(field.name.clone(), Value::Null);
                continue;
            }
            let value = match (supplied, &field.default) {
                (Some(value), _) => value,
                (None, Some(default)) => default.resolve(&line),
                (None, None) => Value::Null,
            };
            let value = field.accept_value(model.name(), value)?;
            line.insert(field.name.clone(), value);
        }

        let pkey_names = model.pkey_names();
        if let Some(key) = PrimaryKey::from_line(&line, &pkey_names).filter(|k| !k.has_null()) {
            self.ensure_free(model, &key)?;
        }

        let table = model.table_name();
        let generated = self.connector.driver.add_line(&table, &line)?;
        line.extend(generated);
        let key = PrimaryKey::from_line(&line, &pkey_names)
            .filter(|k| !k.has_null())
            .ok_or_else(|| {
                Error::DataFormatting(format!("{} did not receive a primary key", model.name()))
            })?;
        self.deleted.remove(&(model.name().to_string(), key.clone()));

        let foreign_keys: Vec<(String, Value)> = line
            .iter()
            .filter(|(field, value)| {
                !value.is_null() && self.catalog.foreign_key_relation(model.name(), field).is_some()
            })
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();

        debug!(model = model.name(), pkey = %key, "Created object");
        let id = self.insert_slot(model.clone(), key, line);
        for (field, value) in foreign_keys {
            self.sync_collections(id, &field, &Value::Null, &value)?;
        }
        Ok(id)
    }

    /// Fail with `Conflict` if a live object or a stored line holds `key`.
    fn ensure_free(&mut self, model: &ModelDef, key: &PrimaryKey) -> Result<()> {
        let conflict = || Error::Conflict {
            model: model.name().to_string(),
            pkey: key.clone(),
        };
        if let Some(id) = self.cached(model.name(), key) {
            if !self.is_deleted(id) {
                return Err(conflict());
            }
        }
        let identifiers = key.to_line(&model.pkey_names());
        if self
            .connector
            .driver
            .query_for_line(&model.table_name(), &identifiers)?
            .is_some()
        {
            return Err(conflict());
        }
        Ok(())
    }

    /// Read a registered field.
    pub(crate) fn get_value(&self, id: ObjectId, field: &str) -> Result<Value> {
        let values = self.values(id)?;
        let slot = self.slot(id)?;
        let definition = slot.model.field(field).ok_or_else(|| Error::UnknownField {
            model: slot.model.name().to_string(),
            field: field.to_string(),
        })?;
        if definition.field_type.is_relation() {
            return Err(Error::Usage(format!(
                "{}.{} is a {} relation, not a value",
                slot.model.name(),
                field,
                definition.field_type.name()
            )));
        }
        Ok(values.get(field).cloned().unwrap_or(Value::Null))
    }

    /// Validate, persist and cache a new value for a registered field.
    /// Returns the previous value.
    pub(crate) fn set_field(&mut self, id: ObjectId, field: &str, value: Value) -> Result<Value> {
        let slot = self.check_live(id)?;
        let model = slot.model.clone();
        let definition = model.field(field).ok_or_else(|| Error::UnknownField {
            model: model.name().to_string(),
            field: field.to_string(),
        })?;
        if definition.field_type.is_relation() {
            return Err(Error::Usage(format!(
                "{}.{} is a relation, use the relation accessors",
                model.name(),
                field
            )));
        }
        if !definition.constraint.accepts_caller_value() {
            return Err(Error::InvalidValue {
                model: model.name().to_string(),
                field: field.to_string(),
                reason: "the value is assigned by storage".into(),
            });
        }
        let value = definition.accept_value(model.name(), value)?;
        let old = slot.values.get(field).cloned().unwrap_or(Value::Null);
        if old == value {
            return Ok(old);
        }

        if definition.is_pkey() {
            let mut values = slot.key.values().to_vec();
            let position = model
                .pkey_names()
                .iter()
                .position(|name| name == field)
                .unwrap_or_default();
            values[position] = value.clone();
            let new_key = PrimaryKey::new(values);
            self.ensure_free(&model, &new_key)?;
            let old_key = self.slot(id)?.key.clone();
            self.persist_field(id, field, value.clone())?;
            self.cascade_key_change(id, &old_key)?;
        } else if self.catalog.foreign_key_relation(model.name(), field).is_some() {
            self.write_foreign_key(id, field, value)?;
        } else {
            self.persist_field(id, field, value)?;
        }
        Ok(old)
    }

    /// Write one field through the driver and into the cache, re-keying the
    /// identity map when the field belongs to the primary key.
    pub(crate) fn persist_field(&mut self, id: ObjectId, field: &str, value: Value) -> Result<()> {
        let slot = self.check_live(id)?;
        let model = slot.model.clone();
        let pkey_names = model.pkey_names();
        let identifiers = slot.key.to_line(&pkey_names);
        self.connector
            .driver
            .update_line(&model.table_name(), &identifiers, field, &value)?;

        let slot = self.slot_mut(id)?;
        slot.values.insert(field.to_string(), value);
        if pkey_names.iter().any(|name| name == field) {
            let old_key = slot.key.clone();
            let new_key = PrimaryKey::from_line(&slot.values, &pkey_names).unwrap_or_else(|| old_key.clone());
            slot.key = new_key.clone();
            if let Some(keys) = self.identity.get_mut(model.name()) {
                keys.remove(&old_key);
                keys.insert(new_key.clone(), id);
            }
            debug!(model = model.name(), from = %old_key, to = %new_key, "Re-keyed object");
        }
        Ok(())
    }

    /// Remove an object's line and mark it deleted.
    ///
    /// Children in its collections lose their foreign key, and the object
    /// leaves the loaded collections of its owners.
    pub(crate) fn delete(&mut self, id: ObjectId) -> Result<()> {
        let slot = self.check_live(id)?;
        let model = slot.model.clone();
        let key = slot.key.clone();

        let collections: Vec<_> = self
            .catalog
            .collections_of(model.name())
            .into_iter()
            .cloned()
            .collect();
        for relation in collections {
            let children = self.load_collection(id, &relation.field)?;
            self.affect(id, &relation, &children, &[], super::Modification::Delete)?;
        }

        let foreign_keys: Vec<(String, Value)> = self
            .slot(id)?
            .values
            .iter()
            .filter(|(field, value)| {
                !value.is_null() && self.catalog.foreign_key_relation(model.name(), field).is_some()
            })
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        for (field, value) in foreign_keys {
            self.sync_collections(id, &field, &value, &Value::Null)?;
        }

        let identifiers = key.to_line(&model.pkey_names());
        self.connector
            .driver
            .remove_line(&model.table_name(), &identifiers)?;
        if let Some(keys) = self.identity.get_mut(model.name()) {
            keys.remove(&key);
        }
        Self::bury(self.slot_mut(id)?);
        debug!(model = model.name(), pkey = %key, "Deleted object");
        self.deleted.insert((model.name().to_string(), key));
        Ok(())
    }

    /// Drop every cached object, after the driver removed all lines.
    pub(crate) fn forget_objects(&mut self) {
        for slot in self.slots.values_mut() {
            Self::bury(slot);
        }
        self.identity.clear();
        self.deleted.clear();
    }
}
