//! Relation engine.
//!
//! A `HasMany` collection is never stored: its membership is the set of
//! objects whose foreign-key scalar holds the owner's key. Every change goes
//! through that scalar, and loaded collections of the old and new owners are
//! patched in the same step so both sides stay consistent.

use super::context::{Context, ObjectId};
use crate::catalog::{FieldType, RelationDef, RelationKind};
use crate::error::{Error, Result};
use dataconn_proto::{Line, PrimaryKey, Value};
use tracing::debug;

/// How a collection changed, as seen by [`Context::affect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modification {
    /// The old objects were removed.
    Delete,
    /// The old objects were replaced by the new ones.
    Modify,
    /// The new objects were added.
    Add,
}

impl Context {
    /// The single key value of an object, as stored in foreign keys.
    fn key_value(&self, id: ObjectId) -> Result<Value> {
        let slot = self.slot(id)?;
        match slot.key.values() {
            [value] => Ok(value.clone()),
            _ => Err(Error::Usage(format!(
                "{} has a composite primary key and can not be referenced",
                slot.model.name()
            ))),
        }
    }

    /// The resolved relation of a `HasMany` field.
    fn collection_relation(&self, owner: ObjectId, field: &str) -> Result<RelationDef> {
        let model = self.slot(owner)?.model.clone();
        let definition = model.field(field).ok_or_else(|| Error::UnknownField {
            model: model.name().to_string(),
            field: field.to_string(),
        })?;
        if !matches!(definition.field_type, FieldType::HasMany { .. }) {
            return Err(Error::Usage(format!(
                "{}.{} is not a has_many collection",
                model.name(),
                field
            )));
        }
        self.catalog
            .relation(model.name(), field)
            .filter(|r| r.kind == RelationKind::ManyToOne)
            .cloned()
            .ok_or_else(|| Error::Usage(format!("{}.{} is not resolved", model.name(), field)))
    }

    /// The resolved relation of a `HasOne` field. `BelongTo` fields are
    /// rejected: they only expose the many-to-one direction.
    fn reference_relation(&self, id: ObjectId, field: &str) -> Result<RelationDef> {
        let model = self.slot(id)?.model.clone();
        let definition = model.field(field).ok_or_else(|| Error::UnknownField {
            model: model.name().to_string(),
            field: field.to_string(),
        })?;
        match definition.field_type {
            FieldType::HasOne { .. } => {}
            FieldType::BelongTo { .. } => {
                return Err(Error::Usage(format!(
                    "{}.{} is a belong_to field and can not be read or written directly",
                    model.name(),
                    field
                )))
            }
            _ => {
                return Err(Error::Usage(format!(
                    "{}.{} is not a has_one reference",
                    model.name(),
                    field
                )))
            }
        }
        self.catalog
            .relation(model.name(), field)
            .cloned()
            .ok_or_else(|| Error::Usage(format!("{}.{} is not resolved", model.name(), field)))
    }

    /// A live object of the expected model.
    fn check_target(&self, id: ObjectId, model: &str) -> Result<()> {
        let slot = self.check_live(id)?;
        if slot.model.name() != model {
            return Err(Error::Usage(format!(
                "expected a {} object, got a {}",
                model,
                slot.model.name()
            )));
        }
        Ok(())
    }

    /// The object referenced by a `HasOne` field.
    pub(crate) fn get_one(&mut self, id: ObjectId, field: &str) -> Result<Option<ObjectId>> {
        let relation = self.reference_relation(id, field)?;
        let value = self.get_value(id, &relation.foreign_key)?;
        if value.is_null() {
            return Ok(None);
        }
        let foreign = self.model(&relation.foreign_model)?;
        self.find(&foreign, PrimaryKey::single(value)).map(Some)
    }

    /// Point a `HasOne` field at `target`, or clear it.
    pub(crate) fn set_one(&mut self, id: ObjectId, field: &str, target: Option<ObjectId>) -> Result<()> {
        self.check_live(id)?;
        let relation = self.reference_relation(id, field)?;
        let value = match target {
            Some(target) => {
                self.check_target(target, &relation.foreign_model)?;
                self.key_value(target)?
            }
            None => Value::Null,
        };
        self.write_foreign_key(id, &relation.foreign_key, value)
    }

    /// Write a foreign-key scalar and move the object between the loaded
    /// collections it feeds.
    pub(crate) fn write_foreign_key(&mut self, id: ObjectId, field: &str, value: Value) -> Result<()> {
        let old = self
            .check_live(id)?
            .values
            .get(field)
            .cloned()
            .unwrap_or(Value::Null);
        if old == value {
            return Ok(());
        }
        self.persist_field(id, field, value.clone())?;
        self.sync_collections(id, field, &old, &value)
    }

    /// Patch the loaded collections fed by `child.field` after its value
    /// went from `old` to `new`.
    pub(crate) fn sync_collections(
        &mut self,
        child: ObjectId,
        field: &str,
        old: &Value,
        new: &Value,
    ) -> Result<()> {
        let model = self.slot(child)?.model.clone();
        let relations: Vec<RelationDef> = self
            .catalog
            .collections_fed_by(model.name(), field)
            .into_iter()
            .cloned()
            .collect();

        for relation in relations {
            if !old.is_null() {
                let owner = self.cached(&relation.model, &PrimaryKey::single(old.clone()));
                if let Some(owner) = owner {
                    if let Some(members) = self.owner_collection(owner, &relation.field) {
                        members.retain(|member| *member != child);
                    }
                }
            }
            if !new.is_null() {
                let owner = self.cached(&relation.model, &PrimaryKey::single(new.clone()));
                if let Some(owner) = owner {
                    if let Some(members) = self.owner_collection(owner, &relation.field) {
                        if !members.contains(&child) {
                            members.push(child);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Loaded members of a collection, `None` when not loaded yet.
    fn owner_collection(&mut self, owner: ObjectId, field: &str) -> Option<&mut Vec<ObjectId>> {
        self.slot_mut_unchecked(owner)
            .and_then(|slot| slot.collections.get_mut(field))
    }

    /// Members of a `HasMany` collection, loading them on first access.
    pub(crate) fn load_collection(&mut self, owner: ObjectId, field: &str) -> Result<Vec<ObjectId>> {
        if let Some(members) = self.slot(owner)?.collections.get(field) {
            return Ok(members.clone());
        }
        let relation = self.collection_relation(owner, field)?;
        let key = self.key_value(owner)?;
        let child_model = self.model(&relation.foreign_model)?;

        let mut matches = Line::new();
        matches.insert(relation.foreign_key.clone(), key.clone());
        let lines = self
            .connector
            .driver
            .find_matching_lines(&child_model.table_name(), &matches)?;
        let mut members = Vec::new();
        for id in self.load_lines(&child_model, lines)? {
            // The cached value wins over the stored one.
            let current = self.slot(id)?.values.get(&relation.foreign_key);
            if current.is_some_and(|v| v.loosely_equals(&key)) {
                members.push(id);
            }
        }
        debug!(
            model = %relation.model,
            field,
            members = members.len(),
            "Loaded collection"
        );
        if let Some(slot) = self.slot_mut_unchecked(owner) {
            slot.collections.insert(field.to_string(), members.clone());
        }
        Ok(members)
    }

    /// Propagate a collection change to the children's foreign keys.
    ///
    /// - `Delete`: clear the key of every old object.
    /// - `Modify`: clear the key of old objects missing from `new`, set it on
    ///   new objects missing from `old`.
    /// - `Add`: set the key on every new object.
    pub(crate) fn affect(
        &mut self,
        owner: ObjectId,
        relation: &RelationDef,
        old: &[ObjectId],
        new: &[ObjectId],
        modification: Modification,
    ) -> Result<()> {
        let key = self.key_value(owner)?;
        let fk = relation.foreign_key.as_str();
        match modification {
            Modification::Delete => {
                for child in old {
                    self.write_foreign_key(*child, fk, Value::Null)?;
                }
            }
            Modification::Modify => {
                for child in old.iter().filter(|c| !new.contains(c)) {
                    self.write_foreign_key(*child, fk, Value::Null)?;
                }
                for child in new.iter().filter(|c| !old.contains(c)) {
                    self.write_foreign_key(*child, fk, key.clone())?;
                }
            }
            Modification::Add => {
                for child in new {
                    self.write_foreign_key(*child, fk, key.clone())?;
                }
            }
        }
        Ok(())
    }

    /// Replace a loaded collection's order.
    fn set_members(&mut self, owner: ObjectId, field: &str, members: Vec<ObjectId>) {
        if let Some(slot) = self.slot_mut_unchecked(owner) {
            slot.collections.insert(field.to_string(), members);
        }
    }

    pub(crate) fn collection_push(&mut self, owner: ObjectId, field: &str, child: ObjectId) -> Result<()> {
        self.check_live(owner)?;
        let relation = self.collection_relation(owner, field)?;
        self.check_target(child, &relation.foreign_model)?;
        self.load_collection(owner, field)?;
        self.affect(owner, &relation, &[], &[child], Modification::Add)
    }

    pub(crate) fn collection_insert(
        &mut self,
        owner: ObjectId,
        field: &str,
        index: usize,
        child: ObjectId,
    ) -> Result<()> {
        self.collection_push(owner, field, child)?;
        let mut members = self.load_collection(owner, field)?;
        members.retain(|member| *member != child);
        members.insert(index.min(members.len()), child);
        self.set_members(owner, field, members);
        Ok(())
    }

    /// Remove a member. Returns whether it was part of the collection.
    pub(crate) fn collection_remove(&mut self, owner: ObjectId, field: &str, child: ObjectId) -> Result<bool> {
        self.check_live(owner)?;
        let relation = self.collection_relation(owner, field)?;
        let members = self.load_collection(owner, field)?;
        if !members.contains(&child) {
            return Ok(false);
        }
        self.affect(owner, &relation, &[child], &[], Modification::Delete)?;
        Ok(true)
    }

    /// Replace the member at `index`. Returns the replaced member.
    pub(crate) fn collection_set(
        &mut self,
        owner: ObjectId,
        field: &str,
        index: usize,
        child: ObjectId,
    ) -> Result<ObjectId> {
        self.check_live(owner)?;
        let relation = self.collection_relation(owner, field)?;
        self.check_target(child, &relation.foreign_model)?;
        let old = self.load_collection(owner, field)?;
        let replaced = *old.get(index).ok_or_else(|| {
            Error::Usage(format!(
                "index {} is out of range for a collection of {}",
                index,
                old.len()
            ))
        })?;

        let mut new = old.clone();
        new[index] = child;
        self.affect(owner, &relation, &old, &new, Modification::Modify)?;
        self.set_members(owner, field, dedup(new));
        Ok(replaced)
    }

    /// Replace the whole collection.
    pub(crate) fn collection_replace(
        &mut self,
        owner: ObjectId,
        field: &str,
        children: Vec<ObjectId>,
    ) -> Result<()> {
        self.check_live(owner)?;
        let relation = self.collection_relation(owner, field)?;
        for child in &children {
            self.check_target(*child, &relation.foreign_model)?;
        }
        let old = self.load_collection(owner, field)?;
        self.affect(owner, &relation, &old, &children, Modification::Modify)?;
        self.set_members(owner, field, dedup(children));
        Ok(())
    }

    /// Update the foreign keys of children after the owner's key changed.
    pub(crate) fn cascade_key_change(&mut self, owner: ObjectId, old_key: &PrimaryKey) -> Result<()> {
        let model = self.slot(owner)?.model.clone();
        let relations: Vec<RelationDef> = self
            .catalog
            .collections_of(model.name())
            .into_iter()
            .cloned()
            .collect();
        if relations.is_empty() {
            return Ok(());
        }
        let (Some(old_value), new_value) = (old_key.values().first().cloned(), self.key_value(owner)?)
        else {
            return Ok(());
        };

        for relation in relations {
            let child_model = self.model(&relation.foreign_model)?;
            let mut matches = Line::new();
            matches.insert(relation.foreign_key.clone(), old_value.clone());
            let lines = self
                .connector
                .driver
                .find_matching_lines(&child_model.table_name(), &matches)?;
            for child in self.load_lines(&child_model, lines)? {
                let current = self.slot(child)?.values.get(&relation.foreign_key);
                if current.is_some_and(|v| v.loosely_equals(&old_value)) {
                    self.persist_field(child, &relation.foreign_key, new_value.clone())?;
                }
            }
            debug!(
                model = model.name(),
                field = %relation.field,
                from = %old_value,
                to = %new_value,
                "Moved children to the new key"
            );
        }
        Ok(())
    }
}

fn dedup(members: Vec<ObjectId>) -> Vec<ObjectId> {
    let mut unique = Vec::with_capacity(members.len());
    for member in members {
        if !unique.contains(&member) {
            unique.push(member);
        }
    }
    unique
}
