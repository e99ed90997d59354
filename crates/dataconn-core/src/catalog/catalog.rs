//! Registry of recorded models and their resolved relations.

use super::field::FieldDef;
use super::model::ModelDef;
use super::relation::{self, RelationDef, RelationKind};
use super::types::FieldType;
use crate::error::{Error, RelationError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// The model catalog.
///
/// Models are recorded in batches; a batch is validated, its relations are
/// resolved and its fields receive their registration-order index before
/// anything is stored, so a failing batch leaves the catalog untouched.
#[derive(Debug, Default)]
pub struct Catalog {
    models: HashMap<String, Arc<ModelDef>>,
    order: Vec<String>,
    relations: HashMap<(String, String), RelationDef>,
    next_index: usize,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a recorded model.
    pub fn model(&self, name: &str) -> Option<&Arc<ModelDef>> {
        self.models.get(name)
    }

    /// Recorded models in registration order.
    pub fn models(&self) -> impl Iterator<Item = &Arc<ModelDef>> {
        self.order.iter().filter_map(|name| self.models.get(name))
    }

    /// The relation declared by `model.field`.
    pub fn relation(&self, model: &str, field: &str) -> Option<&RelationDef> {
        self.relations.get(&(model.to_string(), field.to_string()))
    }

    /// Collections (`ManyToOne` relations) owned by `model`.
    pub fn collections_of(&self, model: &str) -> Vec<&RelationDef> {
        let mut found: Vec<&RelationDef> = self
            .relations
            .values()
            .filter(|r| r.kind == RelationKind::ManyToOne && r.model == model)
            .collect();
        found.sort_by(|a, b| a.field.cmp(&b.field));
        found
    }

    /// Collections whose membership is decided by `model.foreign_key`.
    pub fn collections_fed_by(&self, model: &str, foreign_key: &str) -> Vec<&RelationDef> {
        let mut found: Vec<&RelationDef> = self
            .relations
            .values()
            .filter(|r| {
                r.kind == RelationKind::ManyToOne
                    && r.foreign_model == model
                    && r.foreign_key == foreign_key
            })
            .collect();
        found.sort_by(|a, b| (&a.model, &a.field).cmp(&(&b.model, &b.field)));
        found
    }

    /// The single-reference relation backed by the scalar `model.attribute`.
    pub fn foreign_key_relation(&self, model: &str, attribute: &str) -> Option<&RelationDef> {
        self.relations.values().find(|r| {
            r.kind == RelationKind::OneToMany && r.model == model && r.foreign_key == attribute
        })
    }

    /// Record a batch of models.
    ///
    /// Models related to each other must be recorded in the same batch or
    /// after the models they refer to.
    pub fn record(&mut self, batch: Vec<ModelDef>) -> Result<Vec<Arc<ModelDef>>> {
        let mut pending: Vec<ModelDef> = Vec::with_capacity(batch.len());
        for model in batch {
            if self.models.contains_key(model.name())
                || pending.iter().any(|m| m.name() == model.name())
            {
                return Err(Error::Schema(format!(
                    "model '{}' is already recorded",
                    model.name()
                )));
            }
            validate(&model)?;
            pending.push(model);
        }

        let mut resolved = Vec::new();
        let mut foreign_keys: Vec<(usize, FieldDef)> = Vec::new();
        for (position, model) in pending.iter().enumerate() {
            for field in model.relation_fields() {
                let target = field.field_type.related_model().unwrap_or_default();
                let foreign = pending
                    .iter()
                    .find(|m| m.name() == target)
                    .or_else(|| self.models.get(target).map(Arc::as_ref))
                    .ok_or_else(|| RelationError::UnknownModel {
                        model: model.name().to_string(),
                        field: field.name.clone(),
                        foreign: target.to_string(),
                    })?;

                // The model whose key the foreign-key scalar stores.
                let referenced = if field.field_type.is_single_reference() {
                    foreign
                } else {
                    model
                };
                let key = referenced.pkey_fields();
                if key.len() != 1 {
                    return Err(RelationError::CompositeKey {
                        model: model.name().to_string(),
                        field: field.name.clone(),
                        foreign: referenced.name().to_string(),
                    }
                    .into());
                }

                let relation = relation::resolve(model, field, foreign)?;
                if relation.kind == RelationKind::OneToMany {
                    let scalar = key[0].field_type.clone();
                    foreign_keys.push((
                        position,
                        FieldDef::new(relation.foreign_key.clone(), scalar),
                    ));
                }
                resolved.push(relation);
            }
        }

        for (position, key_field) in foreign_keys {
            let model = &mut pending[position];
            match model.field(&key_field.name) {
                None => model.push_field(key_field),
                Some(existing) if existing.field_type == key_field.field_type => {}
                Some(existing) => {
                    return Err(Error::Schema(format!(
                        "{}.{} is declared as {} but backs a relation to a {} key",
                        model.name(),
                        existing.name,
                        existing.field_type.name(),
                        key_field.field_type.name()
                    )))
                }
            }
        }

        let mut recorded = Vec::with_capacity(pending.len());
        for mut model in pending {
            for field in model.fields_mut() {
                field.index = Some(self.next_index);
                self.next_index += 1;
            }
            debug!(model = model.name(), fields = model.fields().len(), "Recorded model");
            let model = Arc::new(model);
            self.order.push(model.name().to_string());
            self.models.insert(model.name().to_string(), model.clone());
            recorded.push(model);
        }
        for relation in resolved {
            self.relations
                .insert((relation.model.clone(), relation.field.clone()), relation);
        }
        Ok(recorded)
    }
}

fn validate(model: &ModelDef) -> Result<()> {
    let schema = |message: String| Err(Error::Schema(format!("{}: {}", model.name(), message)));

    let key = model.pkey_fields();
    if key.is_empty() {
        return schema("a model needs at least one primary key field".into());
    }
    for field in model.fields() {
        let relation = field.field_type.is_relation();
        if relation && (field.is_pkey() || field.is_auto_increment()) {
            return schema(format!(
                "relation field '{}' can not be a key or auto-increment",
                field.name
            ));
        }
        if field.is_auto_increment() {
            if field.field_type != FieldType::integer() {
                return schema(format!("auto-increment field '{}' must be an integer", field.name));
            }
            if !field.is_pkey() || key.len() != 1 {
                return schema(format!(
                    "auto-increment field '{}' must be the only primary key field",
                    field.name
                ));
            }
        }
    }
    Ok(())
}
