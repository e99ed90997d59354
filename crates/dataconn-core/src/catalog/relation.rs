//! Relation definitions between models.

use super::field::FieldDef;
use super::model::ModelDef;
use super::types::FieldType;
use crate::error::RelationError;

/// Direction of a relation, seen from the field that declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// The owner holds one reference (`HasOne`/`BelongTo`), the inverse a collection.
    OneToMany,
    /// The owner holds a collection (`HasMany`), the inverse one reference.
    ManyToOne,
}

/// A resolved relation, owned by one field.
///
/// A bidirectional association is two `RelationDef`s, one per side, each
/// naming the other through `inverse_field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub kind: RelationKind,
    /// Model declaring the field.
    pub model: String,
    /// Declaring field.
    pub field: String,
    /// Model on the other side.
    pub foreign_model: String,
    /// Paired field on the other side, `None` for a `BelongTo` owner.
    pub inverse_field: Option<String>,
    /// Name of the foreign-key scalar.
    ///
    /// It lives on `model` for `OneToMany` and on `foreign_model` for `ManyToOne`.
    pub foreign_key: String,
    /// Whether both sides can be navigated.
    pub bidirectional: bool,
}

impl RelationDef {
    /// Model holding the foreign-key scalar.
    pub fn key_holder(&self) -> &str {
        match self.kind {
            RelationKind::OneToMany => &self.model,
            RelationKind::ManyToOne => &self.foreign_model,
        }
    }
}

/// Name of the foreign-key scalar backing a single-reference field.
pub fn foreign_key_name(field: &str) -> String {
    format!("{}_id", field)
}

/// Resolve the relation declared by `field` on `model`.
///
/// `foreign` is the referenced model, already known to the catalog.
pub(crate) fn resolve(
    model: &ModelDef,
    field: &FieldDef,
    foreign: &ModelDef,
) -> Result<RelationDef, RelationError> {
    let base = |inverse: &str| RelationError::InvalidCardinality {
        model: model.name().to_string(),
        field: field.name.clone(),
        foreign: foreign.name().to_string(),
        inverse: inverse.to_string(),
    };
    let missing = || RelationError::MissingInverse {
        model: model.name().to_string(),
        field: field.name.clone(),
        foreign: foreign.name().to_string(),
    };

    match &field.field_type {
        FieldType::BelongTo { .. } => Ok(RelationDef {
            kind: RelationKind::OneToMany,
            model: model.name().to_string(),
            field: field.name.clone(),
            foreign_model: foreign.name().to_string(),
            inverse_field: None,
            foreign_key: foreign_key_name(&field.name),
            bidirectional: false,
        }),
        FieldType::HasOne { .. } => {
            let inverse = find_inverse(model, field, foreign).ok_or_else(missing)?;
            if !matches!(inverse.field_type, FieldType::HasMany { .. }) {
                return Err(base(&inverse.name));
            }
            Ok(RelationDef {
                kind: RelationKind::OneToMany,
                model: model.name().to_string(),
                field: field.name.clone(),
                foreign_model: foreign.name().to_string(),
                inverse_field: Some(inverse.name.clone()),
                foreign_key: foreign_key_name(&field.name),
                bidirectional: true,
            })
        }
        FieldType::HasMany { .. } => {
            let inverse = find_inverse(model, field, foreign).ok_or_else(missing)?;
            let bidirectional = match inverse.field_type {
                FieldType::HasOne { .. } => true,
                FieldType::BelongTo { .. } => false,
                _ => return Err(base(&inverse.name)),
            };
            Ok(RelationDef {
                kind: RelationKind::ManyToOne,
                model: model.name().to_string(),
                field: field.name.clone(),
                foreign_model: foreign.name().to_string(),
                inverse_field: Some(inverse.name.clone()),
                foreign_key: foreign_key_name(&inverse.name),
                bidirectional,
            })
        }
        FieldType::Scalar(_) => Err(missing()),
    }
}

/// Locate the paired field: the one named by `inverse`, or the single
/// relation field on `foreign` pointing back at `model`.
fn find_inverse<'a>(
    model: &ModelDef,
    field: &FieldDef,
    foreign: &'a ModelDef,
) -> Option<&'a FieldDef> {
    let points_back = |candidate: &&FieldDef| {
        candidate.field_type.related_model() == Some(model.name())
            && !(foreign.name() == model.name() && candidate.name == field.name)
            && candidate
                .inverse
                .as_deref()
                .map_or(true, |declared| declared == field.name)
    };

    if let Some(name) = &field.inverse {
        return foreign.field(name).filter(points_back);
    }

    let candidates: Vec<&FieldDef> = foreign.relation_fields().filter(points_back).collect();
    // Prefer a candidate of the complementary cardinality.
    candidates
        .iter()
        .find(|c| c.field_type.is_single_reference() != field.field_type.is_single_reference())
        .or_else(|| candidates.first())
        .copied()
}
