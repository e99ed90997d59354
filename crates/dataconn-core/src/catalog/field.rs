//! Field definitions for models.

use super::constraint::Constraint;
use super::types::{FieldType, ScalarType};
use crate::error::{Error, Result};
use dataconn_proto::{Line, Value};
use std::fmt;
use std::sync::Arc;

/// Default value applied by `create` when a field is not supplied.
#[derive(Clone)]
pub enum DefaultValue {
    /// A fixed value.
    Static(Value),
    /// A value computed from the fields already set on the new object.
    Computed(Arc<dyn Fn(&Line) -> Value + Send + Sync>),
}

impl DefaultValue {
    /// Produce the default for a partially built line.
    pub fn resolve(&self, partial: &Line) -> Value {
        match self {
            DefaultValue::Static(value) => value.clone(),
            DefaultValue::Computed(compute) => compute(partial),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            DefaultValue::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// A field definition within a model.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field semantic type.
    pub field_type: FieldType,
    /// Validation rules.
    pub constraint: Constraint,
    /// Whether null is refused.
    pub required: bool,
    /// Whether the field is persisted. Relation fields are not; their
    /// foreign-key scalar is.
    pub register: bool,
    /// Default value if not provided.
    pub default: Option<DefaultValue>,
    /// Name of the paired field on the related model.
    pub inverse: Option<String>,
    /// Registration-order index, assigned when the model is recorded.
    pub(crate) index: Option<usize>,
}

impl FieldDef {
    /// Create a field of the given type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let register = !field_type.is_relation();
        Self {
            name: name.into(),
            field_type,
            constraint: Constraint::default(),
            required: false,
            register,
            default: None,
            inverse: None,
            index: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::integer())
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::string())
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::datetime())
    }

    /// A single reference to `model`, paired with a `has_many` on it.
    pub fn has_one(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldType::HasOne {
                model: model.into(),
            },
        )
    }

    /// A collection of `model` objects referencing this one.
    pub fn has_many(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldType::HasMany {
                model: model.into(),
            },
        )
    }

    /// A reference to `model` that is only navigable from the `has_many` side.
    pub fn belong_to(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldType::BelongTo {
                model: model.into(),
            },
        )
    }

    /// Mark as part of the primary key.
    pub fn pkey(mut self) -> Self {
        self.constraint.pkey = true;
        self
    }

    /// Let storage assign the value on insert.
    pub fn auto_increment(mut self) -> Self {
        self.constraint.auto_increment = true;
        self
    }

    /// Refuse null.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min_length(mut self, length: usize) -> Self {
        self.constraint.min_length = Some(length);
        self
    }

    pub fn max_length(mut self, length: usize) -> Self {
        self.constraint.max_length = Some(length);
        self
    }

    /// Set a static default value.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    /// Set a default computed from the fields already set on the new object.
    pub fn with_computed_default<F>(mut self, compute: F) -> Self
    where
        F: Fn(&Line) -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Computed(Arc::new(compute)));
        self
    }

    /// Name the paired field on the related model.
    pub fn inverse(mut self, field: impl Into<String>) -> Self {
        self.inverse = Some(field.into());
        self
    }

    /// Independent copy for another model; the copy gets a fresh index when
    /// that model is recorded.
    pub fn copy(&self) -> Self {
        let mut copy = self.clone();
        copy.index = None;
        copy
    }

    /// Registration-order index, `None` until the model is recorded.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn is_pkey(&self) -> bool {
        self.constraint.pkey
    }

    pub fn is_auto_increment(&self) -> bool {
        self.constraint.auto_increment
    }

    /// The stored scalar type, `None` for relation fields.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        self.field_type.scalar()
    }

    /// Validate a value for this field, returning the normalized value.
    pub fn accept_value(&self, model: &str, value: Value) -> Result<Value> {
        let invalid = |reason: String| Error::InvalidValue {
            model: model.to_string(),
            field: self.name.clone(),
            reason,
        };

        let Some(scalar) = self.scalar_type() else {
            return Err(invalid(format!(
                "{} relation fields hold objects, not values",
                self.field_type.name()
            )));
        };
        if value.is_null() {
            if self.required || self.is_pkey() {
                return Err(invalid("null is not accepted".into()));
            }
            return Ok(Value::Null);
        }

        let found = value.type_name();
        let value = scalar
            .coerce(value)
            .ok_or_else(|| invalid(format!("expected {}, got {}", scalar.name(), found)))?;
        self.constraint.control(scalar, &value).map_err(invalid)?;
        Ok(value)
    }
}
