//! Core type definitions for the catalog.

use dataconn_proto::Value;

/// Scalar types a stored column can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// 64-bit signed integer.
    Integer,
    /// UTF-8 string.
    String,
    /// Timestamp (microseconds since Unix epoch).
    DateTime,
}

impl ScalarType {
    /// Name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Integer => "integer",
            ScalarType::String => "string",
            ScalarType::DateTime => "datetime",
        }
    }

    /// Check a value against the type, converting accepted alternates.
    ///
    /// `Int32` is widened to `Int64`. Returns `None` on a type mismatch.
    pub fn coerce(&self, value: Value) -> Option<Value> {
        match (self, value) {
            (_, Value::Null) => Some(Value::Null),
            (ScalarType::Integer, Value::Int64(i)) => Some(Value::Int64(i)),
            (ScalarType::Integer, Value::Int32(i)) => Some(Value::Int64(i as i64)),
            (ScalarType::String, Value::String(s)) => Some(Value::String(s)),
            (ScalarType::DateTime, Value::Timestamp(t)) => Some(Value::Timestamp(t)),
            _ => None,
        }
    }
}

/// Semantic type of a model field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// A stored scalar.
    Scalar(ScalarType),
    /// Single reference to another model, paired with a `HasMany` on it.
    HasOne {
        /// Referenced model name.
        model: String,
    },
    /// Collection of objects of another model referencing this one.
    HasMany {
        /// Referenced model name.
        model: String,
    },
    /// Single reference without a navigable inverse.
    BelongTo {
        /// Referenced model name.
        model: String,
    },
}

impl FieldType {
    pub fn integer() -> Self {
        FieldType::Scalar(ScalarType::Integer)
    }

    pub fn string() -> Self {
        FieldType::Scalar(ScalarType::String)
    }

    pub fn datetime() -> Self {
        FieldType::Scalar(ScalarType::DateTime)
    }

    /// The scalar type, for stored fields.
    pub fn scalar(&self) -> Option<ScalarType> {
        match self {
            FieldType::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// Check if this is a relation field.
    pub fn is_relation(&self) -> bool {
        !matches!(self, FieldType::Scalar(_))
    }

    /// The model a relation field refers to.
    pub fn related_model(&self) -> Option<&str> {
        match self {
            FieldType::Scalar(_) => None,
            FieldType::HasOne { model }
            | FieldType::HasMany { model }
            | FieldType::BelongTo { model } => Some(model),
        }
    }

    /// Whether this side of a relation holds a single reference.
    pub fn is_single_reference(&self) -> bool {
        matches!(self, FieldType::HasOne { .. } | FieldType::BelongTo { .. })
    }

    /// Name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Scalar(s) => s.name(),
            FieldType::HasOne { .. } => "has_one",
            FieldType::HasMany { .. } => "has_many",
            FieldType::BelongTo { .. } => "belong_to",
        }
    }
}
