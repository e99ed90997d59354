//! Per-field validation rules.

use super::types::ScalarType;
use dataconn_proto::Value;

/// Constraint attached to a field descriptor and carried into its table column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraint {
    /// Field participates in the primary key.
    pub pkey: bool,
    /// Value assigned by storage on insert.
    pub auto_increment: bool,
    /// Minimum string length, in characters.
    pub min_length: Option<usize>,
    /// Maximum string length, in characters.
    pub max_length: Option<usize>,
}

impl Constraint {
    /// Whether callers may supply a value for this field.
    ///
    /// Auto-increment fields are owned by storage.
    pub fn accepts_caller_value(&self) -> bool {
        !self.auto_increment
    }

    /// Validate a non-null value of the given scalar type.
    pub fn control(&self, scalar: ScalarType, value: &Value) -> Result<(), String> {
        if scalar != ScalarType::String {
            return Ok(());
        }
        let Some(text) = value.as_str() else {
            return Ok(());
        };
        let length = text.chars().count();
        if let Some(min) = self.min_length {
            if length < min {
                return Err(format!(
                    "string of length {} is shorter than the minimum {}",
                    length, min
                ));
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                return Err(format!(
                    "string of length {} is longer than the maximum {}",
                    length, max
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_bounds() {
        let constraint = Constraint {
            min_length: Some(2),
            max_length: Some(4),
            ..Default::default()
        };
        assert!(constraint.control(ScalarType::String, &Value::from("abc")).is_ok());
        assert!(constraint.control(ScalarType::String, &Value::from("a")).is_err());
        assert!(constraint.control(ScalarType::String, &Value::from("abcde")).is_err());
        // Characters, not bytes.
        assert!(constraint.control(ScalarType::String, &Value::from("été")).is_ok());
    }

    #[test]
    fn test_auto_increment_exclusive() {
        let constraint = Constraint {
            pkey: true,
            auto_increment: true,
            ..Default::default()
        };
        assert!(!constraint.accepts_caller_value());
        assert!(Constraint::default().accepts_caller_value());
    }
}
