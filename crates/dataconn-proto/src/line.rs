//! Raw storage records.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A flat attribute mapping as stored and retrieved by a driver.
pub type Line = BTreeMap<String, Value>;

/// The ordered primary key values of one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimaryKey(Vec<Value>);

impl PrimaryKey {
    /// Create a primary key from its values, in key-field order.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Create a single-column primary key.
    pub fn single(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    /// Extract the key from a line, given the key field names.
    ///
    /// Returns `None` if any key field is missing from the line.
    pub fn from_line<S: AsRef<str>>(line: &Line, fields: &[S]) -> Option<Self> {
        fields
            .iter()
            .map(|field| line.get(field.as_ref()).cloned())
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    /// The key values.
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Whether any key value is null.
    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }

    /// Build the identifier line (`field -> value`) used by drivers.
    pub fn to_line<S: AsRef<str>>(&self, fields: &[S]) -> Line {
        fields
            .iter()
            .zip(self.0.iter())
            .map(|(field, value)| (field.as_ref().to_string(), value.clone()))
            .collect()
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [single] = self.0.as_slice() {
            return write!(f, "{}", single);
        }
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}
