//! Conversion between values and the serialized forms of the file and
//! document backends.
//!
//! Timestamps are stored as plain integers; the column type restores them.

use super::table::Table;
use crate::catalog::ScalarType;
use crate::error::{Error, Result};
use dataconn_proto::{Line, Value};

/// Encode a value as JSON.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Int32(i) => serde_json::Value::from(*i),
        Value::Int64(i) | Value::Timestamp(i) => serde_json::Value::from(*i),
        Value::String(s) => serde_json::Value::String(s.clone()),
    }
}

/// Decode a JSON value of the given column type.
pub fn json_to_value(json: &serde_json::Value, scalar: ScalarType) -> Result<Value> {
    match (scalar, json) {
        (_, serde_json::Value::Null) => Ok(Value::Null),
        (ScalarType::Integer, serde_json::Value::Number(n)) => n
            .as_i64()
            .map(Value::Int64)
            .ok_or_else(|| mismatch(scalar, json)),
        (ScalarType::DateTime, serde_json::Value::Number(n)) => n
            .as_i64()
            .map(Value::Timestamp)
            .ok_or_else(|| mismatch(scalar, json)),
        (ScalarType::String, serde_json::Value::String(s)) => Ok(Value::String(s.clone())),
        _ => Err(mismatch(scalar, json)),
    }
}

/// Encode a line as a JSON object.
pub fn line_to_json(line: &Line) -> serde_json::Map<String, serde_json::Value> {
    line.iter()
        .map(|(field, value)| (field.clone(), value_to_json(value)))
        .collect()
}

/// Decode a JSON object into a line of `table`. Unknown keys are dropped and
/// missing columns read as null.
pub fn json_to_line(table: &Table, object: &serde_json::Map<String, serde_json::Value>) -> Result<Line> {
    table
        .columns
        .iter()
        .map(|column| {
            let value = match object.get(&column.name) {
                Some(json) => json_to_value(json, column.scalar)?,
                None => Value::Null,
            };
            Ok((column.name.clone(), value))
        })
        .collect()
}

/// Encode a value as YAML.
pub fn value_to_yaml(value: &Value) -> serde_yaml::Value {
    match value {
        Value::Null => serde_yaml::Value::Null,
        Value::Int32(i) => serde_yaml::Value::Number((*i as i64).into()),
        Value::Int64(i) | Value::Timestamp(i) => serde_yaml::Value::Number((*i).into()),
        Value::String(s) => serde_yaml::Value::String(s.clone()),
    }
}

/// Decode a YAML value of the given column type.
pub fn yaml_to_value(yaml: &serde_yaml::Value, scalar: ScalarType) -> Result<Value> {
    match (scalar, yaml) {
        (_, serde_yaml::Value::Null) => Ok(Value::Null),
        (ScalarType::Integer, serde_yaml::Value::Number(n)) => n
            .as_i64()
            .map(Value::Int64)
            .ok_or_else(|| mismatch(scalar, yaml)),
        (ScalarType::DateTime, serde_yaml::Value::Number(n)) => n
            .as_i64()
            .map(Value::Timestamp)
            .ok_or_else(|| mismatch(scalar, yaml)),
        (ScalarType::String, serde_yaml::Value::String(s)) => Ok(Value::String(s.clone())),
        // Unquoted scalars such as `yes` or `12` in a string column.
        (ScalarType::String, serde_yaml::Value::Number(n)) => Ok(Value::String(n.to_string())),
        (ScalarType::String, serde_yaml::Value::Bool(b)) => Ok(Value::String(b.to_string())),
        _ => Err(mismatch(scalar, yaml)),
    }
}

/// Encode a line as a YAML mapping, in column order.
pub fn line_to_yaml(table: &Table, line: &Line) -> serde_yaml::Mapping {
    let mut mapping = serde_yaml::Mapping::new();
    for column in &table.columns {
        let value = line.get(&column.name).unwrap_or(&Value::Null);
        mapping.insert(
            serde_yaml::Value::String(column.name.clone()),
            value_to_yaml(value),
        );
    }
    mapping
}

/// Decode a YAML mapping into a line of `table`.
pub fn yaml_to_line(table: &Table, mapping: &serde_yaml::Mapping) -> Result<Line> {
    table
        .columns
        .iter()
        .map(|column| {
            let value = match mapping.get(column.name.as_str()) {
                Some(yaml) => yaml_to_value(yaml, column.scalar)?,
                None => Value::Null,
            };
            Ok((column.name.clone(), value))
        })
        .collect()
}

fn mismatch(scalar: ScalarType, found: &impl std::fmt::Debug) -> Error {
    Error::DataFormatting(format!("expected {} value, found {:?}", scalar.name(), found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Constraint;
    use crate::storage::table::Column;

    fn table() -> Table {
        let column = |name: &str, scalar| Column {
            name: name.into(),
            scalar,
            constraint: Constraint::default(),
        };
        Table::new(
            "posts",
            vec![
                column("id", ScalarType::Integer),
                column("title", ScalarType::String),
                column("published_at", ScalarType::DateTime),
            ],
        )
    }

    #[test]
    fn test_json_line() {
        let mut line = Line::new();
        line.insert("id".into(), Value::Int64(2));
        line.insert("title".into(), Value::from("Hello"));
        line.insert("published_at".into(), Value::Timestamp(1_704_067_200_000_000));

        let object = line_to_json(&line);
        assert_eq!(object["published_at"], serde_json::json!(1_704_067_200_000_000i64));
        assert_eq!(json_to_line(&table(), &object).unwrap(), line);
    }

    #[test]
    fn test_json_missing_and_unknown_keys() {
        let object = serde_json::json!({"id": 1, "extra": true});
        let line = json_to_line(&table(), object.as_object().unwrap()).unwrap();
        assert_eq!(line.get("title"), Some(&Value::Null));
        assert!(!line.contains_key("extra"));
    }

    #[test]
    fn test_json_type_mismatch() {
        let err = json_to_value(&serde_json::json!("x"), ScalarType::Integer).unwrap_err();
        assert!(matches!(err, Error::DataFormatting(_)));
    }

    #[test]
    fn test_yaml_line() {
        let mut line = Line::new();
        line.insert("id".into(), Value::Int64(5));
        line.insert("title".into(), Value::Null);
        line.insert("published_at".into(), Value::Timestamp(9));

        let mapping = line_to_yaml(&table(), &line);
        assert_eq!(yaml_to_line(&table(), &mapping).unwrap(), line);
    }

    #[test]
    fn test_yaml_unquoted_string() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("12").unwrap();
        assert_eq!(
            yaml_to_value(&yaml, ScalarType::String).unwrap(),
            Value::from("12")
        );
    }
}
