//! Top-level argument checks against a tool's parameter schema.

use thiserror::Error;

/// The first schema violation found in a set of arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("expected object arguments, got {0}")]
    NotAnObject(&'static str),
    #[error("missing required field '{0}'")]
    MissingField(String),
    #[error("field '{field}' expected type '{expected}', got {actual}")]
    WrongType {
        field: String,
        expected: String,
        actual: &'static str,
    },
}

/// Check object shape, required fields, and declared property types.
///
/// Nested schemas are not descended into; tools still own deep validation.
pub fn check_arguments(
    args: &serde_json::Value,
    schema: &serde_json::Value,
) -> Result<(), SchemaViolation> {
    if schema.get("type").and_then(|v| v.as_str()) == Some("object") && !args.is_object() {
        return Err(SchemaViolation::NotAnObject(type_name(args)));
    }
    let Some(object) = args.as_object() else {
        return Ok(());
    };

    let required = schema
        .get("required")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str());
    if let Some(missing) = required.into_iter().find(|name| !object.contains_key(*name)) {
        return Err(SchemaViolation::MissingField(missing.to_string()));
    }

    let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) else {
        return Ok(());
    };
    for (field, value) in object {
        let expected = properties
            .get(field)
            .and_then(|p| p.get("type"))
            .and_then(|t| t.as_str());
        if let Some(expected) = expected {
            if !matches_type(value, expected) {
                return Err(SchemaViolation::WrongType {
                    field: field.clone(),
                    expected: expected.to_string(),
                    actual: type_name(value),
                });
            }
        }
    }
    Ok(())
}

fn matches_type(value: &serde_json::Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": { "a": { "type": "integer" }, "b": { "type": "integer" } },
            "required": ["a", "b"],
        })
    }

    #[test]
    fn accepts_matching_arguments() {
        assert_eq!(check_arguments(&json!({"a": 1, "b": 2}), &schema()), Ok(()));
    }

    #[test]
    fn reports_first_violation() {
        assert_eq!(
            check_arguments(&json!([1, 2]), &schema()),
            Err(SchemaViolation::NotAnObject("array"))
        );
        assert_eq!(
            check_arguments(&json!({"a": 1}), &schema()),
            Err(SchemaViolation::MissingField("b".into()))
        );
        assert_eq!(
            check_arguments(&json!({"a": 1, "b": "2"}), &schema())
                .unwrap_err()
                .to_string(),
            "field 'b' expected type 'integer', got string"
        );
    }
}
