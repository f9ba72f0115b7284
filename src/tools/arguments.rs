//! Parsed tool call arguments.

use crate::error::TurnwireError;

/// Arguments of a dispatched tool call, parsed from the raw accumulated text.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Parse raw argument text. Blank text parses as `{}`.
    pub fn parse(raw: &str) -> Result<Self, TurnwireError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::new(serde_json::json!({})));
        }
        serde_json::from_str(trimmed)
            .map(Self::new)
            .map_err(|e| TurnwireError::ToolParse(e.to_string()))
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn get_str(&self, key: &str) -> Result<&str, TurnwireError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| TurnwireError::ToolParse(format!("missing string argument: {key}")))
    }

    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, TurnwireError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| TurnwireError::ToolParse(format!("missing integer argument: {key}")))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, TurnwireError> {
        self.value
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| TurnwireError::ToolParse(format!("missing boolean argument: {key}")))
    }

    /// Deserialize the whole argument object into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, TurnwireError> {
        serde_json::from_value(self.value.clone())
            .map_err(|e| TurnwireError::ToolParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_arguments_parse_as_empty_object() {
        let args = ToolArguments::parse("  ").unwrap();
        assert_eq!(args.raw(), &serde_json::json!({}));
    }

    #[test]
    fn malformed_arguments_are_parse_errors() {
        let err = ToolArguments::parse(r#"{"a":"#).unwrap_err();
        assert!(matches!(err, TurnwireError::ToolParse(_)));
    }

    #[test]
    fn typed_access() {
        #[derive(serde::Deserialize)]
        struct Params {
            a: i64,
            b: i64,
        }
        let args = ToolArguments::parse(r#"{"a":2,"b":3,"name":"x"}"#).unwrap();
        let params: Params = args.deserialize().unwrap();
        assert_eq!(params.a + params.b, 5);
        assert_eq!(args.get_str("name").unwrap(), "x");
        assert!(args.get_bool("name").is_err());
        assert_eq!(args.get_str_opt("missing"), None);
    }
}
