/// Queue item parsing.
///
/// Items are `{"invocationId": int|string, "code": string, "input": JSON}`.
/// `input` is optional and defaults to `{}`; an explicit `null` is kept.
use crate::config::types::{InvocationId, InvocationRequest};
use serde_json::Value;

/// What a raw queue item turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedItem {
    Request(InvocationRequest),
    /// Deserializable with a usable id, but a required field is missing
    MissingField {
        invocation_id: InvocationId,
        field: &'static str,
    },
    /// A required field is missing and there is no id to report under
    NoId { field: &'static str },
    /// Not a JSON object at all
    Malformed(String),
}

impl ParsedItem {
    /// Message stored as `errorMessage` for a missing field
    pub fn missing_field_message(field: &str) -> String {
        format!("Invalid request format: missing '{}'", field)
    }
}

pub fn parse_item(raw: &str) -> ParsedItem {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => return ParsedItem::Malformed(e.to_string()),
    };
    let object = match value {
        Value::Object(object) => object,
        other => return ParsedItem::Malformed(format!("expected a JSON object, got {}", kind(&other))),
    };

    let invocation_id = match object.get("invocationId").and_then(InvocationId::from_json) {
        Some(id) => id,
        None => return ParsedItem::NoId { field: "invocationId" },
    };

    let code = match object.get("code").and_then(Value::as_str) {
        Some(code) => code.to_string(),
        None => {
            return ParsedItem::MissingField {
                invocation_id,
                field: "code",
            }
        }
    };

    let input = object
        .get("input")
        .cloned()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

    ParsedItem::Request(InvocationRequest {
        invocation_id,
        code,
        input,
    })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_request() {
        let parsed = parse_item(r#"{"invocationId": 42, "code": "x", "input": {"a": [1, 2]}}"#);
        assert_eq!(
            parsed,
            ParsedItem::Request(InvocationRequest {
                invocation_id: InvocationId::Int(42),
                code: "x".to_string(),
                input: json!({"a": [1, 2]}),
            })
        );
    }

    #[test]
    fn test_input_defaults_to_empty_object() {
        match parse_item(r#"{"invocationId": "abc", "code": "x"}"#) {
            ParsedItem::Request(request) => {
                assert_eq!(request.invocation_id, InvocationId::from("abc"));
                assert_eq!(request.input, json!({}));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_explicit_null_input_is_kept() {
        match parse_item(r#"{"invocationId": 1, "code": "x", "input": null}"#) {
            ParsedItem::Request(request) => assert_eq!(request.input, Value::Null),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_code_with_id() {
        assert_eq!(
            parse_item(r#"{"invocationId": 7, "input": {}}"#),
            ParsedItem::MissingField {
                invocation_id: InvocationId::Int(7),
                field: "code",
            }
        );
        assert_eq!(
            ParsedItem::missing_field_message("code"),
            "Invalid request format: missing 'code'"
        );
    }

    #[test]
    fn test_unusable_id() {
        assert_eq!(
            parse_item(r#"{"code": "x"}"#),
            ParsedItem::NoId { field: "invocationId" }
        );
        assert_eq!(
            parse_item(r#"{"invocationId": [1], "code": "x"}"#),
            ParsedItem::NoId { field: "invocationId" }
        );
        assert_eq!(
            parse_item(r#"{"invocationId": 1.5, "code": "x"}"#),
            ParsedItem::NoId { field: "invocationId" }
        );
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(parse_item("{not json"), ParsedItem::Malformed(_)));
        assert!(matches!(parse_item("[1, 2]"), ParsedItem::Malformed(_)));
    }
}
